//! Domain hierarchy, role assignments and allow/deny rules, stored as
//! relation tuples and served from a single live [`reload::LiveEnforcer`].

pub mod domains;
pub mod engine;
pub mod errors;
pub mod model;
pub mod policies;
pub mod reload;
pub mod roles;
pub mod store;
pub mod types;
pub mod web;

pub use errors::RbacError;
pub use reload::LiveEnforcer;
pub use store::{Enforcer, EnforcerConfig, RelationStore, ReloadMode};
