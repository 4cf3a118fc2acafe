pub mod app;
pub mod builders;

pub use app::TestApp;
pub use builders::SnapshotBuilder;
