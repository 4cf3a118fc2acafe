//! Warden - multi-tenant RBAC policy service
//!
//! Domain hierarchies, role assignments and allow/deny rules kept as relation
//! tuples, mutated over HTTP and replaced atomically on reload.

pub mod rbac;
pub mod settings;
pub mod web;
