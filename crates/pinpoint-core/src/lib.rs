//! Core data types for the Pinpoint resolver.
//!
//! This crate defines the values the resolution engine works with:
//! semantic versions with their compatibility helpers, version constraints
//! and their satisfaction rule, the catalog collaborator interface together
//! with an in-memory catalog snapshot, and resolver configuration.
//!
//! This crate is intentionally free of search logic.

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod version;
