//! Shared utilities for the Pinpoint resolver.
//!
//! This crate provides the cross-cutting error type used by every other
//! Pinpoint crate.

pub mod errors;
