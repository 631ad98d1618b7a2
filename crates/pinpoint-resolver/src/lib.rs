//! Dependency resolution engine for Pinpoint.
//!
//! The [`index::CatalogIndex`] holds every unit version and constraint. The
//! search in [`resolver`] walks immutable [`state::ResolverState`]s
//! best-first, priced by the cost functions in [`pricer`].
//! [`packages::PackagesResolver`] maps a package catalog onto
//! per-architecture units and drives the search with retries.

pub mod conflict;
pub mod graph;
pub mod index;
pub mod packages;
pub mod pricer;
pub mod queue;
pub mod resolver;
pub mod state;
