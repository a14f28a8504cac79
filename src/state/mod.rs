//! Catalog state
//!
//! This module handles everything persisted about stored media:
//! - Database connections and queries (library.rs)
//! - Shared data structures (data.rs)
//! - Filter chains and the built-in filters (filter.rs)

pub mod data;
pub mod filter;
pub mod library;
