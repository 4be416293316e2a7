//! Kickstart provisioning data access.
//!
//! [`db::Database`] is the single entry point for looking up and persisting
//! kickstart profiles, trees, sessions, crypto keys and their reference
//! tables. [`tree_edit::TreeEditOperation`] is the edit workflow for trees,
//! handing successful saves to a [`sync::TreeSync`] implementation.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod tree_edit;

pub use error::{KickstartError, Result};
