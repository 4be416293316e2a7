//! Domain models for kickstart provisioning.
//!
//! # Core Concepts
//!
//! ## Provisioning Configuration
//!
//! - [`Profile`]: A named kickstart configuration owning its [`Command`]s and [`Script`]s.
//! - [`Tree`]: The installable file tree a profile installs from, tied to a [`Channel`].
//! - [`CryptoKey`]: GPG/SSL keys handed to provisioned systems.
//!
//! ## Provisioning Runs
//!
//! - [`Session`]: One kickstart attempt against a server. Its state changes are
//!   appended to an ordered [`SessionHistory`].
//!
//! ## Reference Tables
//!
//! Seeded by migration and never edited at runtime: [`InstallType`],
//! [`VirtualizationType`], [`TreeType`], [`CryptoKeyType`], [`CommandName`].
//!
//! Mutable entities carry `id: Option<i64>`; `None` means the entity has not
//! been saved yet.

mod channel;
mod command;
mod crypto;
mod org;
mod profile;
mod reference;
mod script;
mod session;
mod tree;

pub use channel::*;
pub use command::*;
pub use crypto::*;
pub use org::*;
pub use profile::*;
pub use reference::*;
pub use script::*;
pub use session::*;
pub use tree::*;
