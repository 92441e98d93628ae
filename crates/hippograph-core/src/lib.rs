//! HippoGraph Core: configuration, errors, content-addressed identifiers.

pub mod config;
pub mod error;
pub mod hashing;
pub mod text;
pub mod types;

pub use config::{HippoGraphConfig, IndexPaths};
pub use error::{Error, Result};
pub use types::{NodeKind, Triple};
