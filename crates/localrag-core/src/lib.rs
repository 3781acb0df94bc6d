//! localrag-core
//!
//! Domain types, the error type, capability traits and configuration shared
//! by every localrag crate.

pub mod chunker;
pub mod config;
pub mod error;
pub mod progress;
pub mod traits;
pub mod types;

pub use error::{Capability, Error, ErrorKind, Result};
