//! # locflow Common Library
//!
//! Shared code for the locflow localization review services:
//! - Error type shared across crates
//! - Event types (LocflowEvent enum) and the broadcast EventBus
//! - Bootstrap configuration (TOML file, config/data folder resolution)

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
