//! # JobSara Core
//!
//! Core types, configuration, and translation for JobSara.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Account roles and identifiers shared by the gateway and CLI
//! - Locale negotiation and the word-substitution translator

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod i18n;
pub mod types;

pub use config::{AuthConfig, Config, ConfigError};
pub use i18n::{Locale, Translator, WordTranslator};
pub use types::{AccountId, Role};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AuthConfig, Config};
    pub use crate::i18n::{Locale, Translator};
    pub use crate::types::*;
}
