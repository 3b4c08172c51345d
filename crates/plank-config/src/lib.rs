//! Configuration files for plank-core.
//!
//! `plank-core` takes its process-wide settings (CAS backend, lock striping,
//! contention policy) through [`plank_core::configure`]. This crate stores
//! them in a TOML file, validates them and applies them at startup.
//!
//! # Example
//!
//! ```rust,no_run
//! use plank_config::{default_config_path, load_or_default};
//!
//! let config = load_or_default(default_config_path()).unwrap();
//! config.apply().unwrap();
//! ```

mod config;
mod error;

pub mod paths;
pub mod validation;

pub use config::{CasBackendSetting, ContentionSetting, CoreConfig};
pub use error::ConfigError;
pub use paths::{default_config_path, ensure_user_config_dir, load_or_default, user_config_dir};
pub use validation::{ValidationError, ValidationResult, validate_config};
