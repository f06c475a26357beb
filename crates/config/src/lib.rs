//! Configuration loading, validation and env substitution.
//!
//! Config files: `chanmirror.toml`, `chanmirror.yaml`, or `chanmirror.json`
//! Searched in `./` then `~/.config/chanmirror/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, load, load_config, resolve_config_path},
    schema::{ChanmirrorConfig, MetricsSettings, MirrorSettings, TelegramSettings},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config},
};
