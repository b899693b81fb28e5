//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in launcher defaults
//! 2. User config (~/.config/xlaunch/xlaunch.toml or --config)
//! 3. `--conf key=value` overrides
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{BuiltinDefaults, DEFAULT_MAIN_CLASS};
pub use effective::{
    default_user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
};
pub use merge::{deep_merge, merge_layers, parse_overrides, parse_scalar, set_path};
