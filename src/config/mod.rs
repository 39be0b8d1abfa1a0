//! Configuration module
//!
//! Access control settings, logging, fixed role declarations and static
//! grants, loaded from TOML files and `SCOPE_ACL__*` environment variables.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    AccessControlConfig, AppConfig, FixedRoleConfig, GrantConfig, LogFormat, LoggingConfig,
    PermissionConfig,
};
