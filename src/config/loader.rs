//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (SCOPE_ACL__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::roles::FIXED_ROLE_PREFIX;
use crate::access_control::scope::validate_scope;
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "scope-acl.toml",
    ".scope-acl.toml",
    "~/.config/scope-acl/config.toml",
    "/etc/scope-acl/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with SCOPE_ACL prefix
    // e.g., SCOPE_ACL__ACCESS_CONTROL__ENABLED, SCOPE_ACL__LOGGING__LEVEL
    builder = builder.add_source(
        Environment::with_prefix("SCOPE_ACL")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    // 4. SCOPE_ACL_DISABLED is a shortcut for turning evaluation off
    if let Ok(value) = std::env::var("SCOPE_ACL_DISABLED")
        && is_truthy(&value)
    {
        builder = builder
            .set_override("access_control.enabled", false)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "logging.level".to_string(),
        });
    }

    for (i, role) in config.roles.iter().enumerate() {
        if role.name.is_empty() {
            return Err(ConfigError::Missing {
                field: format!("roles[{}].name", i),
            });
        }
        if !role.name.starts_with(FIXED_ROLE_PREFIX) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "roles[{}].name must start with '{}', got: {}",
                    i, FIXED_ROLE_PREFIX, role.name
                ),
            });
        }
        for permission in &role.permissions {
            validate_scope_field(&permission.scope, &format!("roles.{}.permissions", role.name))?;
        }
    }

    for (i, grant) in config.grants.iter().enumerate() {
        if grant.action.is_empty() {
            return Err(ConfigError::Missing {
                field: format!("grants[{}].action", i),
            });
        }
        if grant.user_id.is_none() && grant.built_in_role.is_none() {
            return Err(ConfigError::Invalid {
                message: format!("grants[{}] needs a user_id or a built_in_role", i),
            });
        }
        validate_scope_field(&grant.scope, &format!("grants[{}].scope", i))?;
    }

    Ok(())
}

/// Validate that a scope only uses trailing wildcards on a segment boundary
fn validate_scope_field(scope: &str, field_path: &str) -> Result<(), ConfigError> {
    if validate_scope(scope) {
        Ok(())
    } else {
        Err(ConfigError::InvalidScope {
            scope: scope.to_string(),
            field: field_path.to_string(),
        })
    }
}
