//! Error types for scope-acl
//!
//! This module defines the error hierarchy used throughout the crate.
//! We use `thiserror` for library-style errors that are part of the API.
//! The access guards collapse every one of these into a denial; callers that
//! need the distinction use `AccessControl::evaluate` directly.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Access control error: {0}")]
    AccessControl(#[from] AccessControlError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid scope '{scope}' in {field}")]
    InvalidScope { scope: String, field: String },
}

/// Errors raised while evaluating an evaluator tree
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid scope '{scope}' in permission set")]
    InvalidScope { scope: String },

    #[error("Failed to resolve scope '{scope}': {source}")]
    Resolution {
        scope: String,
        #[source]
        source: ResolverError,
    },

    #[error("Failed to inject parameters into scope '{scope}': {reason}")]
    Injection { scope: String, reason: String },

    #[error("Evaluation cancelled")]
    Cancelled,
}

/// Errors returned by attribute scope resolvers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("No resource found for scope '{scope}'")]
    NotFound { scope: String },

    #[error("Resolver failed: {0}")]
    Failed(String),
}

/// Errors returned by permission providers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Permission backend error: {0}")]
    Backend(String),

    #[error("Permission lookup cancelled")]
    Cancelled,
}

/// Setup-time registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("A scope resolver is already registered for prefix '{prefix}'")]
    DuplicateResolver { prefix: String },

    #[error("Invalid resolver prefix '{prefix}': prefixes must be non-empty and end with ':'")]
    InvalidResolverPrefix { prefix: String },

    #[error("Fixed role '{name}' is already declared with a different definition")]
    ConflictingRole { name: String },

    #[error("Invalid fixed role name '{name}': fixed roles must start with 'fixed:'")]
    InvalidRoleName { name: String },

    #[error("Fixed role '{role}' has an invalid scope '{scope}'")]
    InvalidScope { role: String, scope: String },
}

/// Errors returned by permission management services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Permission backend error: {0}")]
    Backend(String),
}

/// Errors returned by the access control façade
#[derive(Error, Debug)]
pub enum AccessControlError {
    #[error("Failed to load permissions: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to evaluate permissions: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Failed to register: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Request cancelled")]
    Cancelled,
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for evaluator operations
pub type EvalResult<T> = std::result::Result<T, EvaluationError>;
