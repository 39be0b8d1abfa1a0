//! Scope-based access control
//!
//! A permission evaluation engine for multi-tenant applications.
//!
//! ## Features
//!
//! - **Hierarchical scopes** with trailing wildcards on segment boundaries
//! - **Composable evaluators** (`all` / `any` trees) with short-circuiting
//! - **Attribute scope resolvers** that expand names and uids into ids at evaluation time
//! - **Bulk resource metadata** listing allowed actions per resource id in one pass
//! - **Fail-closed guards** with a fallback when access control is disabled
//!
//! ## Evaluation Flow
//!
//! ```text
//! identity → fixed roles + provider permissions → group by action
//!          → resolve attribute scopes → evaluate tree → allow / deny
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [access_control]
//! enabled = true
//!
//! [[roles]]
//! name = "fixed:datasources:reader"
//! grants = ["Viewer"]
//! permissions = [{ action = "datasources:read", scope = "datasources:*" }]
//!
//! [[grants]]
//! org_id = 1
//! user_id = 7
//! action = "datasources:write"
//! scope = "datasources:id:3"
//! ```

pub mod access_control;
pub mod config;
pub mod error;
pub mod provider;

// Re-export main types
pub use access_control::{AccessControl, AccessControlEngine, Evaluator, Identity, Permission};
pub use config::{AppConfig, load_config};
pub use error::{AppError, Result};
pub use provider::{PermissionsProvider, StaticPermissionsProvider};
