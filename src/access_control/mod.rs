//! Access control module
//!
//! Decides whether an identity may perform an action on a resource, and
//! summarizes allowed actions per resource for list views.
//!
//! ## Model
//!
//! A permission is an `(action, scope)` pair. Scopes are hierarchical and may
//! end in a wildcard on a segment boundary:
//!
//! ```text
//! datasources:id:7      one data source
//! datasources:id:*      every data source id
//! datasources:*         every data source
//! *                     everything
//! ```
//!
//! Required permissions are expressed as an [`Evaluator`] tree of `all`/`any`
//! nodes over `(action, scopes)` leaves. Abstract scopes such as
//! `datasources:name:prom` are expanded by attribute resolvers registered per
//! prefix before matching.
//!
//! ## Example
//!
//! ```
//! use scope_acl::access_control::{Permission, eval_permission, group_scopes_by_action};
//!
//! let held = group_scopes_by_action(&[Permission::new("datasources:read", "datasources:*")]);
//! let evaluator = eval_permission("datasources:read", ["datasources:id:7"]);
//! assert!(evaluator.evaluate(&held).unwrap());
//! ```

pub mod evaluator;
pub mod guard;
pub mod metadata;
pub mod permission;
pub mod resolver;
pub mod roles;
pub mod scope;
pub mod service;
pub mod types;

pub use evaluator::{
    Evaluator, ScopeParams, eval_action, eval_all, eval_any, eval_permission, org_id_field,
    url_param,
};
pub use guard::{RequestContext, has_access, has_global_access, req_org_admin, req_server_admin};
pub use metadata::{Metadata, get_resources_metadata};
pub use permission::{Permission, ScopesByAction, build_permissions_map, group_scopes_by_action};
pub use resolver::{BoxedScopeResolver, FnResolver, ScopeResolution, ScopeResolver, ScopeResolverRegistry};
pub use roles::{FixedRoles, RoleDto, RoleRegistration};
pub use scope::validate_scope;
pub use service::{AccessControl, AccessControlEngine};
pub use types::{
    BuiltInRole, GLOBAL_ORG_ID, GetUserPermissionsQuery, Identity, OrgRole, Options,
    ResourcePermission, SetResourcePermissionCommand, User,
};
