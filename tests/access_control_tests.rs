//! Access control service and guard tests
//!
//! Uses test doubles for the permissions provider and for the service itself
//! to observe how often permissions are loaded and evaluated.

use async_trait::async_trait;
use scope_acl::access_control::{
    AccessControl, AccessControlEngine, BuiltInRole, FnResolver, GLOBAL_ORG_ID,
    GetUserPermissionsQuery, Identity, OrgRole, Options, Permission, RequestContext, RoleDto,
    RoleRegistration, eval_action, eval_permission, has_access, has_global_access,
    req_org_admin, req_server_admin,
};
use scope_acl::access_control::{
    BoxedScopeResolver, Evaluator, ResourcePermission, SetResourcePermissionCommand, User,
};
use scope_acl::config::{AccessControlConfig, load_config_from_str};
use scope_acl::error::{AccessControlError, ProviderError, RegistrationError, ServiceError};
use scope_acl::provider::{
    PermissionsProvider, PermissionsService, PermissionsServices, StaticPermissionsProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Test Doubles
// =============================================================================

/// Provider returning fixed permissions per org and recording queries
#[derive(Default)]
struct RecordingProvider {
    by_org: HashMap<i64, Vec<Permission>>,
    queries: Mutex<Vec<GetUserPermissionsQuery>>,
}

impl RecordingProvider {
    fn with(org_id: i64, perms: &[(&str, &str)]) -> Self {
        let mut provider = Self::default();
        provider.by_org.insert(
            org_id,
            perms.iter().map(|(a, s)| Permission::new(*a, *s)).collect(),
        );
        provider
    }

    fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl PermissionsProvider for RecordingProvider {
    async fn get_user_permissions(
        &self,
        _cancel: &CancellationToken,
        query: &GetUserPermissionsQuery,
    ) -> Result<Vec<Permission>, ProviderError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.by_org.get(&query.org_id).cloned().unwrap_or_default())
    }
}

struct FailingProvider;

/// Provider whose backend reports the lookup as cancelled
struct CancelledProvider;

#[async_trait]
impl PermissionsProvider for CancelledProvider {
    async fn get_user_permissions(
        &self,
        _cancel: &CancellationToken,
        _query: &GetUserPermissionsQuery,
    ) -> Result<Vec<Permission>, ProviderError> {
        Err(ProviderError::Cancelled)
    }
}

#[async_trait]
impl PermissionsProvider for FailingProvider {
    async fn get_user_permissions(
        &self,
        _cancel: &CancellationToken,
        _query: &GetUserPermissionsQuery,
    ) -> Result<Vec<Permission>, ProviderError> {
        Err(ProviderError::Backend("store unavailable".to_string()))
    }
}

/// Access control double counting evaluations
struct CountingAccessControl {
    disabled: bool,
    result: Result<bool, ()>,
    evaluations: AtomicUsize,
    seen: Mutex<Vec<Identity>>,
}

impl CountingAccessControl {
    fn new(disabled: bool, result: Result<bool, ()>) -> Self {
        Self {
            disabled,
            result,
            evaluations: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AccessControl for CountingAccessControl {
    async fn evaluate(
        &self,
        _cancel: &CancellationToken,
        identity: &Identity,
        _evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(identity.clone());
        self.result.map_err(|_| {
            AccessControlError::Provider(ProviderError::Backend("boom".to_string()))
        })
    }

    async fn get_user_permissions(
        &self,
        _cancel: &CancellationToken,
        _identity: &Identity,
        _options: Options,
    ) -> Result<Vec<Permission>, AccessControlError> {
        Ok(Vec::new())
    }

    async fn get_user_roles(
        &self,
        _cancel: &CancellationToken,
        _identity: &Identity,
    ) -> Result<Vec<RoleDto>, AccessControlError> {
        Ok(Vec::new())
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn declare_fixed_roles(&mut self, _: &[RoleRegistration]) -> Result<(), RegistrationError> {
        Ok(())
    }

    fn register_attribute_scope_resolver(
        &mut self,
        _: &str,
        _: BoxedScopeResolver,
    ) -> Result<(), RegistrationError> {
        Ok(())
    }
}

/// In-memory permissions service keyed by resource id
#[derive(Default)]
struct MemoryPermissionsService {
    records: Mutex<Vec<ResourcePermission>>,
}

impl MemoryPermissionsService {
    fn set(
        &self,
        resource_id: &str,
        mut record: ResourcePermission,
        permission: &str,
    ) -> Option<ResourcePermission> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| {
            !(r.resource_id == resource_id
                && r.user_id == record.user_id
                && r.team_id == record.team_id
                && r.built_in_role == record.built_in_role)
        });
        if permission.is_empty() {
            return None;
        }
        record.resource_id = resource_id.to_string();
        record.actions = vec![format!("{permission}:read")];
        record.scope = format!("teams:id:{resource_id}");
        records.push(record.clone());
        Some(record)
    }
}

#[async_trait]
impl PermissionsService for MemoryPermissionsService {
    async fn get_permissions(
        &self,
        _cancel: &CancellationToken,
        _org_id: i64,
        resource_id: &str,
    ) -> Result<Vec<ResourcePermission>, ServiceError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.resource_id == resource_id)
            .cloned()
            .collect())
    }

    async fn set_user_permission(
        &self,
        _cancel: &CancellationToken,
        _org_id: i64,
        user: User,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        let record = ResourcePermission {
            user_id: Some(user.id),
            ..Default::default()
        };
        Ok(self.set(resource_id, record, permission))
    }

    async fn set_team_permission(
        &self,
        _cancel: &CancellationToken,
        _org_id: i64,
        team_id: i64,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        let record = ResourcePermission {
            team_id: Some(team_id),
            ..Default::default()
        };
        Ok(self.set(resource_id, record, permission))
    }

    async fn set_built_in_role_permission(
        &self,
        _cancel: &CancellationToken,
        _org_id: i64,
        built_in_role: BuiltInRole,
        resource_id: &str,
        permission: &str,
    ) -> Result<Option<ResourcePermission>, ServiceError> {
        let record = ResourcePermission {
            built_in_role: Some(built_in_role),
            ..Default::default()
        };
        Ok(self.set(resource_id, record, permission))
    }

    async fn set_permissions(
        &self,
        _cancel: &CancellationToken,
        _org_id: i64,
        resource_id: &str,
        commands: &[SetResourcePermissionCommand],
    ) -> Result<Vec<ResourcePermission>, ServiceError> {
        let mut out = Vec::new();
        for command in commands {
            let record = ResourcePermission {
                user_id: command.user_id,
                team_id: command.team_id,
                built_in_role: command.built_in_role,
                ..Default::default()
            };
            out.extend(self.set(resource_id, record, &command.permission));
        }
        Ok(out)
    }
}

#[derive(Default)]
struct MemoryServices {
    teams: MemoryPermissionsService,
    data_sources: MemoryPermissionsService,
}

impl PermissionsServices for MemoryServices {
    fn team_service(&self) -> &dyn PermissionsService {
        &self.teams
    }

    fn data_source_service(&self) -> &dyn PermissionsService {
        &self.data_sources
    }
}

// =============================================================================
// Test Helpers
// =============================================================================

fn enabled() -> AccessControlConfig {
    AccessControlConfig { enabled: true }
}

fn disabled() -> AccessControlConfig {
    AccessControlConfig { enabled: false }
}

fn reader_role() -> RoleRegistration {
    RoleRegistration {
        role: RoleDto {
            name: "fixed:datasources:reader".to_string(),
            permissions: vec![Permission::new("datasources:read", "datasources:*")],
            ..Default::default()
        },
        grants: vec![BuiltInRole::Viewer],
    }
}

fn editor(user_id: i64, org_id: i64) -> Identity {
    Identity::new(user_id, org_id, Some(OrgRole::Editor))
}

// =============================================================================
// Engine
// =============================================================================

#[tokio::test]
async fn test_evaluate_with_provider_permissions() {
    let provider = Arc::new(RecordingProvider::with(1, &[("teams:read", "teams:id:5")]));
    let engine = AccessControlEngine::new(&enabled(), provider.clone());
    let cancel = CancellationToken::new();
    let identity = editor(7, 1);

    let allowed = engine
        .evaluate(&cancel, &identity, &eval_permission("teams:read", ["teams:id:5"]))
        .await
        .unwrap();
    assert!(allowed);

    let denied = engine
        .evaluate(&cancel, &identity, &eval_permission("teams:read", ["teams:id:6"]))
        .await
        .unwrap();
    assert!(!denied);

    let queries = provider.queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].org_id, 1);
    assert_eq!(queries[0].user_id, 7);
    assert_eq!(queries[0].roles, vec![BuiltInRole::Editor]);
}

#[tokio::test]
async fn test_fixed_role_permissions_come_first() {
    let provider = Arc::new(RecordingProvider::with(1, &[("teams:read", "teams:id:5")]));
    let mut engine = AccessControlEngine::new(&enabled(), provider);
    engine.declare_fixed_roles(&[reader_role()]).unwrap();
    let cancel = CancellationToken::new();

    let perms = engine
        .get_user_permissions(&cancel, &editor(7, 1), Options::default())
        .await
        .unwrap();
    assert_eq!(
        perms,
        vec![
            Permission::new("datasources:read", "datasources:*"),
            Permission::new("teams:read", "teams:id:5"),
        ]
    );

    let roles = engine.get_user_roles(&cancel, &editor(7, 1)).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "fixed:datasources:reader");

    let no_role = Identity::new(7, 1, None);
    assert!(engine.get_user_roles(&cancel, &no_role).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicting_role_declaration() {
    let mut engine = AccessControlEngine::new(&enabled(), Arc::new(RecordingProvider::default()));
    engine.declare_fixed_roles(&[reader_role()]).unwrap();
    engine.declare_fixed_roles(&[reader_role()]).unwrap();

    let mut changed = reader_role();
    changed.role.permissions.push(Permission::new("datasources:write", "*"));
    let err = engine.declare_fixed_roles(&[changed]).unwrap_err();
    assert!(matches!(err, RegistrationError::ConflictingRole { .. }));
    assert_eq!(engine.fixed_roles().len(), 1);
}

#[tokio::test]
async fn test_resolver_registered_on_engine() {
    let provider = Arc::new(RecordingProvider::with(1, &[("datasources:query", "datasources:id:7")]));
    let mut engine = AccessControlEngine::new(&enabled(), provider);
    engine
        .register_attribute_scope_resolver(
            "datasources:name:",
            Arc::new(FnResolver::new(|_org: i64, _scope: &str| {
                Ok(vec!["datasources:id:7".to_string()])
            })),
        )
        .unwrap();
    let err = engine
        .register_attribute_scope_resolver(
            "datasources:name:",
            Arc::new(FnResolver::new(|_org: i64, _scope: &str| Ok(Vec::new()))),
        )
        .unwrap_err();
    assert!(matches!(err, RegistrationError::DuplicateResolver { .. }));

    let engine = Arc::new(engine);
    let cancel = CancellationToken::new();
    let allowed = engine
        .evaluate(
            &cancel,
            &editor(1, 1),
            &eval_permission("datasources:query", ["datasources:name:prom"]),
        )
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn test_provider_error_surfaces() {
    let engine = AccessControlEngine::new(&enabled(), Arc::new(FailingProvider));
    let cancel = CancellationToken::new();
    let err = engine
        .evaluate(&cancel, &editor(1, 1), &eval_action("teams:read"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessControlError::Provider(_)));
}

#[tokio::test]
async fn test_provider_cancellation_maps_to_cancelled() {
    let engine = AccessControlEngine::new(&enabled(), Arc::new(CancelledProvider));
    let cancel = CancellationToken::new();
    let err = engine
        .get_user_permissions(&cancel, &editor(1, 1), Options::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AccessControlError::Cancelled));
}

#[tokio::test]
async fn test_cancelled_request_skips_provider() {
    let provider = Arc::new(RecordingProvider::default());
    let engine = AccessControlEngine::new(&enabled(), provider.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .evaluate(&cancel, &editor(1, 1), &eval_action("teams:read"))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessControlError::Cancelled));
    assert_eq!(provider.calls(), 0);
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn test_disabled_uses_fallback_without_evaluating() {
    let ac = CountingAccessControl::new(true, Ok(false));
    let mut identity = editor(1, 1);
    identity.is_server_admin = true;
    let ctx = RequestContext::new(identity);

    assert!(has_access(&ac, &ctx, req_server_admin, &eval_action("a")).await);
    assert!(!has_access(&ac, &ctx, req_org_admin, &eval_action("a")).await);
    assert!(has_global_access(&ac, &ctx, req_server_admin, &eval_action("a")).await);
    assert_eq!(ac.evaluations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_engine_never_loads_permissions() {
    let provider = Arc::new(RecordingProvider::with(1, &[("a", "*")]));
    let engine = AccessControlEngine::new(&disabled(), provider.clone());
    let ctx = RequestContext::new(editor(1, 1));

    assert!(!has_access(&engine, &ctx, |_| false, &eval_action("a")).await);
    assert!(has_access(&engine, &ctx, |_| true, &eval_action("zzz")).await);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn test_errors_deny_access() {
    let ac = CountingAccessControl::new(false, Err(()));
    let ctx = RequestContext::new(editor(1, 1));

    assert!(!has_access(&ac, &ctx, |_| true, &eval_action("a")).await);
    assert!(!has_global_access(&ac, &ctx, |_| true, &eval_action("a")).await);
    assert_eq!(ac.evaluations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_scope_in_store_denies() {
    let provider = Arc::new(RecordingProvider::with(1, &[("teams:read", "teams*")]));
    let engine = AccessControlEngine::new(&enabled(), provider);
    let ctx = RequestContext::new(editor(1, 1));

    assert!(!has_access(&engine, &ctx, |_| true, &eval_permission("teams:read", ["teams:id:1"])).await);
}

#[tokio::test]
async fn test_global_access_uses_global_org_copy() {
    let ac = CountingAccessControl::new(false, Ok(true));
    let ctx = RequestContext::new(editor(3, 9));

    assert!(has_global_access(&ac, &ctx, |_| false, &eval_action("a")).await);
    assert_eq!(ctx.identity.org_id, 9);
    assert_eq!(ctx.identity.org_role, Some(OrgRole::Editor));

    let seen = ac.seen.lock().unwrap();
    assert_eq!(seen[0].org_id, GLOBAL_ORG_ID);
    assert_eq!(seen[0].user_id, 3);
}

#[tokio::test]
async fn test_global_access_reads_global_permissions() {
    let mut provider = RecordingProvider::with(1, &[("orgs:read", "*")]);
    provider
        .by_org
        .insert(GLOBAL_ORG_ID, vec![Permission::unscoped("users:create")]);
    let provider = Arc::new(provider);
    let engine = AccessControlEngine::new(&enabled(), provider.clone());
    let ctx = RequestContext::new(editor(1, 1));

    assert!(has_global_access(&engine, &ctx, |_| false, &eval_action("users:create")).await);
    assert!(!has_global_access(&engine, &ctx, |_| false, &eval_action("orgs:read")).await);
    assert!(has_access(&engine, &ctx, |_| false, &eval_action("orgs:read")).await);

    let queries = provider.queries.lock().unwrap();
    assert_eq!(queries[0].org_id, GLOBAL_ORG_ID);
    assert!(queries[0].roles.is_empty());
}

#[tokio::test]
async fn test_shared_engine_behind_dyn() {
    let engine: Arc<dyn AccessControl> = Arc::new(AccessControlEngine::new(
        &enabled(),
        Arc::new(RecordingProvider::with(1, &[("a", "*")])),
    ));
    let ctx = RequestContext::new(editor(1, 1));
    assert!(has_access(engine.as_ref(), &ctx, |_| false, &eval_action("a")).await);
}

// =============================================================================
// Configured engine
// =============================================================================

#[tokio::test]
async fn test_engine_from_config() {
    let config = load_config_from_str(
        r#"
[[roles]]
name = "fixed:teams:reader"
grants = ["Viewer"]
permissions = [{ action = "teams:read", scope = "teams:*" }]

[[grants]]
org_id = 1
user_id = 7
action = "teams:write"
scope = "teams:id:3"
"#,
    )
    .unwrap();
    let provider = Arc::new(StaticPermissionsProvider::from_config(&config));
    let engine = AccessControlEngine::from_config(&config, provider).unwrap();

    // Viewer grants propagate to Admin
    let admin = RequestContext::new(Identity::new(2, 1, Some(OrgRole::Admin)));
    assert!(has_access(&engine, &admin, |_| false, &eval_permission("teams:read", ["teams:id:1"])).await);
    assert!(!has_access(&engine, &admin, |_| false, &eval_permission("teams:write", ["teams:id:3"])).await);

    let user = RequestContext::new(Identity::new(7, 1, Some(OrgRole::Viewer)));
    assert!(has_access(&engine, &user, |_| false, &eval_permission("teams:write", ["teams:id:3"])).await);
}

// =============================================================================
// Permissions services
// =============================================================================

#[tokio::test]
async fn test_permissions_service_double() {
    let service = MemoryPermissionsService::default();
    let cancel = CancellationToken::new();

    let record = service
        .set_user_permission(&cancel, 1, User { id: 4, is_external: false }, "5", "teams")
        .await
        .unwrap()
        .unwrap();
    assert!(record.contains(&["teams:read"]));
    assert!(!record.contains(&["teams:read", "teams:write"]));

    service
        .set_built_in_role_permission(&cancel, 1, BuiltInRole::Viewer, "5", "teams")
        .await
        .unwrap();
    assert_eq!(service.get_permissions(&cancel, 1, "5").await.unwrap().len(), 2);

    let removed = service
        .set_user_permission(&cancel, 1, User { id: 4, is_external: false }, "5", "")
        .await
        .unwrap();
    assert!(removed.is_none());
    assert_eq!(service.get_permissions(&cancel, 1, "5").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_services_are_independent() {
    let services = MemoryServices::default();
    let cancel = CancellationToken::new();

    let applied = services
        .team_service()
        .set_permissions(
            &cancel,
            1,
            "5",
            &[
                SetResourcePermissionCommand {
                    team_id: Some(2),
                    permission: "teams".to_string(),
                    ..Default::default()
                },
                SetResourcePermissionCommand {
                    user_id: Some(3),
                    permission: String::new(),
                    ..Default::default()
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].team_id, Some(2));

    let data_sources = services
        .data_source_service()
        .get_permissions(&cancel, 1, "5")
        .await
        .unwrap();
    assert!(data_sources.is_empty());
}

#[test]
fn test_engine_from_config_rejects_conflicting_roles() {
    let config = load_config_from_str(
        r#"
[[roles]]
name = "fixed:teams:reader"
permissions = [{ action = "teams:read", scope = "teams:*" }]

[[roles]]
name = "fixed:teams:reader"
permissions = [{ action = "teams:write", scope = "teams:*" }]
"#,
    )
    .unwrap();
    let provider = Arc::new(StaticPermissionsProvider::from_config(&config));

    let err = AccessControlEngine::from_config(&config, provider)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        AccessControlError::Registration(RegistrationError::ConflictingRole { .. })
    ));
}
