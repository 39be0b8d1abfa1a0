//! Per-resource action metadata
//!
//! Maps a permission set onto a batch of resource ids in one pass, so list
//! views can be annotated without evaluating every row.

use crate::access_control::permission::Permission;
use crate::access_control::scope::{GLOBAL_SCOPE, resource_all_id_scope, resource_all_scope};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Actions an identity may perform on one resource.
///
/// Ex: `{"datasources:read": true, "datasources:delete": true}`
pub type Metadata = HashMap<String, bool>;

fn add_action(all: &mut HashMap<String, Metadata>, action: &str, id: &str) {
    all.entry(id.to_string())
        .or_default()
        .insert(action.to_string(), true);
}

/// List, for each requested resource id, the actions the permissions allow on it.
///
/// Ids with no matching permission are left out of the result.
pub fn get_resources_metadata(
    permissions: &[Permission],
    resource_kind: &str,
    resource_ids: &HashSet<String>,
) -> HashMap<String, Metadata> {
    // prefix of id based scopes (datasources:id:)
    let id_prefix = format!("{resource_kind}:id:");
    let wildcards = [
        GLOBAL_SCOPE.to_string(),
        resource_all_scope(resource_kind),
        resource_all_id_scope(resource_kind),
    ];

    let mut result = HashMap::new();
    for p in permissions {
        if wildcards.iter().any(|w| *w == p.scope) {
            for id in resource_ids {
                add_action(&mut result, &p.action, id);
            }
        } else if let Some(id) = p.scope.strip_prefix(&id_prefix)
            && !id.is_empty()
            && resource_ids.contains(id)
        {
            add_action(&mut result, &p.action, id);
        }
    }

    trace!(
        resource_kind,
        requested = resource_ids.len(),
        annotated = result.len(),
        "Computed resources metadata"
    );

    result
}
