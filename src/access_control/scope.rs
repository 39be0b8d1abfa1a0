//! Scope construction, validation and matching
//!
//! Scopes are `:`-separated identifiers such as `datasources:id:42`. A trailing
//! `*` is a wildcard, valid only when it follows a `:` or `/` boundary.

use crate::error::{EvalResult, EvaluationError};

/// The global wildcard scope, covering every resource
pub const GLOBAL_SCOPE: &str = "*";

/// Number of segments kept by [`scope_prefix`]
const MAX_PREFIX_PARTS: usize = 2;

/// Join scope parts with `:`
pub fn scope<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(":")
}

/// Scope covering every instance of a resource kind (`datasources:*`)
pub fn resource_all_scope(kind: &str) -> String {
    format!("{kind}:*")
}

/// Scope covering every id of a resource kind (`datasources:id:*`)
pub fn resource_all_id_scope(kind: &str) -> String {
    format!("{kind}:id:*")
}

/// Scope for a single resource id (`datasources:id:42`)
pub fn resource_scope(kind: &str, id: &str) -> String {
    format!("{kind}:id:{id}")
}

/// Scope for a single resource uid (`dashboards:uid:abc`)
pub fn resource_uid_scope(kind: &str, uid: &str) -> String {
    format!("{kind}:uid:{uid}")
}

/// Scope for a single resource name (`datasources:name:prometheus`)
pub fn resource_name_scope(kind: &str, name: &str) -> String {
    format!("{kind}:name:{name}")
}

/// Prefix used to look up attribute resolvers.
///
/// Keeps at most the first two segments, followed by `:`:
/// `datasources:name:prom` becomes `datasources:name:`, `teams:5` becomes `teams:`.
pub fn scope_prefix(scope: &str) -> String {
    let mut parts: Vec<&str> = scope.split(':').collect();
    if parts.len() > MAX_PREFIX_PARTS {
        parts.truncate(MAX_PREFIX_PARTS);
        parts.push("");
    } else if let Some(last) = parts.last_mut() {
        *last = "";
    }

    parts.join(":")
}

/// Every wildcard scope that covers the given prefix, broadest first.
///
/// `datasources:id:` yields `*`, `datasources:*` and `datasources:id:*`.
pub fn wildcards_from_prefix(prefix: &str) -> Vec<String> {
    let mut wildcards = vec![GLOBAL_SCOPE.to_string()];
    let mut current = String::new();

    for part in prefix.split(':').filter(|p| !p.is_empty()) {
        current.push_str(part);
        current.push(':');
        wildcards.push(format!("{current}*"));
    }

    wildcards
}

/// Check that wildcards only appear as a trailing `*` on a segment boundary.
///
/// The empty scope is valid, as is the bare global wildcard `*`.
pub fn validate_scope(scope: &str) -> bool {
    let Some((&last, prefix)) = scope.as_bytes().split_last() else {
        return true;
    };

    match last {
        b'?' => return false,
        b'*' => {
            if let Some(&boundary) = prefix.last()
                && boundary != b':'
                && boundary != b'/'
            {
                return false;
            }
        }
        _ => {}
    }

    !prefix.iter().any(|&c| c == b'*' || c == b'?')
}

/// Check whether a held scope covers a required scope.
///
/// An empty held scope covers nothing. A held scope that fails validation is
/// reported as an error rather than silently skipped.
pub fn scope_covers(held: &str, target: &str) -> EvalResult<bool> {
    if held.is_empty() {
        return Ok(false);
    }

    if !validate_scope(held) {
        return Err(EvaluationError::InvalidScope {
            scope: held.to_string(),
        });
    }

    if let Some(fixed) = held.strip_suffix('*') {
        return Ok(target.starts_with(fixed));
    }

    Ok(held == target)
}
