//! Permission evaluators
//!
//! An evaluator is a boolean expression over required `(action, scope)` checks:
//!
//! ```text
//! all(datasources:read[datasources:id:1], any(teams:read[teams:*], users:read))
//! ```
//!
//! Composite nodes short-circuit. `all` stops at the first false child and
//! `any` at the first true one; children run in order, so attribute resolvers
//! are invoked in that order too and skipped children never reach them.

use crate::access_control::permission::ScopesByAction;
use crate::access_control::resolver::ScopeResolution;
use crate::access_control::scope::scope_covers;
use crate::error::{EvalResult, EvaluationError};
use futures::future::{BoxFuture, FutureExt};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use tracing::trace;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_]+)(?::([^\s{}]+))?\s*\}\}").expect("placeholder pattern is valid")
});

/// Placeholder replaced by the organization id on injection
pub fn org_id_field() -> String {
    "{{ org_id }}".to_string()
}

/// Placeholder replaced by a request parameter on injection
pub fn url_param(key: &str) -> String {
    format!("{{{{ param:{key} }}}}")
}

/// Values substituted into scope placeholders
#[derive(Debug, Clone, Default)]
pub struct ScopeParams {
    pub org_id: i64,
    pub url_params: HashMap<String, String>,
}

impl ScopeParams {
    pub fn new(org_id: i64) -> Self {
        Self {
            org_id,
            url_params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    fn inject(&self, scope: &str) -> EvalResult<String> {
        if !scope.contains("{{") {
            return Ok(scope.to_string());
        }

        let mut failure = None;
        let injected = PLACEHOLDER.replace_all(scope, |caps: &Captures<'_>| {
            let value = match (&caps[1], caps.get(2)) {
                ("org_id", None) => Some(self.org_id.to_string()),
                ("param", Some(key)) => self.url_params.get(key.as_str()).cloned(),
                _ => None,
            };
            value.unwrap_or_else(|| {
                failure.get_or_insert_with(|| format!("cannot substitute '{}'", &caps[0]));
                String::new()
            })
        });

        if let Some(reason) = failure {
            return Err(EvaluationError::Injection {
                scope: scope.to_string(),
                reason,
            });
        }
        if injected.contains("{{") {
            return Err(EvaluationError::Injection {
                scope: scope.to_string(),
                reason: "unterminated placeholder".to_string(),
            });
        }

        Ok(injected.into_owned())
    }
}

/// Boolean expression over required permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluator {
    /// Requires `action` on any one of `scopes`; no scopes means the action alone
    Permission { action: String, scopes: Vec<String> },
    /// Requires every child
    All(Vec<Evaluator>),
    /// Requires at least one child
    Any(Vec<Evaluator>),
}

/// Leaf requiring `action` on any of `scopes`
pub fn eval_permission<S: Into<String>>(
    action: impl Into<String>,
    scopes: impl IntoIterator<Item = S>,
) -> Evaluator {
    Evaluator::Permission {
        action: action.into(),
        scopes: scopes.into_iter().map(Into::into).collect(),
    }
}

/// Leaf requiring `action` regardless of scope
pub fn eval_action(action: impl Into<String>) -> Evaluator {
    Evaluator::Permission {
        action: action.into(),
        scopes: Vec::new(),
    }
}

pub fn eval_all(children: impl IntoIterator<Item = Evaluator>) -> Evaluator {
    Evaluator::All(children.into_iter().collect())
}

pub fn eval_any(children: impl IntoIterator<Item = Evaluator>) -> Evaluator {
    Evaluator::Any(children.into_iter().collect())
}

/// Whether any held scope covers any of the targets
fn covers_any<S: AsRef<str>>(held: &[String], targets: &[S]) -> EvalResult<bool> {
    for target in targets {
        let target: &str = target.as_ref();
        for scope in held {
            if scope_covers(scope, target)? {
                trace!(held = %scope, target, "Scope matched");
                return Ok(true);
            }
        }
    }
    Ok(false)
}

impl Evaluator {
    /// Evaluate against held scopes, matching scopes literally.
    ///
    /// No attribute resolution takes place; see [`Evaluator::evaluate_with`].
    pub fn evaluate(&self, permissions: &ScopesByAction) -> EvalResult<bool> {
        match self {
            Evaluator::Permission { action, scopes } => {
                let Some(held) = permissions.get(action) else {
                    return Ok(false);
                };
                if scopes.is_empty() {
                    return Ok(true);
                }
                covers_any(held, scopes)
            }
            Evaluator::All(children) => {
                for child in children {
                    if !child.evaluate(permissions)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Evaluator::Any(children) => {
                for child in children {
                    if child.evaluate(permissions)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluate against held scopes, resolving attribute scopes on the way.
    ///
    /// A leaf's scopes are only resolved when its action is held.
    pub fn evaluate_with<'a>(
        &'a self,
        permissions: &'a ScopesByAction,
        resolution: &'a ScopeResolution<'a>,
    ) -> BoxFuture<'a, EvalResult<bool>> {
        async move {
            match self {
                Evaluator::Permission { action, scopes } => {
                    let Some(held) = permissions.get(action) else {
                        return Ok(false);
                    };
                    if scopes.is_empty() {
                        return Ok(true);
                    }
                    for scope in scopes {
                        let resolved = resolution.resolve(scope).await?;
                        if covers_any(held, &resolved)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Evaluator::All(children) => {
                    for child in children {
                        if !child.evaluate_with(permissions, resolution).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Evaluator::Any(children) => {
                    for child in children {
                        if child.evaluate_with(permissions, resolution).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        }
        .boxed()
    }

    /// Copy of this evaluator with scope placeholders substituted
    pub fn inject(&self, params: &ScopeParams) -> EvalResult<Evaluator> {
        Ok(match self {
            Evaluator::Permission { action, scopes } => Evaluator::Permission {
                action: action.clone(),
                scopes: scopes
                    .iter()
                    .map(|s| params.inject(s))
                    .collect::<EvalResult<_>>()?,
            },
            Evaluator::All(children) => Evaluator::All(
                children
                    .iter()
                    .map(|c| c.inject(params))
                    .collect::<EvalResult<_>>()?,
            ),
            Evaluator::Any(children) => Evaluator::Any(
                children
                    .iter()
                    .map(|c| c.inject(params))
                    .collect::<EvalResult<_>>()?,
            ),
        })
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, name: &str, children: &[Evaluator]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluator::Permission { action, scopes } if scopes.is_empty() => write!(f, "{action}"),
            Evaluator::Permission { action, scopes } => {
                write!(f, "{action}[{}]", scopes.join(", "))
            }
            Evaluator::All(children) => write_children(f, "all", children),
            Evaluator::Any(children) => write_children(f, "any", children),
        }
    }
}
