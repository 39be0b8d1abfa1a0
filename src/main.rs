//! scope-acl command line
//!
//! Validates scopes and answers access questions against a configuration file.

use clap::{Args as ClapArgs, Parser, Subcommand};
use scope_acl::{
    access_control::{
        AccessControl, AccessControlEngine, Identity, OrgRole, Options, RequestContext,
        eval_permission, get_resources_metadata, has_access, has_global_access, req_org_admin,
        validate_scope,
    },
    config::{AppConfig, LogFormat, load_config},
    provider::StaticPermissionsProvider,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Scope-based access control for multi-tenant applications
#[derive(Parser, Debug)]
#[command(name = "scope-acl")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SCOPE_ACL_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCOPE_ACL_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that scopes are well formed
    ValidateScope {
        #[arg(required = true)]
        scopes: Vec<String>,
    },

    /// Check whether an identity may perform an action
    Check {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Action to check (ex: datasources:read)
        #[arg(long)]
        action: String,

        /// Scope the action targets, any of which suffices
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Only consider globally assigned permissions
        #[arg(long)]
        global: bool,
    },

    /// Print the permissions an identity holds as JSON
    Permissions {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Print allowed actions per resource id as JSON
    Metadata {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Resource kind (ex: datasources)
        #[arg(long)]
        kind: String,

        /// Resource ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
}

#[derive(ClapArgs, Debug)]
struct IdentityArgs {
    #[arg(long)]
    user_id: i64,

    #[arg(long)]
    org_id: i64,

    /// Organization role (Viewer, Editor, Admin)
    #[arg(long, value_parser = parse_org_role)]
    org_role: Option<OrgRole>,

    #[arg(long)]
    server_admin: bool,
}

impl IdentityArgs {
    fn identity(&self) -> Identity {
        let mut identity = Identity::new(self.user_id, self.org_id, self.org_role);
        identity.is_server_admin = self.server_admin;
        identity
    }
}

fn parse_org_role(s: &str) -> Result<OrgRole, String> {
    OrgRole::try_parse(s).ok_or_else(|| format!("unknown organization role '{s}'"))
}

fn init_logging(config: &AppConfig, level: Option<&str>) {
    let level = level.unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init(),
    }
}

/// Build the engine over the configured fixed roles and static grants
fn build_engine(config: &AppConfig) -> scope_acl::Result<AccessControlEngine> {
    let provider = Arc::new(StaticPermissionsProvider::from_config(config));
    Ok(AccessControlEngine::from_config(config, provider)?)
}

fn load_app_config(path: Option<&str>) -> scope_acl::Result<AppConfig> {
    Ok(load_config(path)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = load_app_config(args.config.as_deref())?;
    init_logging(&config, args.log_level.as_deref());

    if let Command::ValidateScope { scopes } = &args.command {
        let mut all_valid = true;
        for scope in scopes {
            let valid = validate_scope(scope);
            all_valid &= valid;
            println!("{scope}\t{}", if valid { "valid" } else { "invalid" });
        }
        if !all_valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    let engine = Arc::new(
        build_engine(&config)
            .inspect_err(|e| error!(error = %e, "Failed to set up access control"))?,
    );

    match args.command {
        Command::ValidateScope { .. } => {}
        Command::Check {
            identity,
            action,
            scopes,
            global,
        } => {
            let ctx = RequestContext::new(identity.identity());
            let evaluator = eval_permission(action, scopes);
            let allowed = if global {
                has_global_access(engine.as_ref(), &ctx, req_org_admin, &evaluator).await
            } else {
                has_access(engine.as_ref(), &ctx, req_org_admin, &evaluator).await
            };

            info!(evaluator = %evaluator, allowed, "Access checked");
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                std::process::exit(1);
            }
        }
        Command::Permissions { identity } => {
            let cancel = CancellationToken::new();
            let permissions = engine
                .get_user_permissions(&cancel, &identity.identity(), Options::default())
                .await?;
            print_json(&permissions)?;
        }
        Command::Metadata {
            identity,
            kind,
            ids,
        } => {
            let cancel = CancellationToken::new();
            let permissions = engine
                .get_user_permissions(&cancel, &identity.identity(), Options::default())
                .await?;
            let ids: HashSet<String> = ids.into_iter().collect();
            print_json(&get_resources_metadata(&permissions, &kind, &ids))?;
        }
    }

    Ok(())
}
