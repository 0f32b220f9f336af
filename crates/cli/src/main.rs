//! Tyxar CLI - operator tools for the site's hosted backend.
//!
//! # Usage
//!
//! ```bash
//! # List pending role requests
//! tyxar-cli roles pending
//!
//! # Approve a request (grants the role, then deletes the request)
//! tyxar-cli roles approve 42 -u 6f1c...-e2 -r developer
//!
//! # Set or clear a role flag directly
//! tyxar-cli roles grant -u 6f1c...-e2 -r tester
//! tyxar-cli roles grant -u 6f1c...-e2 -r tester --revoke
//!
//! # Newest profiles
//! tyxar-cli users list --limit 20
//!
//! # Search the local content directory
//! tyxar-cli search "pattern matching"
//! ```
//!
//! Backend commands read `SUPABASE_URL`, `SUPABASE_ANON_KEY` and
//! `SUPABASE_SERVICE_ROLE_KEY` (from `.env` if present).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tyxar_core::{Role, RoleRequestId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "tyxar-cli")]
#[command(author, version, about = "Tyxar site operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage role requests and role flags
    Roles {
        #[command(subcommand)]
        action: RolesAction,
    },
    /// Inspect user profiles
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
    /// Run the site search against local content
    Search {
        /// Text to look for
        query: String,

        /// Content directory holding the page fragments
        #[arg(short, long, default_value = "crates/site/content")]
        content_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum RolesAction {
    /// List pending role requests
    Pending,
    /// Approve a pending role request
    Approve {
        /// Request ID
        id: RoleRequestId,

        /// Requesting user
        #[arg(short, long)]
        user: UserId,

        /// Requested role (`admin`, `developer`, `tester`)
        #[arg(short, long)]
        role: Role,
    },
    /// Set a role flag on a profile
    Grant {
        #[arg(short, long)]
        user: UserId,

        #[arg(short, long)]
        role: Role,

        /// Clear the flag instead of setting it
        #[arg(long)]
        revoke: bool,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List the newest profiles
    List {
        /// Number of rows
        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        /// Rows to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tyxar_cli=info,tyxar_site=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Roles { action } => match action {
            RolesAction::Pending => commands::roles::pending().await?,
            RolesAction::Approve { id, user, role } => {
                commands::roles::approve(id, user, role).await?;
            }
            RolesAction::Grant { user, role, revoke } => {
                commands::roles::grant(user, role, !revoke).await?;
            }
        },
        Commands::Users { action } => match action {
            UsersAction::List { limit, offset } => commands::users::list(offset, limit).await?,
        },
        Commands::Search { query, content_dir } => {
            commands::search::run(&query, content_dir).await;
        }
    }
    Ok(())
}
