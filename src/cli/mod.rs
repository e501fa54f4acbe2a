//! Command-line interface.
//!
//! With no subcommand the binary starts the server. Subcommands:
//! - `create-user` - Create a staff account directly in the database
//! - `config check` - Validate configuration file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::auth::{password, Role};
use crate::config::Config;
use crate::db::{self, NewUser, User};
use crate::DbPool;

#[derive(Parser, Debug)]
#[command(name = "sees-console")]
#[command(author, version, about = "Admin console for service-closure notice sites", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sees.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Skip startup self-checks (for development only)
    #[arg(long)]
    pub skip_checks: bool,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a staff account
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// viewer, editor or admin
        #[arg(long, default_value = "viewer")]
        role: Role,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::CreateUser {
            name,
            email,
            password,
            role,
        }) => cmd_create_user(cli, name, email, password, *role).await,
        Some(Commands::Config(ConfigCommands::Check)) => cmd_config_check(cli),
        // No subcommand means start the server - this is handled in main.rs
        None => Ok(()),
    }
}

async fn cmd_create_user(
    cli: &Cli,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let pool = db::init(&config.database).await?;

    let result = create_user(&pool, &config, name, email, password, role).await;
    pool.close().await;

    let user = result?;
    println!("[OK] Created {} ({}) with role {}", user.email, user.id, user.role);
    Ok(())
}

/// Create a user under the same password policy and email uniqueness as the API
pub async fn create_user(
    pool: &DbPool,
    config: &Config,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() || email.is_empty() {
        bail!("Name and email are required");
    }
    let min_length = config.auth.min_password_length;
    if let Some(reason) = password::check_password_policy(password, min_length) {
        bail!(reason);
    }

    let password_hash = password::hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    db::users::create(
        pool,
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        },
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            anyhow::anyhow!("A user with email {} already exists", email)
        } else {
            anyhow::Error::new(e).context("Failed to create user")
        }
    })
}

/// Validate configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("[!!] Configuration file not found: {}", config_path.display());
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To create a custom configuration, copy sees.example.toml to sees.toml");
        return Ok(());
    }

    let config = Config::load(config_path).context("Configuration file is invalid")?;

    println!("[OK] Configuration file is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Listen:       {}:{}", config.server.host, config.server.port);
    println!("  Base URL:     {}", config.server.base_url);
    println!();
    println!("Storage:");
    println!("  Database:     {}", config.database.url);
    println!("  Store:        {:?}", config.store.backend);
    println!();
    println!("Auth:");
    println!("  Cookie:       {}", config.auth.cookie_name);
    println!("  Session TTL:  {}s", config.auth.session_ttl_secs);
    println!("  Reset TTL:    {}s", config.auth.reset_ttl_secs);
    println!();
    println!(
        "Cloud:          {}",
        if config.cloud.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!();

    let mut warnings = Vec::new();
    if !config.auth.secure_cookie {
        warnings.push("secure_cookie is off - session cookies will be sent over plain HTTP");
    }
    if config.cloud.enabled && !config.cloud.is_configured() {
        warnings.push("Cloud provisioning is enabled but credentials are incomplete");
    }

    if warnings.is_empty() {
        println!("No warnings.");
    } else {
        println!("Warnings:");
        for warning in warnings {
            println!("  [!] {}", warning);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_starts_server() {
        let cli = Cli::try_parse_from(["sees-console"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("sees.toml"));
    }

    #[test]
    fn test_parse_create_user() {
        let cli = Cli::try_parse_from([
            "sees-console",
            "create-user",
            "--name",
            "Admin",
            "--email",
            "admin@example.jp",
            "--password",
            "password123",
            "--role",
            "admin",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateUser { role, email, .. }) => {
                assert_eq!(role, Role::Admin);
                assert_eq!(email, "admin@example.jp");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from([
            "sees-console",
            "create-user",
            "--name",
            "A",
            "--email",
            "a@example.jp",
            "--password",
            "password123",
            "--role",
            "owner",
        ])
        .is_err());
    }

    #[tokio::test]
    async fn test_create_user_applies_policy_and_uniqueness() {
        let pool = db::test_pool().await;
        let config = Config::default();

        let err = create_user(&pool, &config, "Admin", "admin@example.jp", "short", Role::Admin)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least"));

        let user = create_user(
            &pool,
            &config,
            "Admin",
            "admin@example.jp",
            "password123",
            Role::Admin,
        )
        .await
        .unwrap();
        assert_eq!(user.role, Role::Admin);

        let err = create_user(
            &pool,
            &config,
            "Other",
            "admin@example.jp",
            "password123",
            Role::Viewer,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
