use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use estate_gate::authz::{Role, RoleRepository, SqliteRoleRepository};
use estate_gate::routes::auth::fetch_user_by_email;

#[derive(Parser, Debug)]
#[command(author, version, about = "estate-gate admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Assign a role to a registered user (bootstraps the first admin)
    AssignRole {
        email: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// Revoke a role from a registered user
    RevokeRole {
        email: String,
        #[arg(value_parser = parse_role)]
        role: Role,
    },
    /// List the roles a user holds
    Roles { email: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::AssignRole { email, role } => {
            let pool = get_pool().await?;
            let user = fetch_user_by_email(&pool, &email).await?;
            let repo = SqliteRoleRepository::new(pool);
            if repo.assign_role(user.id, role).await? {
                println!("Assigned {} to {}", role, user.email);
            } else {
                println!("{} already holds {}", user.email, role);
            }
        }
        Commands::RevokeRole { email, role } => {
            let pool = get_pool().await?;
            let user = fetch_user_by_email(&pool, &email).await?;
            let repo = SqliteRoleRepository::new(pool);
            if repo.revoke_role(user.id, role).await? {
                println!("Revoked {} from {}", role, user.email);
            } else {
                println!("{} does not hold {}", user.email, role);
            }
        }
        Commands::Roles { email } => {
            let pool = get_pool().await?;
            let user = fetch_user_by_email(&pool, &email).await?;
            let repo = SqliteRoleRepository::new(pool);
            for value in repo.fetch_roles(user.id).await? {
                let marker = if value.parse::<Role>().is_ok() { "" } else { "  (unrecognized, ignored)" };
                println!("{}{}", value, marker);
            }
        }
    }

    Ok(())
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.to_lowercase().parse::<Role>().map_err(|err| err.to_string())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when running from the repo root, else the crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
