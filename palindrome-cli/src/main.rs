//! Palindrome CLI
//!
//! Command-line interface for managing PostgreSQL schema migrations:
//! show the reconciled state, create migration file stubs, migrate to a
//! target, and verify every migration against a throwaway database.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use palindrome::{
    ConnectionConfig, LocalMigrations, MigrationError, MigrationId, Palindrome, TlsMode,
};
use std::fmt;
use std::io::Write;
use std::process;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "palindrome")]
#[command(about = "Manage PostgreSQL database migrations")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(flatten)]
    database: DatabaseOptions,

    /// Migrations directory path
    #[arg(long, default_value = "./migrations")]
    migrations_dir: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatabaseOptions {
    /// Postgres host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Postgres port
    #[arg(long, default_value_t = 5432)]
    port: u16,

    /// Postgres username
    #[arg(long, default_value = "postgres")]
    username: String,

    /// Postgres password (falls back to PALINDROME_DB_PASSWORD, then "postgres")
    #[arg(long)]
    password: Option<String>,

    /// Postgres database
    #[arg(long, default_value = "postgres")]
    database: String,

    /// TLS mode
    #[arg(long, value_enum, default_value_t = TlsArg::Prefer)]
    tls: TlsArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TlsArg {
    Disable,
    Prefer,
    Require,
}

impl DatabaseOptions {
    fn config(&self) -> ConnectionConfig {
        let password = self
            .password
            .clone()
            .or_else(|| std::env::var("PALINDROME_DB_PASSWORD").ok())
            .unwrap_or_else(|| "postgres".to_string());

        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password,
            database: self.database.clone(),
            tls: match self.tls {
                TlsArg::Disable => TlsMode::Disable,
                TlsArg::Prefer => TlsMode::Prefer,
                TlsArg::Require => TlsMode::Require,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Display the current state of migrations
    Show,

    /// Create a new migration file
    Create {
        /// Migration name (converted to a valid file name)
        name: String,
    },

    /// Apply or revert migrations to reach a target state
    Migrate {
        /// The target migration: "head", "zero", an index, or a name
        #[arg(default_value = "head")]
        reference: Reference,

        /// Skip confirmation prompts
        #[arg(long)]
        force: bool,
    },

    /// Verify that all migrations can be applied and reverted
    Verify,
}

/// How the user names a target migration on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    Head,
    Zero,
    Index(i32),
    Name(String),
}

impl FromStr for Reference {
    type Err = std::convert::Infallible;

    fn from_str(argument: &str) -> Result<Self, Self::Err> {
        // "0" must resolve to Zero, so check it before the index parse.
        Ok(if argument == "zero" || argument == "0" {
            Reference::Zero
        } else if let Ok(index) = argument.parse::<i32>() {
            Reference::Index(index)
        } else if argument == "head" {
            Reference::Head
        } else {
            Reference::Name(argument.to_string())
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Head => write!(f, "head"),
            Reference::Zero => write!(f, "zero"),
            Reference::Index(index) => write!(f, "index={index}"),
            Reference::Name(name) => write!(f, "name='{name}'"),
        }
    }
}

impl Reference {
    fn resolve(&self, local: &LocalMigrations) -> anyhow::Result<Option<MigrationId>> {
        let identifiers = local.list_identifiers()?;

        Ok(match self {
            Reference::Head => identifiers.last().cloned(),
            Reference::Zero => None,
            Reference::Index(index) => identifiers
                .iter()
                .rev()
                .find(|id| id.index == *index)
                .cloned(),
            Reference::Name(name) => identifiers
                .iter()
                .rev()
                .find(|id| id.name == *name || id.file_name() == *name)
                .cloned(),
        })
    }
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match &cli.command {
        Commands::Show => handle_show(&cli),
        Commands::Create { name } => handle_create(&cli, name),
        Commands::Migrate { reference, force } => handle_migrate(&cli, reference, *force),
        Commands::Verify => handle_verify(&cli),
    };

    if let Err(e) = result {
        eprintln!("{}", render_error(&e));
        process::exit(1);
    }
}

/// Render an error for the terminal, calling out consistency violations:
/// those mean the database no longer matches the recorded migration state
/// and retrying will not help.
fn render_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<MigrationError>() {
        Some(migration_error) if migration_error.is_consistency_violation() => {
            format!(
                "Fatal consistency error: {migration_error}\n\
                 Refusing to continue; inspect the palindrome_migrations table before retrying."
            )
        }
        _ => format!("Error: {error:#}"),
    }
}

fn open(cli: &Cli) -> anyhow::Result<Palindrome> {
    Palindrome::connect(&cli.database.config(), &cli.migrations_dir)
        .context("failed to open migration stores")
}

fn handle_show(cli: &Cli) -> anyhow::Result<()> {
    let palindrome = open(cli)?;
    let state = palindrome.state(None)?;
    println!("Migrations");
    println!("{}", state.formatted());
    Ok(())
}

fn handle_create(cli: &Cli, name: &str) -> anyhow::Result<()> {
    let local = LocalMigrations::new(&cli.migrations_dir)?;
    let id = local.create(name)?;
    println!("Created '{id}'");
    Ok(())
}

fn handle_migrate(cli: &Cli, reference: &Reference, force: bool) -> anyhow::Result<()> {
    let palindrome = open(cli)?;
    let state = palindrome.state(None)?;
    println!("{}", state.formatted());

    if *reference == Reference::Zero {
        if !state.has_applied() {
            println!("No applied migrations");
            return Ok(());
        }
        if !(force || confirm(&format!("Revert all {} migrations?", state.migrations.len()))) {
            println!("Ok. Exiting...");
            return Ok(());
        }
        println!("Reverting migrations...");
        palindrome.revert_all()?;
        let state = palindrome.state(None)?;
        println!("{}", state.formatted());
        return Ok(());
    }

    if let Some(first_conflict) = state.first_conflict().map(|m| m.id.clone()) {
        if !(force || confirm("Revert conflicting migrations?")) {
            println!("Ok. Exiting...");
            return Ok(());
        }
        println!("Reverting conflicting migrations...");
        palindrome.revert_to(&first_conflict)?;
    }

    let Some(target) = reference.resolve(&palindrome.local)? else {
        bail!("could not find migration matching reference {reference}");
    };

    if !(force || confirm("Apply migrations?")) {
        println!("Ok. Exiting...");
        return Ok(());
    }

    palindrome.migrate(&target).context("failed to migrate")?;

    let state = palindrome.state(None)?;
    println!("{}", state.formatted());
    Ok(())
}

fn handle_verify(cli: &Cli) -> anyhow::Result<()> {
    println!("Verifying migrations...");
    let palindrome = open(cli)?;
    palindrome.verify()?;
    println!("All migrations verified successfully");
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    loop {
        print!("{prompt} (y/N): \n> ");
        let _ = std::io::stdout().flush();

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return false;
        }
        match input.trim().to_lowercase().as_str() {
            "y" => return true,
            "n" | "" => return false,
            _ => println!("Invalid input. Please enter 'y' or 'n'."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reference_parsing() {
        assert_eq!(Reference::from_str("head").unwrap(), Reference::Head);
        assert_eq!(Reference::from_str("zero").unwrap(), Reference::Zero);
        assert_eq!(Reference::from_str("0").unwrap(), Reference::Zero);
        assert_eq!(Reference::from_str("12").unwrap(), Reference::Index(12));
        assert_eq!(
            Reference::from_str("create_users").unwrap(),
            Reference::Name("create_users".to_string())
        );
    }

    fn directory_with(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            fs::write(dir.path().join(name), "-- REVERT:\n").unwrap();
        }
        dir
    }

    #[test]
    fn head_resolves_to_last_identifier() {
        let dir = directory_with(&["000001_a.sql", "000002_b.sql"]);
        let local = LocalMigrations::new(dir.path()).unwrap();

        let id = Reference::Head.resolve(&local).unwrap().unwrap();
        assert_eq!(id, MigrationId::new(2, "b"));
    }

    #[test]
    fn index_and_name_resolution() {
        let dir = directory_with(&["000001_a.sql", "000002_b.sql"]);
        let local = LocalMigrations::new(dir.path()).unwrap();

        assert_eq!(
            Reference::Index(1).resolve(&local).unwrap(),
            Some(MigrationId::new(1, "a"))
        );
        assert_eq!(
            Reference::Name("b".to_string()).resolve(&local).unwrap(),
            Some(MigrationId::new(2, "b"))
        );
        assert_eq!(
            Reference::Name("000001_a.sql".to_string())
                .resolve(&local)
                .unwrap(),
            Some(MigrationId::new(1, "a"))
        );
        assert_eq!(Reference::Index(9).resolve(&local).unwrap(), None);
        assert_eq!(Reference::Zero.resolve(&local).unwrap(), None);
    }

    #[test]
    fn consistency_violations_render_as_fatal() {
        let error = anyhow::Error::from(MigrationError::MissingRevert(MigrationId::new(
            2,
            "create_articles",
        )))
        .context("failed to migrate");

        let rendered = render_error(&error);
        assert!(rendered.starts_with("Fatal consistency error:"), "{rendered}");
        assert!(rendered.contains("000002_create_articles.sql"), "{rendered}");
    }

    #[test]
    fn ordinary_errors_render_with_plain_prefix() {
        let error = anyhow::Error::from(MigrationError::ConflictsExist);
        assert!(render_error(&error).starts_with("Error:"));

        let error = anyhow::anyhow!("connection refused");
        assert!(render_error(&error).starts_with("Error:"));
    }

    #[test]
    fn tls_arg_maps_to_connection_tls() {
        let options = DatabaseOptions {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: Some("pw".to_string()),
            database: "postgres".to_string(),
            tls: TlsArg::Require,
        };
        assert_eq!(options.config().tls, TlsMode::Require);
        assert_eq!(options.config().password, "pw");
    }
}
