//! Strongroom CLI - Command line interface for vault operations.
//!
//! This tool provides a command-line interface for creating, inspecting,
//! and operating on encrypted vaults.

mod commands;
mod output;
mod shell;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "strongroom")]
#[command(about = "Strongroom - Encrypted vault management")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault.
    Create {
        /// Directory to create the vault in (missing or empty).
        path: PathBuf,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long, default_value = "moderate")]
        strength: String,
    },

    /// List contents of a vault directory.
    #[command(alias = "ls")]
    List {
        /// Path to the vault.
        path: PathBuf,

        /// Directory within vault.
        #[arg(short = 'p', long = "path", default_value = "/")]
        inner: String,
    },

    /// Unlock a vault and start an interactive shell.
    Unlock {
        /// Path to the vault.
        path: PathBuf,
    },

    /// Copy a local file into the vault.
    #[command(alias = "put")]
    Upload {
        /// Path to the vault.
        path: PathBuf,

        /// Local file to upload.
        local: PathBuf,

        /// Destination directory in vault.
        #[arg(short, long, default_value = "/")]
        dest: String,
    },

    /// Copy a file out of the vault.
    #[command(alias = "get")]
    Download {
        /// Path to the vault.
        path: PathBuf,

        /// File inside the vault.
        vault_file: String,

        /// Local output file.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create a directory (and missing parents) in the vault.
    Mkdir {
        /// Path to the vault.
        path: PathBuf,

        /// Directory path to create.
        dir: String,
    },

    /// Delete a file or directory from the vault.
    #[command(alias = "rm")]
    Delete {
        /// Path to the vault.
        path: PathBuf,

        /// Path to delete.
        target: String,

        /// Delete directories with their contents.
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show vault information without unlocking it.
    Info {
        /// Path to the vault.
        path: PathBuf,
    },

    /// Change vault password.
    ChangePassword {
        /// Path to the vault.
        path: PathBuf,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("STRONGROOM_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut out = io::stdout();

    match cli.command {
        Commands::Create { path, strength } => {
            let kdf = commands::kdf_for(&strength)?;
            let password = prompt_password("Enter password for new vault: ")?;
            let confirm = prompt_password("Confirm password: ")?;
            commands::create(&path, &password, &confirm, &kdf, &mut out).await
        }

        Commands::List { path, inner } => {
            let password = prompt_password("Enter password: ")?;
            commands::list(&path, &password, &inner, &mut out).await
        }

        Commands::Unlock { path } => {
            let password = prompt_password("Enter password: ")?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            commands::unlock(&path, &password, input, &mut out).await
        }

        Commands::Upload { path, local, dest } => {
            let password = prompt_password("Enter password: ")?;
            commands::upload(&path, &password, &local, &dest, &mut out).await
        }

        Commands::Download {
            path,
            vault_file,
            output,
        } => {
            let password = prompt_password("Enter password: ")?;
            commands::download(&path, &password, &vault_file, &output, &mut out).await
        }

        Commands::Mkdir { path, dir } => {
            let password = prompt_password("Enter password: ")?;
            commands::mkdir(&path, &password, &dir, &mut out).await
        }

        Commands::Delete {
            path,
            target,
            recursive,
        } => {
            let password = prompt_password("Enter password: ")?;
            commands::delete(&path, &password, &target, recursive, &mut out).await
        }

        Commands::Info { path } => commands::info(&path, &mut out).await,

        Commands::ChangePassword { path } => {
            let old = prompt_password("Enter current password: ")?;
            let new = prompt_password("Enter new password: ")?;
            let confirm = prompt_password("Confirm new password: ")?;
            commands::change_password(&path, &old, &new, &confirm, &mut out).await
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "strongroom", &mut out);
            Ok(())
        }
    }
}
