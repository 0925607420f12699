//! JobSara CLI - server and administration commands.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use jobsara_core::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "jobsara")]
#[command(about = "JobSara - job board API server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.jobsara/jobsara.json)
    #[arg(long, global = true, env = "JOBSARA_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or probe the API server
    Serve {
        #[command(subcommand)]
        action: ServeCommands,
    },

    /// Signing secret helpers
    Secret {
        #[command(subcommand)]
        action: SecretCommands,
    },

    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },

    /// Account and session administration against the local store
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ServeCommands {
    /// Start the API server
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check whether the server answers its health endpoint
    Status {
        /// Port to probe
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Print a fresh hex signing secret
    Generate {
        /// Write it into the config file instead of printing it
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show full configuration (secret redacted)
    Show,

    /// Validate configuration
    Validate,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create an account
    Create {
        /// Username
        #[arg(long)]
        username: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Password (or use --generate-password)
        #[arg(long)]
        password: Option<String>,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,

        /// Role: job_seeker, intern, employer, teacher, or admin
        #[arg(long, default_value = "admin")]
        role: String,

        /// Given name
        #[arg(long, default_value = "JobSara")]
        first_name: String,

        /// Family name
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },

    /// List accounts
    List,

    /// Change an account's role (revokes its sessions)
    SetRole {
        /// Email or username
        #[arg(long)]
        user: String,

        /// New role
        #[arg(long)]
        role: String,
    },

    /// Reset an account's password (revokes its sessions)
    ResetPassword {
        /// Email or username
        #[arg(long)]
        user: String,

        /// New password; generated when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Revoke every session of an account
    RevokeSessions {
        /// Email or username
        #[arg(long)]
        user: String,
    },

    /// Delete an account and its sessions
    Delete {
        /// Email or username
        #[arg(long)]
        user: String,
    },

    /// Remove expired session records
    PurgeSessions,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref());
    let (log_format, debug) = loaded
        .as_ref()
        .map(|c| (c.settings.log_format, c.settings.debug))
        .unwrap_or((LogFormat::Pretty, false));
    init_logging(cli.verbose || debug, log_format);

    let Some(command) = cli.command else {
        ui::banner();
        ui::info("Run 'jobsara serve run' to start the server, or 'jobsara --help' for all commands.");
        return Ok(());
    };

    let config_path = cli.config.unwrap_or_else(jobsara_core::Config::default_path);

    match command {
        Commands::Serve { action } => {
            let args = match action {
                ServeCommands::Run { port, bind } => commands::serve::ServeArgs {
                    action: commands::serve::ServeAction::Run { port, bind },
                },
                ServeCommands::Status { port } => commands::serve::ServeArgs {
                    action: commands::serve::ServeAction::Status { port },
                },
            };
            commands::run_serve(loaded?, args).await?;
        }

        Commands::Secret { action } => match action {
            SecretCommands::Generate { save } => {
                commands::run_secret(&config_path, save)?;
            }
        },

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(&config_path, action)?;
        }

        Commands::Admin { action, data_dir } => {
            use commands::admin::AdminAction;

            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        username,
                        email,
                        password,
                        generate_password,
                        role,
                        first_name,
                        last_name,
                    } => AdminAction::Create {
                        username,
                        email,
                        password,
                        generate_password,
                        role,
                        first_name,
                        last_name,
                    },
                    AdminCommands::List => AdminAction::List,
                    AdminCommands::SetRole { user, role } => AdminAction::SetRole { user, role },
                    AdminCommands::ResetPassword { user, password } => {
                        AdminAction::ResetPassword { user, password }
                    }
                    AdminCommands::RevokeSessions { user } => AdminAction::RevokeSessions { user },
                    AdminCommands::Delete { user } => AdminAction::Delete { user },
                    AdminCommands::PurgeSessions => AdminAction::PurgeSessions,
                },
                data_dir,
            };
            commands::run_admin(loaded?, args).await?;
        }
    }

    Ok(())
}
