//! Serve command - start and probe the API server.

use crate::ui;
use anyhow::Result;
use jobsara_core::{Config, config::BindMode};

/// Serve command arguments.
#[derive(Debug, Clone)]
pub struct ServeArgs {
    /// Subcommand.
    pub action: ServeAction,
}

/// Serve actions.
#[derive(Debug, Clone)]
pub enum ServeAction {
    Run {
        /// Port to listen on.
        port: Option<u16>,
        /// Bind address.
        bind: Option<String>,
    },
    Status {
        /// Port to probe.
        port: Option<u16>,
    },
}

/// Run the serve command.
pub async fn run_serve(config: Config, args: ServeArgs) -> Result<()> {
    match args.action {
        ServeAction::Run { port, bind } => run_server(config, port, bind).await,
        ServeAction::Status { port } => server_status(port.unwrap_or(config.gateway.port)).await,
    }
}

fn bind_mode(bind: &str) -> BindMode {
    match bind {
        "local" | "loopback" => BindMode::Local,
        "public" | "lan" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

/// Start the API server.
async fn run_server(mut config: Config, port: Option<u16>, bind: Option<String>) -> Result<()> {
    if let Some(port) = port {
        config.gateway.port = port;
    }
    if let Some(bind) = bind {
        config.gateway.mode = bind_mode(&bind);
    }

    if config.auth.jwt_secret.is_none() {
        ui::error("No signing secret configured");
        ui::info("Run 'jobsara secret generate --save' or set JOBSARA_JWT_SECRET");
        anyhow::bail!("missing signing secret");
    }

    ui::header("Starting JobSara");
    ui::kv(
        "Address",
        &format!("{}:{}", config.gateway.bind_address(), config.gateway.port),
    );
    let mode_str = match &config.gateway.mode {
        BindMode::Local => "local",
        BindMode::Public => "public",
        BindMode::Custom(_) => "custom",
    };
    ui::kv("Mode", mode_str);
    ui::kv("Data", &config.data_dir().display().to_string());
    ui::kv(
        "Sessions",
        if config.auth.persist_sessions {
            "persistent"
        } else {
            "ephemeral (revocation disabled)"
        },
    );
    println!();

    ui::info("Press Ctrl+C to stop");
    println!();

    jobsara_gateway::start(config).await?;

    Ok(())
}

/// Check server status.
async fn server_status(port: u16) -> Result<()> {
    ui::header("Server Status");

    let client = reqwest::Client::new();
    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(std::time::Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::success(&format!("Server is running on port {port}"));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
                if let Some(uptime) = body.get("uptimeSecs").and_then(serde_json::Value::as_i64) {
                    ui::kv("Uptime", &format!("{uptime}s"));
                }
            }
        }
        Ok(resp) => {
            ui::warning(&format!("Health check returned {}", resp.status()));
        }
        Err(_) => {
            ui::warning(&format!("Server is not running on port {port}"));
            ui::info("Start with: jobsara serve run");
        }
    }

    Ok(())
}
