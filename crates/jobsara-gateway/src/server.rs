//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::FromRef, http::StatusCode};
use chrono::{DateTime, Utc};
use jobsara_core::{Config, Translator, WordTranslator};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::GatewayError;
use crate::auth::AuthState;
use crate::directory::TeacherDirectory;
use crate::handlers;
use crate::store::{CredentialStore, SledStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Gateway server state shared across handlers.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Teacher directory.
    pub directory: TeacherDirectory,
    /// Server start time.
    pub started_at: DateTime<Utc>,
}

impl FromRef<GatewayState> for Arc<AuthState> {
    fn from_ref(state: &GatewayState) -> Self {
        state.auth.clone()
    }
}

/// Gateway server.
pub struct Gateway {
    config: Config,
    state: GatewayState,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    store: Option<Arc<dyn CredentialStore>>,
    translator: Option<Arc<dyn Translator>>,
}

impl GatewayBuilder {
    /// Create a builder for `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            translator: None,
        }
    }

    /// Use `store` instead of opening the on-disk store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the message translator.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or store cannot be opened, or
    /// the signing secret is missing.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let store = match self.store {
            Some(store) => store,
            None => {
                let data_dir = self.config.data_dir();
                std::fs::create_dir_all(&data_dir)
                    .map_err(|e| GatewayError::Config(format!("Failed to create data dir: {e}")))?;
                tracing::debug!(path = %data_dir.display(), "Opening credential store");
                Arc::new(SledStore::open(&data_dir)?) as Arc<dyn CredentialStore>
            }
        };

        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(WordTranslator::builtin()));

        let auth = Arc::new(
            AuthState::initialize(self.config.auth.clone(), store, translator)
                .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
        );

        let state = GatewayState {
            directory: TeacherDirectory::new(auth.accounts.clone()),
            auth,
            started_at: Utc::now(),
        };

        Ok(Gateway {
            config: self.config,
            state,
        })
    }
}

impl Gateway {
    /// Create a gateway over the on-disk store.
    ///
    /// # Errors
    ///
    /// See [`GatewayBuilder::build`].
    pub fn new(config: Config) -> Result<Self, GatewayError> {
        GatewayBuilder::new(config).build()
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// API router with tracing, timeout and optional CORS layers.
    pub fn router(&self) -> Router {
        let router = handlers::routes()
            .with_state(self.state.clone())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.gateway.timeout_secs),
            ))
            .layer(TraceLayer::new_for_http());

        if self.config.gateway.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Run the gateway server until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.gateway.bind_address(),
            self.config.gateway.port
        )
        .parse()
        .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let purge = tokio::spawn(purge_sessions(self.state.auth.clone()));

        tracing::info!("Gateway API listening on http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(format!("API server error: {e}")));

        purge.abort();
        tracing::info!("Gateway stopped");
        result
    }
}

async fn purge_sessions(auth: Arc<AuthState>) {
    if !auth.sessions.persists_sessions() {
        return;
    }

    let mut interval = tokio::time::interval(PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match auth.sessions.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
            Err(e) => tracing::warn!("Session purge failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
