//! Shared application state for Axum handlers.
//!
//! - **Translator**: endpoint table, credential source and pooled outbound client
//! - **Access gates**: IP allow-list and per-client rate limiter
//! - **Configuration**: Runtime configuration access
//!
//! # Structured Concurrency
//!
//! The rate limiter's expired-window eviction runs as a background task managed
//! by `tokio_util::task::TaskTracker` and `CancellationToken`. Call
//! `shutdown()` to stop it before the process exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::credentials::CredentialProvider;
use crate::endpoints::EndpointStore;
use crate::error::{AppError, AppResult};
use crate::middleware::{IpAllowList, RateLimitGate, TrustedProxyConfig};
use crate::outbound::OutboundClient;
use crate::translator::RequestTranslator;

/// Shared application state, cloned into every handler.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config, endpoints, Arc::new(EnvCredentials))?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub translator: Arc<RequestTranslator>,
    pub allow_list: Arc<IpAllowList>,
    pub rate_limiter: RateLimitGate,
    pub trusted_proxies: TrustedProxyConfig,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build the state and start background maintenance.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the allow-list is empty, the rate
    /// limit is zero, or the outbound client cannot be built.
    pub fn new(
        config: Config,
        endpoints: EndpointStore,
        credentials: Arc<dyn CredentialProvider>,
    ) -> AppResult<Self> {
        let allow_list = IpAllowList::new(config.allowed_ips.iter().copied())?;
        let rate_limiter = RateLimitGate::new(config.rate_limit_per_minute)?;
        let trusted_proxies = TrustedProxyConfig::new(&config.trusted_proxies);

        let client = OutboundClient::new(&config).map_err(|e| {
            AppError::ConfigError(format!("Failed to build outbound HTTP client: {e}"))
        })?;
        let translator = RequestTranslator::new(Arc::new(endpoints), credentials, client);

        let state = Self {
            config: Arc::new(config),
            translator: Arc::new(translator),
            allow_list: Arc::new(allow_list),
            rate_limiter,
            trusted_proxies,
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_rate_limit_cleanup_task(state.config.rate_limit_cleanup_interval);

        Ok(state)
    }

    /// Periodically drop rate-limit windows that have ended.
    fn spawn_rate_limit_cleanup_task(&self, every: Duration) {
        let limiter = self.rate_limiter.clone();
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(every);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Rate limit cleanup task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        limiter.evict_idle();
                    }
                }
            }

            debug!("Rate limit cleanup task shutting down");
        });
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }
}
