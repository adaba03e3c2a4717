//! # get_to_post
//!
//! An HTTP gateway that turns `GET` requests into authenticated JSON `POST`
//! calls against configured backends:
//!
//! - **Mapping**: a YAML file maps each GET path to a backend host and path
//! - **Credentials**: token, bearer or basic auth read from environment variables
//! - **Access control**: IP allow-list and per-client rate limit on every route
//! - **Observability**: request IDs forwarded to backends, structured logging,
//!   optional Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Access Guard (allow-list → rate limit) → Request ID → Trace│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (gateway forward, example echo)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestTranslator (lookup → auth headers → dispatch)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  OutboundClient (pooled reqwest client)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use get_to_post::{AppState, Config, EndpointStore, EnvCredentials, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let endpoints = EndpointStore::load(&config.endpoints_config)?;
//!     let state = AppState::new(config, endpoints, Arc::new(EnvCredentials))?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! RATE_LIMIT=60 ALLOWED_IPS=127.0.0.1 ENDPOINTS_CONFIG=./config.yml cargo run
//! ```

pub mod auth;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod outbound;
pub mod routes;
pub mod state;
pub mod translator;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use endpoints::{AuthMethod, EndpointDescriptor, EndpointStore};
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
pub use translator::{GatewayResponse, RequestTranslator};
