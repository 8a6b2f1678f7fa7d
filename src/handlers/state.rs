//! Shared service state
//!
//! One [`ServiceState`] is built at startup and shared across requests as an
//! `Arc`. It carries only immutable handles to the collaborators; requests
//! own no mutable in-process state of their own.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::config::ServerConfig;
use crate::generation::{GenerationClient, HttpTextGenerator, RetryPolicy};
use crate::records::StudentDirectory;
use crate::storage::{InsightRepository, RocksStore};

/// Immutable per-process state handed to every handler
pub struct ServiceState {
    pub directory: Arc<dyn StudentDirectory>,
    pub insights: Arc<dyn InsightRepository>,
    pub generation: GenerationClient,
    pub verifier: TokenVerifier,
    pub config: ServerConfig,
    /// Present when this process owns the embedded store; used only for
    /// the shutdown flush.
    rocks: Option<Arc<RocksStore>>,
}

impl ServiceState {
    /// Wire explicit collaborators (tests inject mocks through this)
    pub fn new(
        directory: Arc<dyn StudentDirectory>,
        insights: Arc<dyn InsightRepository>,
        generation: GenerationClient,
        verifier: TokenVerifier,
        config: ServerConfig,
    ) -> Self {
        Self {
            directory,
            insights,
            generation,
            verifier,
            config,
            rocks: None,
        }
    }

    /// Production wiring: embedded RocksDB store + HTTP generation provider
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let rocks = Arc::new(RocksStore::open(&config.storage_path)?);

        let generator = HttpTextGenerator::new(
            &config.generation.base_url,
            &config.generation.api_key,
            &config.generation.model,
            config.generation.request_timeout,
        )?;
        let generation = GenerationClient::new(
            Arc::new(generator),
            RetryPolicy {
                max_attempts: config.generation.max_attempts,
                base_delay: config.generation.base_delay,
            },
        );

        let verifier = TokenVerifier::new(&config.auth_secret);

        Ok(Self {
            directory: rocks.clone(),
            insights: rocks.clone(),
            generation,
            verifier,
            config,
            rocks: Some(rocks),
        })
    }

    /// Flush the embedded store, if this process owns one
    pub fn flush_storage(&self) -> anyhow::Result<()> {
        if let Some(rocks) = &self.rocks {
            rocks.flush()?;
        }
        Ok(())
    }
}

/// Lets the [`crate::auth::Educator`] extractor pull the verifier out of
/// shared state.
impl FromRef<Arc<ServiceState>> for TokenVerifier {
    fn from_ref(state: &Arc<ServiceState>) -> Self {
        state.verifier.clone()
    }
}
