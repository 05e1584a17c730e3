//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together:
//!
//! 1. Shared infrastructure (HTTP client, spawner, cancellation token)
//! 2. Subscriber registry (the reconciler's snapshot emitter)
//! 3. Art cache (depends on the HTTP client)
//! 4. Session reconciler (depends on the art cache and registry)
//!
//! Sources and the listener are started separately by
//! [`BootstrappedServices::start_background_tasks`] so callers can inspect or
//! replace pieces first.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::api::{BroadcastServer, SubscriberRegistry};
use crate::artwork::ArtCache;
use crate::error::{ArtError, NowPlayingResult};
use crate::events::{FanoutEmitter, LoggingEmitter, SnapshotEmitter};
use crate::pipe::{FifoOpener, PipeSupervisor};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::session::SessionReconciler;
use crate::sources::{MockSource, PipeSource, RendererSource};
use crate::state::Config;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Validated configuration the services were built from.
    pub config: Config,
    /// Thumbnail cache shared by the reconciler and the pipe source.
    pub art_cache: Arc<ArtCache>,
    /// Owner of the session record.
    pub reconciler: Arc<SessionReconciler>,
    /// Live subscribers and the current frame.
    pub subscribers: Arc<SubscriberRegistry>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Binds the subscriber listener and starts every background task.
    ///
    /// Returns the address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start_background_tasks(&self) -> NowPlayingResult<SocketAddr> {
        let server =
            BroadcastServer::bind(&self.config.bind_addr(), Arc::clone(&self.subscribers)).await?;
        let addr = server.local_addr()?;
        self.spawner.spawn(server.run(self.cancel_token.clone()));

        self.reconciler
            .start_art_completions(self.cancel_token.clone());

        if self.config.enable_pipe {
            let supervisor = PipeSupervisor::new(
                FifoOpener::new(&self.config.pipe_path),
                self.config.pipe_retry_delay(),
                self.config.pipe_read_chunk,
            );
            let source = PipeSource::new(Arc::clone(&self.reconciler), Arc::clone(&self.art_cache));
            let cancel = self.cancel_token.clone();
            self.spawner.spawn(async move {
                supervisor.run(&source, cancel).await;
            });
        }

        if self.config.enable_mock {
            let mock = MockSource::new(
                Arc::clone(&self.reconciler),
                Duration::from_secs(self.config.mock_interval_secs),
            );
            self.spawner.spawn(mock.run(self.cancel_token.clone()));
        }

        log::info!(
            "[Bootstrap] Started (listener {}, pipe {}, mock {})",
            addr,
            if self.config.enable_pipe { "on" } else { "off" },
            if self.config.enable_mock { "on" } else { "off" }
        );
        Ok(addr)
    }

    /// Adapter for a renderer whose events are delivered by the caller.
    ///
    /// Renderer discovery and event subscription live outside this crate; the
    /// embedding application forwards each notification to
    /// [`RendererSource::on_event`].
    #[must_use]
    pub fn renderer_source(&self) -> RendererSource {
        RendererSource::new(Arc::clone(&self.reconciler))
    }

    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Signal cancellation to all background tasks
        self.cancel_token.cancel();

        let closed = self.subscribers.close_all();
        log::info!("[Bootstrap] Closed {} subscriber(s)", closed);

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the HTTP client used for remote cover art.
fn create_http_client(timeout_secs: u64) -> NowPlayingResult<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(ArtError::from)?;
    Ok(client)
}

/// Bootstraps all services with their dependencies.
///
/// Must be called inside a Tokio runtime. The initial stopped record is
/// published right away so the first subscriber always gets a frame.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client cannot
/// be built.
pub fn bootstrap_services(config: &Config) -> NowPlayingResult<BootstrappedServices> {
    config.validate()?;

    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();
    let http_client = create_http_client(config.art_fetch_timeout_secs)?;

    let subscribers = Arc::new(SubscriberRegistry::new());
    let emitter = Arc::new(FanoutEmitter::new(vec![
        Arc::clone(&subscribers) as Arc<dyn SnapshotEmitter>,
        Arc::new(LoggingEmitter),
    ]));

    let art_cache = Arc::new(ArtCache::new(config, http_client));
    let reconciler = Arc::new(SessionReconciler::new(
        Arc::clone(&art_cache),
        emitter as Arc<dyn SnapshotEmitter>,
        spawner.clone(),
    ));

    subscribers.publish(&reconciler.snapshot());

    Ok(BootstrappedServices {
        config: config.clone(),
        art_cache,
        reconciler,
        subscribers,
        spawner,
        cancel_token,
    })
}
