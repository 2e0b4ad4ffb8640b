use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use synaptic_core::SynapticError;
use tokio::sync::Mutex;

use crate::config::ConnectionSettings;

/// Opens and closes store connections for a [`ConnectionManager`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Clone + Send + Sync;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<Self::Handle, SynapticError>;

    /// Close `handle`. Best-effort: failures are logged by the implementation
    /// and never reach the caller.
    async fn close(&self, handle: Self::Handle);
}

struct LiveConnection<H> {
    settings: ConnectionSettings,
    handle: H,
}

/// Holds at most one live connection plus the settings that produced it.
///
/// [`acquire`](Self::acquire) reuses the connection while the requested
/// settings compare equal to the remembered ones, and replaces it (close old,
/// then open new) when they differ. The whole check-and-replace runs under
/// one lock, so the remembered settings always describe the live handle.
///
/// Closing the replaced handle is bounded by a timeout (default
/// [`DEFAULT_CLOSE_TIMEOUT`]); an old server that never answers delays the
/// switch by at most that long.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    close_timeout: Duration,
    current: Mutex<Option<LiveConnection<C::Handle>>>,
}

/// Upper bound on the best-effort close of a replaced connection.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            current: Mutex::new(None),
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub async fn acquire(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<C::Handle, SynapticError> {
        let mut current = self.current.lock().await;

        if let Some(live) = current.as_ref() {
            if live.settings == *settings {
                tracing::debug!(
                    "ConnectionManager: reusing connection to {}",
                    settings.endpoint()
                );
                return Ok(live.handle.clone());
            }
        }

        if let Some(old) = current.take() {
            tracing::info!(
                "ConnectionManager: settings changed, closing connection to {}",
                old.settings.endpoint()
            );
            self.close(old).await;
        }

        // On failure the slot stays empty rather than pairing new settings
        // with no handle.
        let handle = self.connector.connect(settings).await?;
        tracing::info!("ConnectionManager: connected to {}", settings.endpoint());

        *current = Some(LiveConnection {
            settings: settings.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Parse `url` into [`ConnectionSettings`] and [`acquire`](Self::acquire).
    ///
    /// Settings are compared after parsing, so switching between a URL and
    /// equivalent discrete settings keeps the existing connection.
    pub async fn acquire_url(&self, url: &str) -> Result<C::Handle, SynapticError> {
        let settings = ConnectionSettings::parse_url(url)?;
        self.acquire(&settings).await
    }

    /// Settings of the live connection, if any.
    pub async fn current(&self) -> Option<ConnectionSettings> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|live| live.settings.clone())
    }

    /// Close the live connection, if any, and forget its settings.
    pub async fn reset(&self) {
        let old = self.current.lock().await.take();
        if let Some(old) = old {
            tracing::info!(
                "ConnectionManager: closing connection to {}",
                old.settings.endpoint()
            );
            self.close(old).await;
        }
    }

    async fn close(&self, old: LiveConnection<C::Handle>) {
        let endpoint = old.settings.endpoint();
        let closing = self.connector.close(old.handle);
        if tokio::time::timeout(self.close_timeout, closing).await.is_err() {
            tracing::warn!(
                "ConnectionManager: close of {endpoint} timed out after {:?}, abandoning it",
                self.close_timeout
            );
        }
    }
}

/// [`Connector`] producing self-healing Redis connections.
///
/// The handle is a [`redis::aio::ConnectionManager`]: once the server drops
/// the connection (restart, failover, idle kill), the next command fails and
/// the handle reconnects in the background, so later commands succeed again
/// without a new [`acquire`](ConnectionManager::acquire).
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl Connector for RedisConnector {
    type Handle = redis::aio::ConnectionManager;

    async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<redis::aio::ConnectionManager, SynapticError> {
        let url = settings.connection_url()?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| SynapticError::Config(format!("invalid Redis settings: {e}")))?;
        client
            .get_connection_manager()
            .await
            .map_err(|e| SynapticError::Store(format!("Redis connection error: {e}")))
    }

    async fn close(&self, mut handle: redis::aio::ConnectionManager) {
        let result: redis::RedisResult<()> = redis::cmd("QUIT").query_async(&mut handle).await;
        if let Err(e) = result {
            tracing::warn!("RedisConnector: QUIT failed: {e}");
        }
    }
}

static SHARED: OnceLock<Arc<ConnectionManager<RedisConnector>>> = OnceLock::new();

/// The process-wide Redis connection manager.
///
/// Every [`RedisCache`](crate::RedisCache) built with
/// [`init`](crate::RedisCache::init) shares this manager, and therefore one
/// connection. The connection is driven by the Tokio runtime that opened it.
pub fn shared_manager() -> Arc<ConnectionManager<RedisConnector>> {
    SHARED
        .get_or_init(|| Arc::new(ConnectionManager::new(RedisConnector)))
        .clone()
}
