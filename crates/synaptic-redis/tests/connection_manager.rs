use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use synaptic_core::SynapticError;
use synaptic_redis::{ConnectionManager, ConnectionSettings, Connector, TlsMode};
use tokio::sync::Mutex;

/// Connector that hands out numbered handles and records every call.
///
/// Clones share their counters and event log.
#[derive(Clone, Default)]
struct RecordingConnector {
    next_id: Arc<AtomicU32>,
    events: Arc<Mutex<Vec<String>>>,
    refuse: bool,
    connect_delay: Option<Duration>,
    hang_on_close: bool,
}

impl RecordingConnector {
    async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }

    async fn count(&self, prefix: &str) -> usize {
        self.events()
            .await
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    type Handle = u32;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<u32, SynapticError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse {
            self.events
                .lock()
                .await
                .push(format!("refused {}", settings.endpoint()));
            return Err(SynapticError::Store("connection refused".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.events
            .lock()
            .await
            .push(format!("connect {} -> {id}", settings.endpoint()));
        Ok(id)
    }

    async fn close(&self, handle: u32) {
        self.events.lock().await.push(format!("close {handle}"));
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
    }
}

fn settings(host: &str) -> ConnectionSettings {
    ConnectionSettings {
        host: host.to_string(),
        ..Default::default()
    }
}

fn manager() -> (RecordingConnector, ConnectionManager<RecordingConnector>) {
    let connector = RecordingConnector::default();
    (connector.clone(), ConnectionManager::new(connector))
}

#[tokio::test]
async fn first_acquire_connects() {
    let (connector, manager) = manager();
    assert!(manager.current().await.is_none());

    let handle = manager.acquire(&settings("a")).await.unwrap();
    assert_eq!(handle, 0);
    assert_eq!(manager.current().await, Some(settings("a")));
    assert_eq!(connector.events().await, vec!["connect a:6379 -> 0"]);
}

#[tokio::test]
async fn equal_settings_reuse_connection() {
    let (connector, manager) = manager();

    let first = manager.acquire(&settings("a")).await.unwrap();
    // A separately built but structurally equal value.
    let second = manager.acquire(&settings("a")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(connector.count("connect").await, 1);
    assert_eq!(connector.count("close").await, 0);
}

#[tokio::test]
async fn changed_settings_close_then_reconnect() {
    let (connector, manager) = manager();

    manager.acquire(&settings("a")).await.unwrap();
    let handle = manager.acquire(&settings("b")).await.unwrap();

    assert_eq!(handle, 1);
    assert_eq!(
        connector.events().await,
        vec!["connect a:6379 -> 0", "close 0", "connect b:6379 -> 1"]
    );
    assert_eq!(manager.current().await, Some(settings("b")));
}

#[tokio::test]
async fn any_field_change_counts_as_new_settings() {
    let (connector, manager) = manager();
    let base = settings("a");

    manager.acquire(&base).await.unwrap();
    manager
        .acquire(&ConnectionSettings {
            password: Some("secret".to_string()),
            ..base.clone()
        })
        .await
        .unwrap();
    manager
        .acquire(&ConnectionSettings {
            tls: TlsMode::AcceptInvalidCertificates,
            ..base.clone()
        })
        .await
        .unwrap();

    assert_eq!(connector.count("connect").await, 3);
    assert_eq!(connector.count("close").await, 2);
}

#[tokio::test]
async fn url_and_equivalent_settings_share_connection() {
    let (connector, manager) = manager();

    manager
        .acquire_url("redis://user:pw@cache.internal:6380/0")
        .await
        .unwrap();
    manager
        .acquire(&ConnectionSettings {
            host: "cache.internal".to_string(),
            port: 6380,
            username: Some("user".to_string()),
            password: Some("pw".to_string()),
            tls: TlsMode::Disabled,
            db: 0,
        })
        .await
        .unwrap();

    assert_eq!(connector.count("connect").await, 1);
}

#[tokio::test]
async fn invalid_url_fails_without_touching_connection() {
    let (connector, manager) = manager();
    manager.acquire(&settings("a")).await.unwrap();

    let err = manager.acquire_url("not a url").await.unwrap_err();
    assert!(matches!(err, SynapticError::Config(_)));
    assert_eq!(manager.current().await, Some(settings("a")));
    assert_eq!(connector.count("close").await, 0);
}

#[tokio::test]
async fn failed_connect_leaves_manager_empty() {
    let connector = RecordingConnector {
        refuse: true,
        ..Default::default()
    };
    let manager = ConnectionManager::new(connector.clone());

    let err = manager.acquire(&settings("a")).await.unwrap_err();
    assert!(matches!(err, SynapticError::Store(_)));
    assert!(manager.current().await.is_none());
}

#[tokio::test]
async fn reset_closes_and_forgets() {
    let (connector, manager) = manager();
    manager.acquire(&settings("a")).await.unwrap();

    manager.reset().await;
    assert!(manager.current().await.is_none());

    manager.acquire(&settings("a")).await.unwrap();
    assert_eq!(
        connector.events().await,
        vec!["connect a:6379 -> 0", "close 0", "connect a:6379 -> 1"]
    );
}

#[tokio::test]
async fn concurrent_acquires_agree_with_final_state() {
    let connector = RecordingConnector {
        connect_delay: Some(Duration::from_millis(5)),
        ..Default::default()
    };
    let manager = Arc::new(ConnectionManager::new(connector.clone()));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let manager = manager.clone();
        let host = if i % 2 == 0 { "a" } else { "b" };
        tasks.push(tokio::spawn(async move {
            manager.acquire(&settings(host)).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Every replacement closed exactly the handle it replaced, so exactly
    // one handle is left open, and it belongs to the remembered settings.
    let connects = connector.count("connect").await;
    let closes = connector.count("close").await;
    assert_eq!(connects, closes + 1);

    let current = manager.current().await.unwrap();
    let events = connector.events().await;
    let last_connect = events
        .iter()
        .rev()
        .find(|e| e.starts_with("connect"))
        .unwrap();
    assert!(last_connect.starts_with(&format!("connect {}", current.endpoint())));
}

#[tokio::test]
async fn hung_close_does_not_block_replacement() {
    let connector = RecordingConnector {
        hang_on_close: true,
        ..Default::default()
    };
    let manager =
        ConnectionManager::new(connector.clone()).with_close_timeout(Duration::from_millis(50));

    manager.acquire(&settings("a")).await.unwrap();
    let handle = tokio::time::timeout(Duration::from_secs(2), manager.acquire(&settings("b")))
        .await
        .expect("acquire stuck behind close")
        .unwrap();

    assert_eq!(handle, 1);
    assert_eq!(manager.current().await, Some(settings("b")));
    assert_eq!(
        connector.events().await,
        vec!["connect a:6379 -> 0", "close 0", "connect b:6379 -> 1"]
    );

    // The lock is free again: other callers get the new connection.
    let again = tokio::time::timeout(Duration::from_millis(200), manager.acquire(&settings("b")))
        .await
        .expect("manager still locked")
        .unwrap();
    assert_eq!(again, 1);
}

#[tokio::test]
async fn hung_close_does_not_block_reset() {
    let connector = RecordingConnector {
        hang_on_close: true,
        ..Default::default()
    };
    let manager =
        ConnectionManager::new(connector.clone()).with_close_timeout(Duration::from_millis(50));

    manager.acquire(&settings("a")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), manager.reset())
        .await
        .expect("reset stuck behind close");

    assert!(manager.current().await.is_none());
    assert_eq!(connector.count("close").await, 1);
}
