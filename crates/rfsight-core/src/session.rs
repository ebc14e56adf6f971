// ── Session facade ──
//
// Full lifecycle management for one management-server connection.
// Owns the state container, the stream connector, and the single
// dispatch task that serializes every store mutation.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rfsight_api::wire::DeviceRecord;
use rfsight_api::{LinkState, RestClient, StreamHandle, TransportConfig};

use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, UnhandledMessage};
use crate::error::CoreError;
use crate::metrics::MetricsView;
use crate::model::{DeviceMonitor, NetworkKey};
use crate::seed;
use crate::store::DataStore;
use crate::stream::EntityStream;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Constructs the [`DataStore`] once and
/// injects it into the dispatcher and metrics view; there is no hidden
/// module-level state. [`connect`](Self::connect) is idempotent — at
/// most one stream connection is live at a time.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    store: Arc<DataStore>,
    metrics: MetricsView,
    dispatcher: Dispatcher,
    link_state: watch::Sender<LinkState>,
    cancel: CancellationToken,
    /// Child token for the current connection — cancelled on disconnect,
    /// replaced on reconnect (avoids permanent cancellation).
    cancel_child: Mutex<CancellationToken>,
    stream: Mutex<Option<StreamHandle>>,
    rest: Mutex<Option<Arc<RestClient>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Create a session from configuration. Does NOT connect — call
    /// [`connect()`](Self::connect) to open the stream.
    pub fn new(config: SessionConfig) -> Self {
        let store = Arc::new(DataStore::new(config.series_max_points));
        let (link_state, _) = watch::channel(LinkState::Idle);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(SessionInner {
                metrics: MetricsView::new(Arc::clone(&store)),
                dispatcher: Dispatcher::new(Arc::clone(&store)),
                config,
                store,
                link_state,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                stream: Mutex::new(None),
                rest: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Access the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Access the underlying state container.
    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    /// Memoized derived-metric accessors.
    pub fn metrics(&self) -> &MetricsView {
        &self.inner.metrics
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the stream connection and start the dispatch loop.
    ///
    /// Idempotent: a second call while connected is a no-op. The stream
    /// reconnects on its own per the configured policy; `connect` only
    /// needs to be called again after an explicit
    /// [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<(), CoreError> {
        let mut stream_guard = self.inner.stream.lock().await;
        if stream_guard.is_some() {
            debug!("stream already connected");
            return Ok(());
        }

        let ws_url = self.inner.config.stream_url()?;
        info!(url = %ws_url, "opening stream session");

        // Fresh child token for this connection (supports reconnect
        // after an explicit disconnect).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        let (handle, mut messages) = StreamHandle::connect(
            ws_url,
            self.inner.config.token.clone(),
            self.inner.config.reconnect.clone(),
            child.clone(),
        );

        let mut handles = self.inner.task_handles.lock().await;

        // Forward connector lifecycle state to the session-level watch.
        let mut connector_state = handle.state();
        let forward_inner = Arc::clone(&self.inner);
        let forward_cancel = child.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = forward_cancel.cancelled() => break,
                    changed = connector_state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *connector_state.borrow_and_update();
                        let _ = forward_inner.link_state.send(state);
                    }
                }
            }
        }));

        // The single consumer: every store mutation funnels through this
        // task, so messages apply strictly in arrival order.
        let dispatcher = self.inner.dispatcher.clone();
        let dispatch_cancel = child;
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = dispatch_cancel.cancelled() => break,
                    message = messages.recv() => {
                        let Some(message) = message else { break };
                        dispatcher.dispatch(message);
                    }
                }
            }
            debug!("dispatch loop exiting");
        }));
        drop(handles);

        *stream_guard = Some(handle);
        Ok(())
    }

    /// Close the stream and cancel every pending timer (heartbeat and
    /// reconnect). Store contents are kept — the dashboard keeps showing
    /// the last known state.
    pub async fn disconnect(&self) {
        // Locks are taken one at a time (same first lock as `connect`)
        // so a concurrent connect/disconnect pair cannot deadlock.
        let handle = self.inner.stream.lock().await.take();
        self.inner.cancel_child.lock().await.cancel();
        if let Some(handle) = handle {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let _ = self.inner.link_state.send(LinkState::Closed);
        debug!("session disconnected");
    }

    /// Observe the stream lifecycle (idle/connecting/open/backoff/closed).
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.inner.link_state.subscribe()
    }

    // ── Seeding & CRUD hooks ─────────────────────────────────────────

    /// Fetch the device listing for one network and seed baseline
    /// topology nodes. Idempotent — safe on every re-fetch.
    pub async fn seed_network(
        &self,
        organization_id: &str,
        network_id: &str,
    ) -> Result<usize, CoreError> {
        let rest = self.rest_client().await?;
        seed::seed_network_devices(&rest, &self.inner.store, organization_id, network_id).await
    }

    /// Adoption-time refresh from the CRUD layer: the given records
    /// replace stale device entries, discovery-owned nodes are kept.
    pub fn apply_adopted_devices(
        &self,
        organization_id: &str,
        network_id: &str,
        records: Vec<DeviceRecord>,
    ) {
        seed::apply_adopted_devices(&self.inner.store, organization_id, network_id, records);
    }

    /// CRUD-deletion hook: the merge never evicts adopted devices, so
    /// deleting one *must* go through here to leave the stores. Clears
    /// the topology node, the monitor entity, and the device's series.
    pub fn remove_device(
        &self,
        organization_id: &str,
        network_id: &str,
        device_id: &str,
    ) -> bool {
        self.inner
            .store
            .remove_device(&NetworkKey::new(organization_id, network_id), device_id)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to monitor-store snapshots.
    pub fn monitors(&self) -> EntityStream<DeviceMonitor> {
        EntityStream::new(self.inner.store.monitors.subscribe())
    }

    /// Subscribe to the unrecognized-message observability sink.
    pub fn subscribe_unhandled(&self) -> tokio::sync::broadcast::Receiver<Arc<UnhandledMessage>> {
        self.inner.dispatcher.subscribe_unhandled()
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn rest_client(&self) -> Result<Arc<RestClient>, CoreError> {
        let mut guard = self.inner.rest.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }
        let transport = TransportConfig {
            tls: self.inner.config.tls.clone(),
            timeout: self.inner.config.timeout,
        };
        let client = Arc::new(RestClient::new(
            self.inner.config.server_url.clone(),
            self.inner.config.token.as_ref(),
            &transport,
        )?);
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rfsight_api::ReconnectPolicy;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_config() -> SessionConfig {
        SessionConfig {
            // Nothing listens here; the connector just retries.
            server_url: "http://127.0.0.1:1".parse().unwrap(),
            reconnect: ReconnectPolicy {
                retry_delay: Duration::from_millis(50),
                max_retries: None,
            },
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn connect_is_idempotent_and_disconnect_reaps_tasks() {
        let session = Session::new(offline_config());
        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(session.inner.task_handles.lock().await.len(), 2);

        session.disconnect().await;
        assert!(session.inner.task_handles.lock().await.is_empty());
        assert_eq!(*session.link_state().borrow(), LinkState::Closed);

        // A fresh connect after disconnect is allowed.
        session.connect().await.unwrap();
        session.disconnect().await;
    }

    #[tokio::test]
    async fn seed_network_populates_topology_from_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "devices": [
                    { "id": "d1", "name": "core-sw" },
                    { "id": "d2", "name": "ap-1" }
                ]
            })))
            .mount(&server)
            .await;

        let session = Session::new(SessionConfig {
            server_url: server.uri().parse().unwrap(),
            ..SessionConfig::default()
        });

        let count = session.seed_network("org1", "net1").await.unwrap();
        assert_eq!(count, 2);

        let report = session.metrics().report("org1", "net1");
        assert_eq!(report.device_ids.len(), 2);
        // Seeded devices have no telemetry yet.
        assert_eq!(report.status.total, 0);
        assert_eq!(report.health, 0);
    }

    #[tokio::test]
    async fn remove_device_hook_clears_all_state() {
        let session = Session::new(SessionConfig::default());
        session.apply_adopted_devices(
            "org1",
            "net1",
            vec![serde_json::from_value(serde_json::json!({ "id": "d1" })).unwrap()],
        );
        assert!(session.remove_device("org1", "net1", "d1"));
        assert!(!session.remove_device("org1", "net1", "d1"));
        assert!(
            session
                .metrics()
                .device_ids_for_network("org1", "net1")
                .is_empty()
        );
    }
}
