// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level handle to one live edge connection.
//!
//! An [`Edge`] ties the pieces together: subscriptions go into a
//! [`SubscriptionRegistry`], the debounced union is handed to a
//! [`TransportSession`], and every snapshot the session receives is applied
//! to a [`CurrentDataCache`] and fanned out by a [`SubscriberDispatcher`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::{CurrentData, CurrentDataCache, Snapshot, ViewScope};
use crate::decode::StateDecoder;
use crate::dispatch::{SubscriberDispatcher, SubscriptionGuard};
use crate::error::{Error, ProtocolError};
use crate::event::{EdgeId, EventBus, EventStream};
use crate::manager::{ConnectionConfig, EdgeConfig};
use crate::protocol::{Connection, ConnectionState, Connector, RpcError, TransportSession};
use crate::subscription::{SubscriberId, SubscriptionHandle, SubscriptionRegistry};
use crate::types::ChannelAddress;

/// A live connection to one edge.
///
/// Cloning is cheap; clones share the same connection and subscribers.
/// The connection is shut down by [`shutdown`](Self::shutdown) or when the
/// last clone is dropped.
///
/// # Examples
///
/// ```no_run
/// use edge_live::{Edge, EdgeConfig};
/// use edge_live::types::ChannelAddress;
///
/// # async fn example() -> edge_live::Result<()> {
/// let edge = Edge::connect(EdgeConfig::websocket("edge0", "ws://192.168.1.20:8085/websocket"))?;
///
/// let _guard = edge.subscribe(
///     "soc-widget".into(),
///     [ChannelAddress::new("_sum", "EssSoc")],
///     |data| println!("SoC: {:?}", data.this_component("EssSoc")),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Edge {
    inner: Arc<EdgeInner>,
}

struct EdgeInner {
    id: EdgeId,
    registry: Arc<SubscriptionRegistry>,
    cache: Arc<CurrentDataCache>,
    dispatcher: SubscriberDispatcher,
    session: Arc<TransportSession>,
    events: EventBus,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EdgeInner {
    fn shutdown(&self) {
        self.session.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for EdgeInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Edge {
    /// Connects to an edge using the transport named in `config`.
    ///
    /// Returns immediately; the connection is established in the background
    /// and kept alive according to the configured reconnection policy.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the URL is malformed or
    /// the transport was not compiled in.
    pub fn connect(config: EdgeConfig) -> Result<Self, Error> {
        Self::connect_with_events(config, EventBus::new())
    }

    /// Like [`connect`](Self::connect), publishing events on a shared bus.
    pub(crate) fn connect_with_events(config: EdgeConfig, events: EventBus) -> Result<Self, Error> {
        let connector = BuiltinConnector::from_config(&config)?;
        Ok(Self::with_connector(config, connector, events))
    }

    /// Creates an edge over a custom connector, publishing events on `events`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_connector<C: Connector>(config: EdgeConfig, connector: C, events: EventBus) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let cache = Arc::new(CurrentDataCache::new());
        let dispatcher = SubscriberDispatcher::new(Arc::clone(&registry), Arc::clone(&cache));

        let (session, snapshots) = TransportSession::spawn(&config, connector, events.clone());
        let session = Arc::new(session);

        let pump = tokio::spawn(pump_subscriptions(
            Arc::clone(&registry),
            registry.watch_changes(),
            Arc::clone(&session),
            config.debounce,
        ));
        let processor = tokio::spawn(process_snapshots(
            config.edge_id.clone(),
            snapshots,
            Arc::clone(&cache),
            dispatcher.clone(),
        ));

        tracing::debug!(edge = %config.edge_id, "Edge started");

        Self {
            inner: Arc::new(EdgeInner {
                id: config.edge_id,
                registry,
                cache,
                dispatcher,
                session,
                events,
                tasks: Mutex::new(vec![pump, processor]),
            }),
        }
    }

    /// Returns the edge identifier.
    #[must_use]
    pub fn id(&self) -> &EdgeId {
        &self.inner.id
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribes to a set of channels.
    ///
    /// `on_update` runs for every snapshot applied after at least one of the
    /// addresses has been reported. The view's primary component is the
    /// component of the first address. Subscribing again under the same
    /// `subscriber_id` replaces the previous set.
    ///
    /// The subscription lasts until the returned guard is dropped or
    /// [`unsubscribe`](Self::unsubscribe) is called.
    pub fn subscribe<F>(
        &self,
        subscriber_id: SubscriberId,
        addresses: impl IntoIterator<Item = ChannelAddress>,
        on_update: F,
    ) -> SubscriptionGuard
    where
        F: Fn(&CurrentData) + Send + Sync + 'static,
    {
        self.inner
            .dispatcher
            .subscribe(subscriber_id, addresses, on_update)
    }

    /// Subscribes with an explicit primary component.
    pub fn subscribe_component<F>(
        &self,
        subscriber_id: SubscriberId,
        component_id: &str,
        addresses: impl IntoIterator<Item = ChannelAddress>,
        on_update: F,
    ) -> SubscriptionGuard
    where
        F: Fn(&CurrentData) + Send + Sync + 'static,
    {
        self.inner
            .dispatcher
            .subscribe_component(subscriber_id, component_id, addresses, on_update)
    }

    /// Subscribes to the channels a decoder reads and delivers decoded states.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use edge_live::{Edge, EdgeConfig};
    /// use edge_live::decode::GridOptimizedChargeDecoder;
    ///
    /// # fn example(edge: &Edge) {
    /// let decoder = GridOptimizedChargeDecoder::new("ctrlGridOptimizedCharge0");
    /// let _guard = edge.subscribe_decoded("gridOptimizedCharge".into(), decoder, |status| {
    ///     println!("{}", status.state);
    /// });
    /// # }
    /// ```
    pub fn subscribe_decoded<D, F>(
        &self,
        subscriber_id: SubscriberId,
        decoder: D,
        on_state: F,
    ) -> SubscriptionGuard
    where
        D: StateDecoder + Send + Sync + 'static,
        F: Fn(D::Output) + Send + Sync + 'static,
    {
        let addresses = decoder.channel_addresses();
        self.subscribe(subscriber_id, addresses, move |data| {
            on_state(decoder.decode(data));
        })
    }

    /// Removes a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        self.inner.dispatcher.unsubscribe(handle)
    }

    /// Returns the latest view for a subscriber.
    ///
    /// Values stay readable while the edge is disconnected.
    #[must_use]
    pub fn view(&self, subscriber_id: &SubscriberId) -> Option<CurrentData> {
        self.inner.dispatcher.view(subscriber_id)
    }

    /// Returns a view over every cached channel.
    #[must_use]
    pub fn current_data(&self) -> CurrentData {
        self.inner.cache.view(ViewScope::all())
    }

    /// Returns the union of all subscribed channels.
    #[must_use]
    pub fn current_union(&self) -> BTreeSet<ChannelAddress> {
        self.inner.registry.current_union()
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.dispatcher.len()
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.session.connection_state()
    }

    /// Returns a receiver following connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.session.watch_connection()
    }

    /// Waits until the edge is connected.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the session gave up or was shut
    /// down, and `ProtocolError::Timeout` if `timeout` elapses first.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), Error> {
        let session = &self.inner.session;
        let mut rx = session.watch_connection();
        let wait = rx.wait_for(|state| {
            state.is_connected() || state.is_failed() || session.is_stopped()
        });
        let state = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => return Err(Error::NotConnected),
            Err(_) => {
                let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(ProtocolError::Timeout(millis).into());
            }
        };
        if state.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Returns the error of the last rejected subscription request, if the
    /// edge has not accepted a later one on the current connection.
    #[must_use]
    pub fn last_rejection(&self) -> Option<RpcError> {
        self.inner.session.last_rejection()
    }

    /// Fails if the edge rejected the current subscription.
    ///
    /// # Errors
    ///
    /// Returns `Error::SubscriptionRejected` with the edge's error code and
    /// message.
    pub fn check_subscription(&self) -> Result<(), Error> {
        match self.last_rejection() {
            Some(rejection) => Err(Error::SubscriptionRejected {
                code: rejection.code,
                message: rejection.message,
            }),
            None => Ok(()),
        }
    }

    /// Subscribes to events published by this edge.
    ///
    /// Events of other edges sharing the same bus are filtered out.
    #[must_use]
    pub fn subscribe_events(&self) -> EventStream {
        self.inner.events.listen_to(self.inner.id.clone())
    }

    /// Stops the connection. Cached values stay readable.
    pub fn shutdown(&self) {
        tracing::debug!(edge = %self.inner.id, "Edge shutting down");
        self.inner.shutdown();
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.inner.id)
            .field("state", &self.connection_state())
            .field("subscribers", &self.inner.dispatcher.len())
            .field("generation", &self.inner.cache.generation())
            .finish_non_exhaustive()
    }
}

/// Forwards the registry union to the session, coalescing bursts of changes.
async fn pump_subscriptions(
    registry: Arc<SubscriptionRegistry>,
    mut changes: watch::Receiver<u64>,
    session: Arc<TransportSession>,
    debounce: Duration,
) {
    while changes.changed().await.is_ok() {
        if !debounce.is_zero() {
            tokio::time::sleep(debounce).await;
        }
        let version = *changes.borrow_and_update();
        let union = registry.current_union();
        let channels = union.len();
        if session.set_subscription(union) {
            tracing::debug!(edge = %session.edge_id(), version, channels, "Subscription changed");
        }
    }
}

/// Applies snapshots one at a time and delivers each before taking the next.
async fn process_snapshots(
    edge_id: EdgeId,
    mut snapshots: mpsc::Receiver<Snapshot>,
    cache: Arc<CurrentDataCache>,
    dispatcher: SubscriberDispatcher,
) {
    while let Some(snapshot) = snapshots.recv().await {
        let generation = cache.apply_snapshot(snapshot);
        tracing::trace!(
            edge = %edge_id,
            generation = generation.number(),
            channels = generation.touched().len(),
            "Snapshot applied"
        );
        dispatcher.publish(&generation);
    }
    tracing::debug!(edge = %edge_id, "Snapshot stream closed");
}

/// Connector chosen from a [`ConnectionConfig`].
enum BuiltinConnector {
    #[cfg(feature = "websocket")]
    WebSocket(crate::protocol::WebSocketConnector),
    #[cfg(feature = "mqtt")]
    Mqtt(crate::protocol::MqttConnector),
}

impl BuiltinConnector {
    fn from_config(config: &EdgeConfig) -> Result<Self, ProtocolError> {
        match &config.connection {
            #[cfg(feature = "websocket")]
            ConnectionConfig::WebSocket { url } => Ok(Self::WebSocket(
                crate::protocol::WebSocketConnector::new(url.clone())?,
            )),
            #[cfg(feature = "mqtt")]
            ConnectionConfig::Mqtt {
                broker_url,
                topic_prefix,
                credentials,
            } => {
                let mut connector = crate::protocol::MqttConnector::new(
                    broker_url,
                    topic_prefix.clone(),
                    config.edge_id.clone(),
                )?;
                if let Some((username, password)) = credentials {
                    connector = connector.with_credentials(username.clone(), password.clone());
                }
                Ok(Self::Mqtt(connector))
            }
            #[allow(unreachable_patterns)]
            _ => Err(ProtocolError::InvalidAddress(
                "transport not enabled in this build".to_string(),
            )),
        }
    }
}

impl Connector for BuiltinConnector {
    async fn connect(&self) -> Result<Connection, ProtocolError> {
        match *self {
            #[cfg(feature = "websocket")]
            Self::WebSocket(ref connector) => connector.connect().await,
            #[cfg(feature = "mqtt")]
            Self::Mqtt(ref connector) => connector.connect().await,
        }
    }
}
