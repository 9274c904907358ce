// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport session: one logical, self-healing connection to an edge.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::cache::Snapshot;
use crate::event::{EdgeEvent, EdgeId, EventBus};
use crate::manager::{EdgeConfig, ReconnectionPolicy};
use crate::types::ChannelAddress;

use super::jsonrpc::{self, InboundMessage, RpcError, SubscribeChannelsRequest};
use super::{Connection, Connector, SequenceGate};

/// Connection state of a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, and not trying to.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Connected; snapshots are flowing.
    Connected,
    /// Waiting to retry, or retrying, after a failure.
    Reconnecting {
        /// Number of consecutive failed attempts so far.
        attempt: u32,
    },
    /// Gave up reconnecting.
    Failed(String),
}

impl ConnectionState {
    /// Returns true if the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the session gave up.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

type ChannelSet = Arc<BTreeSet<ChannelAddress>>;

struct SessionShared {
    edge_id: EdgeId,
    desired: watch::Sender<ChannelSet>,
    state: watch::Sender<ConnectionState>,
    stop: watch::Sender<bool>,
    stopped: AtomicBool,
    last_rejection: RwLock<Option<RpcError>>,
    requests_sent: AtomicU64,
    events: EventBus,
}

impl SessionShared {
    /// Moves to `next`. After shutdown only `Disconnected` is accepted.
    fn transition(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            let allowed =
                next == ConnectionState::Disconnected || !self.stopped.load(Ordering::Acquire);
            if !allowed || *current == next {
                return false;
            }
            *current = next.clone();
            true
        });
        if changed {
            tracing::debug!(edge = %self.edge_id, state = %next, "Connection state changed");
            self.events
                .publish(EdgeEvent::connection_changed(self.edge_id.clone(), next));
        }
    }
}

/// Handle to the background task that keeps one edge connected.
///
/// The session owns the desired channel set. Whenever that set changes it
/// sends the complete set to the edge in a single `subscribeChannels`
/// request; after a reconnect it resends the set before anything else.
/// Accepted `currentData` notifications are forwarded as [`Snapshot`]s on
/// the receiver returned by [`spawn`](Self::spawn), in strictly increasing
/// sequence order per connection.
///
/// Dropping the handle shuts the session down.
pub struct TransportSession {
    shared: Arc<SessionShared>,
    task: JoinHandle<()>,
}

impl TransportSession {
    /// Starts a session for the edge described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C: Connector>(
        config: &EdgeConfig,
        connector: C,
        events: EventBus,
    ) -> (Self, mpsc::Receiver<Snapshot>) {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(config.snapshot_buffer.max(1));
        let (desired, _) = watch::channel(ChannelSet::default());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (stop, _) = watch::channel(false);

        let shared = Arc::new(SessionShared {
            edge_id: config.edge_id.clone(),
            desired,
            state,
            stop,
            stopped: AtomicBool::new(false),
            last_rejection: RwLock::new(None),
            requests_sent: AtomicU64::new(0),
            events,
        });

        let options = LoopOptions {
            reconnection: config.reconnection.clone(),
            idle_timeout: config.idle_timeout,
        };
        let task = tokio::spawn(run(Arc::clone(&shared), connector, options, snapshot_tx));

        (Self { shared, task }, snapshot_rx)
    }

    /// Returns the edge this session connects to.
    #[must_use]
    pub fn edge_id(&self) -> &EdgeId {
        &self.shared.edge_id
    }

    /// Records the complete set of channels the edge should stream.
    ///
    /// Returns `false` and does nothing if the set equals the current one.
    pub fn set_subscription(&self, addresses: BTreeSet<ChannelAddress>) -> bool {
        self.shared.desired.send_if_modified(|current| {
            if **current == addresses {
                return false;
            }
            *current = Arc::new(addresses);
            true
        })
    }

    /// Returns the desired channel set.
    #[must_use]
    pub fn desired_subscription(&self) -> Arc<BTreeSet<ChannelAddress>> {
        Arc::clone(&self.shared.desired.borrow())
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Returns a receiver following connection state changes.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Returns the error of the last rejected subscription request.
    ///
    /// Only the answer to the most recent request counts. Cleared when the
    /// edge accepts a later request and on every new connection.
    #[must_use]
    pub fn last_rejection(&self) -> Option<RpcError> {
        self.shared.last_rejection.read().clone()
    }

    /// Returns the number of `subscribeChannels` requests sent so far.
    #[must_use]
    pub fn requests_sent(&self) -> u64 {
        self.shared.requests_sent.load(Ordering::Relaxed)
    }

    /// Stops the session and leaves it `Disconnected`.
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(edge = %self.shared.edge_id, "Shutting down transport session");
        self.shared.stop.send_replace(true);
        self.shared.transition(ConnectionState::Disconnected);
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Returns true once the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("edge_id", &self.shared.edge_id)
            .field("state", &*self.shared.state.borrow())
            .field("desired", &self.shared.desired.borrow().len())
            .finish_non_exhaustive()
    }
}

struct LoopOptions {
    reconnection: ReconnectionPolicy,
    idle_timeout: Option<Duration>,
}

enum DriveOutcome {
    Shutdown,
    ProcessorGone,
    Lost(String),
}

async fn run<C: Connector>(
    shared: Arc<SessionShared>,
    connector: C,
    options: LoopOptions,
    snapshot_tx: mpsc::Sender<Snapshot>,
) {
    let mut stop_rx = shared.stop.subscribe();
    let mut desired_rx = shared.desired.subscribe();
    let mut failures = 0u32;

    loop {
        shared.transition(if failures == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting { attempt: failures }
        });

        let connected = tokio::select! {
            result = connector.connect() => result,
            () = stopped(&mut stop_rx) => break,
        };

        let reason = match connected {
            Ok(connection) => {
                failures = 0;
                shared.transition(ConnectionState::Connected);
                tracing::info!(edge = %shared.edge_id, "Connected to edge");

                match drive(
                    &shared,
                    connection,
                    &mut desired_rx,
                    &mut stop_rx,
                    &snapshot_tx,
                    options.idle_timeout,
                )
                .await
                {
                    DriveOutcome::Shutdown => break,
                    DriveOutcome::ProcessorGone => {
                        tracing::debug!(edge = %shared.edge_id, "Snapshot receiver dropped");
                        break;
                    }
                    DriveOutcome::Lost(reason) => {
                        tracing::warn!(edge = %shared.edge_id, %reason, "Connection to edge lost");
                        reason
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    edge = %shared.edge_id,
                    error = %e,
                    attempt = failures,
                    "Connecting to edge failed"
                );
                e.to_string()
            }
        };

        let Some(delay) = options.reconnection.next_delay(failures) else {
            tracing::error!(edge = %shared.edge_id, %reason, "Giving up reconnecting to edge");
            shared.transition(ConnectionState::Failed(reason));
            return;
        };
        failures += 1;
        shared.transition(ConnectionState::Reconnecting { attempt: failures });

        // Safe: backoff delays are capped far below u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let delay_ms = delay.as_millis() as u64;
        tracing::debug!(edge = %shared.edge_id, attempt = failures, delay_ms, "Reconnecting");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = stopped(&mut stop_rx) => break,
        }
    }

    shared.transition(ConnectionState::Disconnected);
}

async fn drive(
    shared: &SessionShared,
    connection: Connection,
    desired_rx: &mut watch::Receiver<ChannelSet>,
    stop_rx: &mut watch::Receiver<bool>,
    snapshot_tx: &mpsc::Sender<Snapshot>,
    idle_timeout: Option<Duration>,
) -> DriveOutcome {
    let (outbound, mut inbound) = connection.into_parts();
    let mut gate = SequenceGate::new();
    // A fresh connection streams nothing until asked
    let mut subscribed = ChannelSet::default();
    // Only the answer to the latest request counts
    let mut pending: Option<String> = None;

    // A rejection belongs to the connection it was received on
    *shared.last_rejection.write() = None;

    let desired = Arc::clone(&desired_rx.borrow_and_update());
    match sync_subscription(shared, &outbound, &mut subscribed, desired).await {
        Ok(Some(id)) => pending = Some(id.to_string()),
        Ok(None) => {}
        Err(reason) => return DriveOutcome::Lost(reason),
    }
    let mut deadline = idle_deadline(idle_timeout, &subscribed);

    loop {
        tokio::select! {
            () = stopped(stop_rx) => return DriveOutcome::Shutdown,

            changed = desired_rx.changed() => {
                if changed.is_err() {
                    return DriveOutcome::Shutdown;
                }
                let desired = Arc::clone(&desired_rx.borrow_and_update());
                match sync_subscription(shared, &outbound, &mut subscribed, desired).await {
                    Ok(Some(id)) => {
                        pending = Some(id.to_string());
                        deadline = idle_deadline(idle_timeout, &subscribed);
                    }
                    Ok(None) => {}
                    Err(reason) => return DriveOutcome::Lost(reason),
                }
            }

            frame = inbound.recv() => {
                let Some(text) = frame else {
                    return DriveOutcome::Lost("connection closed".to_string());
                };
                deadline = idle_deadline(idle_timeout, &subscribed);
                if !handle_frame(shared, &text, &mut gate, pending.as_deref(), snapshot_tx).await {
                    return DriveOutcome::ProcessorGone;
                }
            }

            () = idle(deadline) => {
                let timeout = idle_timeout.unwrap_or_default();
                return DriveOutcome::Lost(format!("no data for {} ms", timeout.as_millis()));
            }
        }
    }
}

/// Resolves once shutdown was requested.
async fn stopped(stop_rx: &mut watch::Receiver<bool>) {
    // The borrow guard returned by `wait_for` is not `Send`; drop it here
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

/// An edge with nothing subscribed stays silent, so only a non-empty
/// subscription arms the idle timeout.
fn idle_deadline(idle_timeout: Option<Duration>, subscribed: &ChannelSet) -> Option<Instant> {
    if subscribed.is_empty() {
        return None;
    }
    idle_timeout.map(|timeout| Instant::now() + timeout)
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Sends `desired` unless the edge already streams it. Returns the id of
/// the request sent, if any.
async fn sync_subscription(
    shared: &SessionShared,
    outbound: &mpsc::Sender<String>,
    subscribed: &mut ChannelSet,
    desired: ChannelSet,
) -> Result<Option<Uuid>, String> {
    if desired == *subscribed {
        return Ok(None);
    }

    let count = shared.requests_sent.fetch_add(1, Ordering::Relaxed) + 1;
    let request = SubscribeChannelsRequest::new(count, &desired);
    let text = request.to_json().map_err(|e| e.to_string())?;
    outbound
        .send(text)
        .await
        .map_err(|_| "transport closed while subscribing".to_string())?;

    tracing::debug!(
        edge = %shared.edge_id,
        id = %request.id(),
        count,
        channels = desired.len(),
        "Sent subscribeChannels"
    );
    shared.events.publish(EdgeEvent::SubscriptionSent {
        edge_id: shared.edge_id.clone(),
        count,
        channels: desired.len(),
    });

    *subscribed = desired;
    Ok(Some(request.id()))
}

/// Handles one inbound frame. Returns `false` once snapshots have nowhere to go.
async fn handle_frame(
    shared: &SessionShared,
    text: &str,
    gate: &mut SequenceGate,
    pending: Option<&str>,
    snapshot_tx: &mpsc::Sender<Snapshot>,
) -> bool {
    match jsonrpc::parse_inbound(text) {
        Ok(InboundMessage::CurrentData { sequence, values }) => {
            if !gate.accept(sequence) {
                tracing::trace!(
                    edge = %shared.edge_id,
                    sequence,
                    last = ?gate.last(),
                    "Dropping out-of-order currentData"
                );
                return true;
            }
            snapshot_tx
                .send(Snapshot::new(sequence, values))
                .await
                .is_ok()
        }
        Ok(InboundMessage::Success { id } | InboundMessage::Failure { id, .. })
            if id.as_deref() != pending =>
        {
            tracing::debug!(
                edge = %shared.edge_id,
                id = ?id,
                pending = ?pending,
                "Ignoring response to a superseded or unknown request"
            );
            true
        }
        Ok(InboundMessage::Success { id }) => {
            tracing::debug!(edge = %shared.edge_id, id = ?id, "Subscription accepted");
            *shared.last_rejection.write() = None;
            true
        }
        Ok(InboundMessage::Failure { id, error }) => {
            tracing::warn!(
                edge = %shared.edge_id,
                id = ?id,
                code = error.code,
                message = %error.message,
                "Subscription rejected"
            );
            let event = EdgeEvent::SubscriptionRejected {
                edge_id: shared.edge_id.clone(),
                code: error.code,
                message: error.message.clone(),
            };
            *shared.last_rejection.write() = Some(error);
            shared.events.publish(event);
            true
        }
        Ok(InboundMessage::Unhandled { method }) => {
            tracing::debug!(edge = %shared.edge_id, %method, "Ignoring notification");
            true
        }
        Err(e) => {
            tracing::debug!(edge = %shared.edge_id, error = %e, "Dropping malformed frame");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::broadcast;

    use super::*;
    use crate::protocol::testing::ScriptedConnector;
    use crate::types::ChannelValue;

    const STEP: Duration = Duration::from_secs(5);

    fn addr(s: &str) -> ChannelAddress {
        s.parse().unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<ChannelAddress> {
        items.iter().map(|s| addr(s)).collect()
    }

    fn config() -> EdgeConfig {
        EdgeConfig::websocket("edge0", "ws://unused")
            .with_idle_timeout(Duration::from_secs(10))
            .with_reconnection(
                ReconnectionPolicy::new()
                    .with_initial_delay(Duration::from_millis(100))
                    .with_max_delay(Duration::from_secs(1)),
            )
    }

    async fn next_frame(device: &mut Connection) -> Value {
        let text = tokio::time::timeout(STEP, device.recv())
            .await
            .expect("frame in time")
            .expect("connection open");
        serde_json::from_str(&text).unwrap()
    }

    async fn notify(device: &Connection, sequence: u64, data: Value) {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "currentData",
            "params": { "sequence": sequence, "currentData": data },
        });
        device.send(frame.to_string()).await.unwrap();
    }

    async fn next_snapshot(rx: &mut mpsc::Receiver<Snapshot>) -> Snapshot {
        tokio::time::timeout(STEP, rx.recv())
            .await
            .expect("snapshot in time")
            .expect("session alive")
    }

    async fn wait_state(session: &TransportSession, pred: impl FnMut(&ConnectionState) -> bool) {
        let mut rx = session.watch_connection();
        tokio::time::timeout(STEP, rx.wait_for(pred))
            .await
            .expect("state in time")
            .unwrap();
    }

    fn channels_of(frame: &Value) -> Vec<String> {
        frame["params"]["channels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    // =========================================================================
    // Subscription requests
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn sends_desired_set_on_connect_and_change() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        session.set_subscription(set(&["c/A", "c/B"]));
        let frame = next_frame(&mut device).await;
        assert_eq!(frame["method"], "subscribeChannels");
        assert_eq!(frame["params"]["count"], 1);
        assert_eq!(channels_of(&frame), vec!["c/A", "c/B"]);

        session.set_subscription(set(&["c/B"]));
        let frame = next_frame(&mut device).await;
        assert_eq!(frame["params"]["count"], 2);
        assert_eq!(channels_of(&frame), vec!["c/B"]);
        assert_eq!(session.requests_sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn identical_set_is_not_resent() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        assert!(session.set_subscription(set(&["c/A"])));
        next_frame(&mut device).await;

        assert!(!session.set_subscription(set(&["c/A"])));
        let nothing = tokio::time::timeout(Duration::from_secs(1), device.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(session.requests_sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_set_is_not_sent_on_connect() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        wait_state(&session, ConnectionState::is_connected).await;
        let nothing = tokio::time::timeout(Duration::from_secs(1), device.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(session.requests_sent(), 0);
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn out_of_order_notifications_are_dropped() {
        let (connector, script) = ScriptedConnector::new();
        let device = script.accept();
        let (session, mut snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());
        wait_state(&session, ConnectionState::is_connected).await;

        notify(&device, 5, json!({"c/A": 1})).await;
        notify(&device, 5, json!({"c/A": 2})).await;
        notify(&device, 3, json!({"c/A": 3})).await;
        notify(&device, 6, json!({"c/A": null})).await;

        let first = next_snapshot(&mut snapshots).await;
        assert_eq!(first.sequence, 5);
        assert_eq!(first.values[&addr("c/A")], Some(ChannelValue::Integer(1)));

        let second = next_snapshot(&mut snapshots).await;
        assert_eq!(second.sequence, 6);
        assert_eq!(second.values[&addr("c/A")], None);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_ignored() {
        let (connector, script) = ScriptedConnector::new();
        let device = script.accept();
        let (session, mut snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());
        wait_state(&session, ConnectionState::is_connected).await;

        device.send("garbage".to_string()).await.unwrap();
        device
            .send(r#"{"jsonrpc":"2.0","method":"edgeConfig","params":{}}"#.to_string())
            .await
            .unwrap();
        notify(&device, 1, json!({"c/A": 1})).await;

        assert_eq!(next_snapshot(&mut snapshots).await.sequence, 1);
        assert!(session.connection_state().is_connected());
    }

    // =========================================================================
    // Reconnection
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn reconnect_resends_set_and_resets_sequence() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, mut snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        session.set_subscription(set(&["c/A", "c/B"]));
        let before = next_frame(&mut device).await;
        notify(&device, 40, json!({"c/A": 1})).await;
        assert_eq!(next_snapshot(&mut snapshots).await.sequence, 40);

        drop(device);
        wait_state(&session, |s| matches!(s, ConnectionState::Reconnecting { attempt: 1 })).await;

        let mut device = script.accept();
        let after = next_frame(&mut device).await;
        assert_eq!(channels_of(&after), channels_of(&before));
        assert_eq!(after["params"]["count"], 2);
        wait_state(&session, ConnectionState::is_connected).await;

        // Numbering restarts on the new connection
        notify(&device, 1, json!({"c/A": 2})).await;
        assert_eq!(next_snapshot(&mut snapshots).await.sequence, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_subscribed_connection_counts_as_lost() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        session.set_subscription(set(&["c/A"]));
        next_frame(&mut device).await;

        // Nothing arrives for longer than the 10 s idle timeout
        let mut rx = session.watch_connection();
        tokio::time::timeout(
            Duration::from_secs(20),
            rx.wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. })),
        )
        .await
        .expect("idle loss in time")
        .unwrap();
        assert_eq!(script.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_edge_without_subscriptions_stays_connected() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let config = EdgeConfig::websocket("edge0", "ws://unused");
        let (session, _snapshots) = TransportSession::spawn(&config, connector, EventBus::new());
        wait_state(&session, ConnectionState::is_connected).await;

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(script.attempts(), 1);
        assert!(session.connection_state().is_connected());

        // Emptying the set disarms the timeout again
        session.set_subscription(set(&["c/A"]));
        next_frame(&mut device).await;
        session.set_subscription(BTreeSet::new());
        assert!(channels_of(&next_frame(&mut device).await).is_empty());

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(script.attempts(), 1);
        assert!(session.connection_state().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let (connector, script) = ScriptedConnector::new();
        for _ in 0..3 {
            script.refuse("connection refused");
        }
        let config = config().with_reconnection(
            ReconnectionPolicy::new()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(10)),
        );
        let (session, _snapshots) = TransportSession::spawn(&config, connector, EventBus::new());

        wait_state(&session, ConnectionState::is_failed).await;
        assert_eq!(script.attempts(), 3);
        assert!(session.connection_state().to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_between_attempts() {
        let (connector, script) = ScriptedConnector::new();
        script.refuse("down");
        script.refuse("down");
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        let start = Instant::now();
        wait_state(&session, |s| matches!(s, ConnectionState::Reconnecting { attempt: 2 })).await;
        let _device = script.accept();
        wait_state(&session, ConnectionState::is_connected).await;

        // 100 ms after the first failure, 200 ms after the second
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    // =========================================================================
    // Rejections and events
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn rejection_is_recorded_and_published() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, events);

        session.set_subscription(set(&["c/A"]));
        let request = next_frame(&mut device).await;
        let response = json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": 1003, "message": "Access denied" },
        });
        device.send(response.to_string()).await.unwrap();

        let rejected = loop {
            match tokio::time::timeout(STEP, rx.recv()).await.unwrap() {
                Ok(EdgeEvent::SubscriptionRejected { code, message, .. }) => break (code, message),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
            }
        };
        assert_eq!(rejected, (1003, "Access denied".to_string()));
        assert_eq!(session.last_rejection().unwrap().code, 1003);
        assert!(session.connection_state().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn responses_to_other_requests_are_ignored() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, mut snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        session.set_subscription(set(&["c/A"]));
        let first = next_frame(&mut device).await;
        session.set_subscription(set(&["c/A", "c/B"]));
        let second = next_frame(&mut device).await;

        for id in [json!("not-ours"), first["id"].clone()] {
            let stale = json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": 1003, "message": "Access denied" },
            });
            device.send(stale.to_string()).await.unwrap();
        }
        // Frames are handled in order; once this arrives the errors were seen
        notify(&device, 1, json!({"c/A": 1})).await;
        next_snapshot(&mut snapshots).await;
        assert_eq!(session.last_rejection(), None);

        let current = json!({
            "jsonrpc": "2.0",
            "id": second["id"],
            "error": { "code": 1003, "message": "Access denied" },
        });
        device.send(current.to_string()).await.unwrap();
        notify(&device, 2, json!({"c/A": 2})).await;
        next_snapshot(&mut snapshots).await;
        assert_eq!(session.last_rejection().map(|e| e.code), Some(1003));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_clears_previous_rejection() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, mut snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());

        session.set_subscription(set(&["c/A"]));
        let request = next_frame(&mut device).await;
        let reply = json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": 1003, "message": "Access denied" },
        });
        device.send(reply.to_string()).await.unwrap();
        notify(&device, 1, json!({"c/A": 1})).await;
        next_snapshot(&mut snapshots).await;
        assert!(session.last_rejection().is_some());

        drop(device);
        let mut device = script.accept();
        let resent = next_frame(&mut device).await;
        assert_eq!(channels_of(&resent), vec!["c/A"]);
        assert_eq!(session.last_rejection(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_connection_and_subscription_events() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, events);

        session.set_subscription(set(&["c/A", "c/B"]));
        next_frame(&mut device).await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event);
        }
        let edge_id = EdgeId::new("edge0");
        assert!(seen.contains(&EdgeEvent::connection_changed(
            edge_id.clone(),
            ConnectionState::Connected
        )));
        assert!(seen.contains(&EdgeEvent::SubscriptionSent {
            edge_id,
            count: 1,
            channels: 2,
        }));
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn shutdown_disconnects() {
        let (connector, script) = ScriptedConnector::new();
        let mut device = script.accept();
        let (session, _snapshots) = TransportSession::spawn(&config(), connector, EventBus::new());
        wait_state(&session, ConnectionState::is_connected).await;

        session.shutdown();
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);

        // The transport side observes the close
        let closed = tokio::time::timeout(STEP, device.recv()).await.unwrap();
        assert!(closed.is_none());
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_after_failure_reports_disconnected() {
        let (connector, script) = ScriptedConnector::new();
        script.refuse("down");
        let config = config().with_reconnection(ReconnectionPolicy::disabled());
        let (session, _snapshots) = TransportSession::spawn(&config, connector, EventBus::new());

        wait_state(&session, ConnectionState::is_failed).await;
        session.shutdown();
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }
}
