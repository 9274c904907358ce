// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory connector for driving sessions from tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::error::ProtocolError;

use super::{Connection, Connector};

type Attempt = Result<Connection, ProtocolError>;

/// Connector whose outcomes are queued by the test.
///
/// `connect` waits until the test scripts the next outcome.
pub(crate) struct ScriptedConnector {
    attempts: Mutex<mpsc::UnboundedReceiver<Attempt>>,
    calls: Arc<AtomicU32>,
}

/// Test side of a [`ScriptedConnector`].
#[derive(Clone)]
pub(crate) struct Script {
    tx: mpsc::UnboundedSender<Attempt>,
    calls: Arc<AtomicU32>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> (Self, Script) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                attempts: Mutex::new(rx),
                calls: Arc::clone(&calls),
            },
            Script { tx, calls },
        )
    }
}

impl Script {
    /// Queues a successful connection and returns the device end.
    pub(crate) fn accept(&self) -> Connection {
        let (client, device) = Connection::pair(64);
        let _ = self.tx.send(Ok(client));
        device
    }

    /// Queues a failed connection attempt.
    pub(crate) fn refuse(&self, reason: &str) {
        let _ = self
            .tx
            .send(Err(ProtocolError::ConnectionFailed(reason.to_string())));
    }

    /// Returns how many times `connect` was called.
    pub(crate) fn attempts(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Connection, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut attempts = self.attempts.lock().await;
        match attempts.recv().await {
            Some(attempt) => attempt,
            None => Err(ProtocolError::ConnectionFailed(
                "no connection scripted".to_string(),
            )),
        }
    }
}
