//! Shared fixtures for the client integration tests.
//!
//! Provides a scripted pull-channel [`FakeStatusSource`], an in-memory
//! WebSocket transport for driving push sessions without a server, and
//! helpers for building a store/reconciler pair.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, StreamExt};
use genbridge_client::api::{ApiError, JobStatus};
use genbridge_client::health::ChannelHealth;
use genbridge_client::pull::StatusSource;
use genbridge_client::session::SessionContext;
use genbridge_core::events::{JobEvent, EVENT_CHANNEL_CAPACITY};
use genbridge_core::reconciler::Reconciler;
use genbridge_core::store::JobStore;
use genbridge_core::types::JobId;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

pub const ACK_GRACE: Duration = Duration::from_millis(500);
pub const ERROR_GRACE: Duration = Duration::from_millis(100);

pub fn id(raw: &str) -> JobId {
    JobId::parse(raw).unwrap()
}

// ---------------------------------------------------------------------------
// Scripted pull channel
// ---------------------------------------------------------------------------

/// Scripted answer for one status query. `Unreachable` maps to a 503.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(JobStatus),
    Unreachable,
}

/// Pull channel double. Each job replays its scripted replies in order
/// and keeps repeating the last one.
#[derive(Default)]
pub struct FakeStatusSource {
    replies: Mutex<HashMap<JobId, VecDeque<Reply>>>,
    calls: Mutex<Vec<JobId>>,
    delay: Mutex<Duration>,
}

impl FakeStatusSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, job: &str, replies: Vec<Reply>) {
        self.replies.lock().unwrap().insert(id(job), replies.into());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> Vec<JobId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, job: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == job).count()
    }

    fn next_reply(&self, job_id: &JobId) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(job_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl StatusSource for FakeStatusSource {
    async fn fetch_status(&self, job_id: &JobId) -> Result<JobStatus, ApiError> {
        self.calls.lock().unwrap().push(job_id.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(job_id) {
            Some(Reply::Status(status)) => Ok(status),
            Some(Reply::Unreachable) => Err(ApiError::ApiError {
                status: 503,
                body: "unavailable".into(),
            }),
            None => Err(ApiError::InvalidResponse(format!("no script for {job_id}"))),
        }
    }
}

pub fn completed(url: &str) -> Reply {
    Reply::Status(JobStatus::Completed {
        result: Some(url.into()),
    })
}

pub fn errored(message: &str) -> Reply {
    Reply::Status(JobStatus::Error {
        error: Some(message.into()),
    })
}

pub fn processing() -> Reply {
    Reply::Status(JobStatus::Processing)
}

// ---------------------------------------------------------------------------
// Store / reconciler / session context
// ---------------------------------------------------------------------------

pub struct Fixture {
    pub store: Arc<JobStore>,
    pub reconciler: Arc<Reconciler>,
    pub events: broadcast::Receiver<JobEvent>,
    pub ctx: SessionContext,
}

pub fn fixture(source: Arc<FakeStatusSource>) -> Fixture {
    let store = Arc::new(JobStore::new());
    let (event_tx, events) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), event_tx));
    let ctx = SessionContext {
        reconciler: Arc::clone(&reconciler),
        status_source: source,
        health: ChannelHealth::new(),
        ack_grace: ACK_GRACE,
        error_grace: ERROR_GRACE,
        cancel: CancellationToken::new(),
    };
    Fixture {
        store,
        reconciler,
        events,
        ctx,
    }
}

// ---------------------------------------------------------------------------
// In-memory WebSocket transport
// ---------------------------------------------------------------------------

/// Test side of an in-memory push connection.
pub struct Peer {
    /// Frames the "server" sends to the session.
    pub inbound: mpsc::UnboundedSender<Result<Message, WsError>>,
    /// Frames the session sent to the "server".
    pub outbound: mpsc::UnboundedReceiver<Message>,
}

impl Peer {
    pub fn send_text(&self, text: &str) {
        self.inbound
            .unbounded_send(Ok(Message::Text(text.to_string())))
            .unwrap();
    }

    /// Simulate the server ending the stream without a close frame.
    pub fn hang_up(&self) {
        self.inbound.close_channel();
    }

    /// Drain everything the session sent; completes once the session
    /// has released its sink.
    pub async fn sent(self) -> Vec<Message> {
        drop(self.inbound);
        self.outbound.collect().await
    }
}

pub fn transport() -> (
    Peer,
    impl Sink<Message, Error = WsError> + Unpin,
    mpsc::UnboundedReceiver<Result<Message, WsError>>,
) {
    let (in_tx, in_rx) = mpsc::unbounded();
    let (out_tx, out_rx) = mpsc::unbounded();
    let sink = out_tx.sink_map_err(|_| WsError::ConnectionClosed);
    (
        Peer {
            inbound: in_tx,
            outbound: out_rx,
        },
        sink,
        in_rx,
    )
}

pub fn text_of(message: &Message) -> Option<serde_json::Value> {
    match message {
        Message::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}
