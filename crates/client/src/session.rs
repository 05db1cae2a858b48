//! Per-job push channel session.
//!
//! Each submitted job gets exactly one push connection. The session walks
//! `Connecting -> Ready -> (Delivering | Erroring) -> Closed`: it announces
//! readiness, answers keep-alive pings, hands the first result it sees to
//! the [`Reconciler`], acknowledges it, and closes. Transport failures only
//! degrade the channel health indicator; recovery is the poller's job.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use genbridge_core::job::ResultEntry;
use genbridge_core::reconciler::Reconciler;
use genbridge_core::types::JobId;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use crate::client::PushClient;
use crate::health::ChannelHealth;
use crate::messages::{parse_message, AckStatus, ControlMessage, PushMessage, PONG};
use crate::pull::{query_and_apply, PullOutcome, StatusSource};

/// Lifecycle of a push session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Ready,
    Delivering,
    Erroring,
    Closed,
}

/// How a push session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// An image arrived and was handed to the reconciler.
    Delivered,
    /// An error notice arrived and was handed to the reconciler.
    Errored,
    /// The server pointed at the pull channel; carries the one-shot query result.
    HandedOff(PullOutcome),
    /// The server closed the connection without a result.
    ClosedByServer,
    /// The handshake failed.
    ConnectFailed,
    /// The connection broke mid-session.
    TransportError,
    /// The tracker is shutting down.
    Cancelled,
}

/// Shared collaborators every session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub reconciler: Arc<Reconciler>,
    pub status_source: Arc<dyn StatusSource>,
    pub health: ChannelHealth,
    /// Wait between acknowledging an image and closing.
    pub ack_grace: Duration,
    /// Wait between acknowledging an error and closing.
    pub error_grace: Duration,
    pub cancel: CancellationToken,
}

/// Open `job_id`'s push connection and drive it to completion.
///
/// Never returns an error: every failure is logged and folded into the
/// returned [`SessionOutcome`].
pub async fn run_push_session(
    client: &PushClient,
    job_id: JobId,
    ctx: &SessionContext,
) -> SessionOutcome {
    let ws_stream = tokio::select! {
        _ = ctx.cancel.cancelled() => return SessionOutcome::Cancelled,
        result = client.connect(&job_id) => match result {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    "Push connection failed, relying on status polling",
                );
                ctx.health.mark_degraded();
                return SessionOutcome::ConnectFailed;
            }
        },
    };

    ctx.health.mark_connected();
    let (sink, stream) = ws_stream.split();
    drive_session(job_id, sink, stream, ctx).await
}

/// Run the session state machine over an already-connected transport.
///
/// Split out from [`run_push_session`] so any `Sink`/`Stream` pair of
/// WebSocket messages can be driven.
pub async fn drive_session<Si, St>(
    job_id: JobId,
    sink: Si,
    mut stream: St,
    ctx: &SessionContext,
) -> SessionOutcome
where
    Si: Sink<Message, Error = WsError> + Unpin,
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut session = PushSession {
        job_id,
        state: SessionState::Connecting,
        sink,
        ctx,
    };

    let ready = ControlMessage::Ready {
        request_id: session.job_id.clone(),
    };
    if let Err(e) = session.send_text(ready.to_json()).await {
        return session.transport_failed(e);
    }
    session.transition(SessionState::Ready);

    loop {
        let frame = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                session.close(Duration::ZERO).await;
                return SessionOutcome::Cancelled;
            }
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => match parse_message(&text) {
                Ok(PushMessage::Ping) => {
                    if let Err(e) = session.send_text(PONG.to_string()).await {
                        return session.transport_failed(e);
                    }
                }
                Ok(PushMessage::Image { image_url }) => return session.deliver(image_url).await,
                Ok(PushMessage::Error { message }) => return session.fail(message).await,
                Ok(PushMessage::AlreadySent) => return session.hand_off().await,
                Err(e) => {
                    tracing::warn!(
                        job_id = %session.job_id,
                        error = %e,
                        raw_message = %text,
                        "Ignoring undecodable push message",
                    );
                }
            },
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!(job_id = %session.job_id, "Ignoring binary push frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(job_id = %session.job_id, ?frame, "Push channel closed by server");
                session.transition(SessionState::Closed);
                return SessionOutcome::ClosedByServer;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => return session.transport_failed(e),
            None => {
                tracing::info!(job_id = %session.job_id, "Push stream exhausted");
                session.transition(SessionState::Closed);
                return SessionOutcome::ClosedByServer;
            }
        }
    }
}

struct PushSession<'a, Si> {
    job_id: JobId,
    state: SessionState,
    sink: Si,
    ctx: &'a SessionContext,
}

impl<Si> PushSession<'_, Si>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    fn transition(&mut self, next: SessionState) {
        tracing::debug!(job_id = %self.job_id, from = ?self.state, to = ?next, "Push session state");
        self.state = next;
    }

    async fn send_text(&mut self, text: String) -> Result<(), WsError> {
        self.sink.send(Message::Text(text)).await
    }

    async fn send_ack(&mut self, status: AckStatus) -> Result<(), WsError> {
        let ack = ControlMessage::Acknowledgment {
            request_id: self.job_id.clone(),
            status,
        };
        self.send_text(ack.to_json()).await
    }

    async fn deliver(mut self, image_url: String) -> SessionOutcome {
        self.transition(SessionState::Delivering);
        self.ctx
            .reconciler
            .apply_result(ResultEntry::success(self.job_id.clone(), image_url))
            .await;

        if let Err(e) = self.send_ack(AckStatus::Received).await {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to acknowledge image");
            self.ctx.health.mark_degraded();
        }

        let grace = self.ctx.ack_grace;
        self.close(grace).await;
        SessionOutcome::Delivered
    }

    async fn fail(mut self, message: String) -> SessionOutcome {
        self.transition(SessionState::Erroring);
        self.ctx
            .reconciler
            .apply_result(ResultEntry::failure(self.job_id.clone(), message))
            .await;

        if let Err(e) = self.send_ack(AckStatus::ErrorReceived).await {
            tracing::debug!(job_id = %self.job_id, error = %e, "Failed to acknowledge error");
        }

        let grace = self.ctx.error_grace;
        self.close(grace).await;
        SessionOutcome::Errored
    }

    async fn hand_off(mut self) -> SessionOutcome {
        tracing::info!(job_id = %self.job_id, "Result already sent, querying status once");
        let outcome = query_and_apply(
            self.ctx.status_source.as_ref(),
            &self.ctx.reconciler,
            &self.job_id,
        )
        .await;

        self.close(Duration::ZERO).await;
        SessionOutcome::HandedOff(outcome)
    }

    fn transport_failed(mut self, error: WsError) -> SessionOutcome {
        tracing::warn!(
            job_id = %self.job_id,
            error = %error,
            "Push channel transport error, relying on status polling",
        );
        self.ctx.health.mark_degraded();
        self.transition(SessionState::Closed);
        SessionOutcome::TransportError
    }

    /// Wait `grace`, then send a normal closure frame and release the sink.
    async fn close(&mut self, grace: Duration) {
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            tracing::debug!(job_id = %self.job_id, error = %e, "Close frame not sent");
        }
        if let Err(e) = self.sink.close().await {
            tracing::debug!(job_id = %self.job_id, error = %e, "Push sink close failed");
        }
        self.transition(SessionState::Closed);
    }
}
