use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use gradedesk_core::domain::identity::Identity;

use crate::replies::{self, Reply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub identity: Identity,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundReply {
    pub identity: Identity,
    pub in_reply_to: String,
    #[serde(flatten)]
    pub reply: Reply,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream closed cleanly.
    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError>;
    async fn send(&self, reply: &OutboundReply) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport with no chat connection: the stream is closed from the start.
#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_message(&self) -> Result<Option<InboundMessage>, TransportError> {
        Ok(None)
    }

    async fn send(&self, _reply: &OutboundReply) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage, ctx: &EventContext) -> Reply;
}

struct Lane {
    sender: mpsc::Sender<InboundMessage>,
    last_enqueued: Instant,
}

/// Pumps inbound messages into one queue per identity. Each queue is drained
/// by a single task, so one identity's messages are handled in arrival order
/// while different identities run concurrently.
pub struct ChatRunner {
    transport: Arc<dyn ChatTransport>,
    handler: Arc<dyn MessageHandler>,
    reconnect_policy: ReconnectPolicy,
    lane_capacity: usize,
    lane_idle: Duration,
}

impl ChatRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        handler: Arc<dyn MessageHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self {
            transport,
            handler,
            reconnect_policy,
            lane_capacity: 64,
            lane_idle: Duration::from_secs(300),
        }
    }

    /// Messages arriving while an identity's lane already holds
    /// `lane_capacity` queued events are answered with a busy reply instead
    /// of being queued.
    pub fn with_lane_capacity(mut self, lane_capacity: usize) -> Self {
        self.lane_capacity = lane_capacity.max(1);
        self
    }

    /// Lanes with an empty queue and no traffic for `lane_idle` are closed.
    pub fn with_lane_idle(mut self, lane_idle: Duration) -> Self {
        self.lane_idle = lane_idle;
        self
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.chat.transport_failed",
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "chat transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "chat transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        let mut lanes: HashMap<Identity, Lane> = HashMap::new();
        let mut workers: JoinSet<Identity> = JoinSet::new();
        let mut notices: JoinSet<()> = JoinSet::new();

        let outcome = loop {
            let message = match self.transport.next_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!(attempt, "chat transport stream closed");
                    break Ok(());
                }
                Err(error) => break Err(error),
            };

            info!(
                event_name = "ingress.chat.message_received",
                message_id = %message.message_id,
                correlation_id = %message.message_id,
                identity = %message.identity,
                "received chat message"
            );

            reap_finished(&mut workers);
            while notices.try_join_next().is_some() {}
            self.close_idle_lanes(&mut lanes);
            self.enqueue(&mut lanes, &mut workers, &mut notices, message);
        };

        // Closing every sender lets each lane drain what it already holds.
        lanes.clear();
        while let Some(joined) = workers.join_next().await {
            log_lane_exit(joined);
        }
        while notices.join_next().await.is_some() {}

        outcome?;
        self.transport.disconnect().await
    }

    /// Never waits on a lane, so one flooding identity cannot hold up the
    /// pump for everyone else.
    fn enqueue(
        &self,
        lanes: &mut HashMap<Identity, Lane>,
        workers: &mut JoinSet<Identity>,
        notices: &mut JoinSet<()>,
        message: InboundMessage,
    ) {
        let identity = message.identity;
        let mut pending = message;

        if let Some(lane) = lanes.get_mut(&identity) {
            match lane.sender.try_send(pending) {
                Ok(()) => {
                    lane.last_enqueued = Instant::now();
                    return;
                }
                Err(TrySendError::Full(rejected)) => {
                    warn!(
                        event_name = "ingress.chat.lane_full",
                        correlation_id = %rejected.message_id,
                        identity = %identity,
                        capacity = self.lane_capacity,
                        "lane full; replying busy"
                    );
                    notices.spawn(send_busy(Arc::clone(&self.transport), rejected));
                    return;
                }
                Err(TrySendError::Closed(returned)) => pending = returned,
            }
        }

        let (sender, receiver) = mpsc::channel(self.lane_capacity);
        workers.spawn(run_lane(
            identity,
            receiver,
            Arc::clone(&self.handler),
            Arc::clone(&self.transport),
        ));
        debug!(event_name = "ingress.chat.lane_opened", identity = %identity, "lane opened");

        if sender.try_send(pending).is_err() {
            warn!(identity = %identity, "lane closed before its first message was queued");
        }
        lanes.insert(identity, Lane { sender, last_enqueued: Instant::now() });
    }

    fn close_idle_lanes(&self, lanes: &mut HashMap<Identity, Lane>) {
        lanes.retain(|_, lane| {
            let drained = lane.sender.capacity() == lane.sender.max_capacity();
            !(drained && lane.last_enqueued.elapsed() >= self.lane_idle)
        });
    }
}

async fn run_lane(
    identity: Identity,
    mut receiver: mpsc::Receiver<InboundMessage>,
    handler: Arc<dyn MessageHandler>,
    transport: Arc<dyn ChatTransport>,
) -> Identity {
    while let Some(message) = receiver.recv().await {
        let ctx = EventContext { correlation_id: message.message_id.clone() };
        let reply = handler.handle(&message, &ctx).await;
        let outbound =
            OutboundReply { identity, in_reply_to: message.message_id.clone(), reply };

        if let Err(error) = transport.send(&outbound).await {
            warn!(
                event_name = "egress.chat.reply_failed",
                correlation_id = %ctx.correlation_id,
                identity = %identity,
                error = %error,
                "failed to send reply; continuing lane"
            );
        } else {
            debug!(
                event_name = "egress.chat.reply_sent",
                correlation_id = %ctx.correlation_id,
                identity = %identity,
                "reply sent"
            );
        }
    }
    identity
}

async fn send_busy(transport: Arc<dyn ChatTransport>, message: InboundMessage) {
    let outbound = OutboundReply {
        identity: message.identity,
        in_reply_to: message.message_id,
        reply: replies::busy(),
    };
    if let Err(error) = transport.send(&outbound).await {
        warn!(
            event_name = "egress.chat.reply_failed",
            correlation_id = %outbound.in_reply_to,
            identity = %outbound.identity,
            error = %error,
            "failed to send busy reply"
        );
    }
}

fn reap_finished(workers: &mut JoinSet<Identity>) {
    while let Some(joined) = workers.try_join_next() {
        log_lane_exit(joined);
    }
}

fn log_lane_exit(joined: Result<Identity, tokio::task::JoinError>) {
    match joined {
        Ok(identity) => {
            debug!(event_name = "ingress.chat.lane_closed", identity = %identity, "lane closed");
        }
        Err(error) => {
            warn!(
                event_name = "ingress.chat.lane_failed",
                error = %error,
                "lane task ended abnormally; continuing"
            );
        }
    }
}
