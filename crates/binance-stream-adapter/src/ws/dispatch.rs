/*
[INPUT]:  RawMessageStream from a Connector, bound decoder and handler
[OUTPUT]: Handler invocations in arrival order, drop counters, terminal state
[POS]:    WebSocket layer - per-subscription pull/decode/invoke loop
[UPDATE]: When changing cancellation, drop classification or log sampling
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{DispatchError, Result};
use crate::ws::connection::{RawMessage, RawMessageStream};
use crate::ws::decode::EventDecoder;

const DECODE_FAIL_LOG_LIMIT: u64 = 3;
const UNROUTABLE_LOG_LIMIT: u64 = 3;
const RAW_LOG_MAX_BYTES: usize = 512;

/// Lifecycle of one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    /// Caller signalled the handle
    Cancelled,
    /// Connection ended cleanly
    Closed,
    /// Connection failed; carries the transport error text
    Failed(String),
}

impl SubscriptionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionState::Active)
    }
}

/// Per-subscription counters, readable while the loop runs.
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    delivered: AtomicU64,
    decode_failures: AtomicU64,
    unroutable: AtomicU64,
    filtered: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub decode_failures: u64,
    pub unroutable: u64,
    pub filtered: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
        }
    }

    fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count before this drop, used as the log sample index
    fn record_drop(&self, err: &DispatchError) -> u64 {
        let counter = match err {
            DispatchError::Decode(_) => &self.decode_failures,
            DispatchError::Unroutable(_) => &self.unroutable,
            DispatchError::Filtered { .. } => &self.filtered,
        };
        counter.fetch_add(1, Ordering::Relaxed)
    }
}

pub(crate) struct Dispatcher<D, H> {
    pub(crate) id: Uuid,
    pub(crate) endpoint: String,
    pub(crate) decoder: D,
    pub(crate) handler: H,
    pub(crate) stats: Arc<DispatchStats>,
    pub(crate) state: watch::Sender<SubscriptionState>,
    pub(crate) cancel: CancellationToken,
}

impl<D, H> Dispatcher<D, H>
where
    D: EventDecoder,
    H: FnMut(D::Event) + Send + 'static,
{
    /// Runs until cancellation, clean close or a transport error.
    ///
    /// Only the transport error is returned; per-message failures are
    /// counted, logged and skipped.
    pub(crate) async fn run(mut self, mut source: RawMessageStream) -> Result<()> {
        debug!(subscription_id = %self.id, endpoint = %self.endpoint, "dispatch loop started");

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Ok(SubscriptionState::Cancelled),
                next = source.next() => next,
            };

            match next {
                Some(Ok(raw)) => {
                    // a buffered message must not reach the handler after cancel
                    if self.cancel.is_cancelled() {
                        break Ok(SubscriptionState::Cancelled);
                    }
                    self.dispatch(raw);
                }
                Some(Err(err)) => break Err(err),
                None => break Ok(SubscriptionState::Closed),
            }
        };

        drop(source);

        match outcome {
            Ok(state) => {
                info!(
                    subscription_id = %self.id,
                    endpoint = %self.endpoint,
                    state = ?state,
                    delivered = self.stats.delivered.load(Ordering::Relaxed),
                    "subscription stopped"
                );
                self.state.send_replace(state);
                Ok(())
            }
            Err(err) => {
                warn!(
                    subscription_id = %self.id,
                    endpoint = %self.endpoint,
                    error = %err,
                    "subscription terminated by transport error"
                );
                self.state.send_replace(SubscriptionState::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn dispatch(&mut self, raw: RawMessage) {
        self.stats.record_received();
        match self.decoder.decode(raw.payload()) {
            Ok(event) => {
                self.stats.record_delivered();
                (self.handler)(event);
            }
            Err(err) => {
                let count = self.stats.record_drop(&err);
                self.log_drop(&raw, &err, count);
            }
        }
    }

    fn log_drop(&self, raw: &RawMessage, err: &DispatchError, count: u64) {
        match err {
            DispatchError::Decode(_) => {
                if count < DECODE_FAIL_LOG_LIMIT {
                    warn!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        sample_index = count + 1,
                        sample_limit = DECODE_FAIL_LOG_LIMIT,
                        error = %err,
                        bytes = raw.payload().len(),
                        "ws message decode failed"
                    );
                    debug!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        message = %preview(raw),
                        "ws message decode failed"
                    );
                } else {
                    debug!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        error = %err,
                        "ws message decode failed"
                    );
                }
            }
            DispatchError::Unroutable(_) => {
                if count < UNROUTABLE_LOG_LIMIT {
                    info!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        sample_index = count + 1,
                        sample_limit = UNROUTABLE_LOG_LIMIT,
                        error = %err,
                        "ws message event type unroutable"
                    );
                    debug!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        message = %preview(raw),
                        "ws message event type unroutable"
                    );
                } else {
                    debug!(
                        subscription_id = %self.id,
                        sequence = raw.sequence(),
                        error = %err,
                        "ws message event type unroutable"
                    );
                }
            }
            DispatchError::Filtered { event_type } => {
                trace!(
                    subscription_id = %self.id,
                    sequence = raw.sequence(),
                    event_type,
                    "ws message filtered"
                );
            }
        }
    }
}

fn preview(raw: &RawMessage) -> String {
    match raw.as_text() {
        Some(text) => truncate_for_log(text, RAW_LOG_MAX_BYTES),
        None => format!("<{} binary bytes>", raw.payload().len()),
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, UnroutableDiscriminator};

    #[test]
    fn test_stats_classify_drops() {
        let stats = DispatchStats::default();
        assert_eq!(stats.record_drop(&DecodeError::NotAnObject.into()), 0);
        assert_eq!(stats.record_drop(&DecodeError::MissingField("b").into()), 1);
        stats.record_drop(&UnroutableDiscriminator::Empty.into());
        stats.record_drop(&DispatchError::Filtered {
            event_type: "executionReport",
        });
        stats.record_received();
        stats.record_delivered();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.decode_failures, 2);
        assert_eq!(snapshot.unroutable, 1);
        assert_eq!(snapshot.filtered, 1);
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.delivered, 1);
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_for_log("aéb", 2), "a...");
    }

    #[test]
    fn test_preview_binary_payload() {
        let raw = RawMessage::new(0, vec![0xff, 0x00, 0x01]);
        assert_eq!(preview(&raw), "<3 binary bytes>");
    }
}
