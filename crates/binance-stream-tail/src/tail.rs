/*
[INPUT]:  TailConfig, a StreamClient and a shutdown token
[OUTPUT]: One written line per delivered event, per-subscription stats on exit
[POS]:    Runner layer - subscription lifecycle and output
[UPDATE]: When changing output formats or shutdown sequencing
*/

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use binance_stream_adapter::ws::DispatchStatsSnapshot;
use binance_stream_adapter::{
    Connector, StreamClient, StreamEvent, SubscriptionHandle, SubscriptionState,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{OutputFormat, TailConfig};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct Delivered {
    label: String,
    event: StreamEvent,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    subscription: &'a str,
    kind: &'static str,
    event: &'a StreamEvent,
}

/// Final view of one subscription after the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionReport {
    pub label: String,
    pub state: SubscriptionState,
    pub stats: DispatchStatsSnapshot,
}

/// What a run did, returned once every subscription has stopped.
#[derive(Debug, Clone, Default)]
pub struct TailSummary {
    pub written: u64,
    pub subscriptions: Vec<SubscriptionReport>,
}

/// Tail every configured stream until shutdown, `max_events`, or all
/// subscriptions ending on their own.
pub async fn run<C, W>(
    client: &StreamClient<C>,
    config: &TailConfig,
    shutdown: CancellationToken,
    mut out: W,
) -> Result<TailSummary>
where
    C: Connector,
    W: Write,
{
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<Delivered>();
    let mut handles: Vec<(String, SubscriptionHandle)> = Vec::with_capacity(config.subscriptions.len());

    for subscription in &config.subscriptions {
        let label = subscription.label()?;
        let tx = line_tx.clone();
        let handler_label = label.clone();
        let handle = client
            .subscribe(subscription.stream.clone(), move |event| {
                let _ = tx.send(Delivered {
                    label: handler_label.clone(),
                    event,
                });
            })
            .await
            .with_context(|| format!("subscribe {label}"))?;
        info!(
            subscription = %label,
            subscription_id = %handle.id(),
            endpoint = %handle.endpoint(),
            "tail subscription started"
        );
        handles.push((label, handle));
    }
    // only handlers hold senders now; the channel closes when all loops end
    drop(line_tx);

    let mut written: u64 = 0;
    loop {
        let delivered = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("tail shutdown requested");
                break;
            }
            delivered = line_rx.recv() => delivered,
        };

        let Some(delivered) = delivered else {
            info!("all subscriptions ended");
            break;
        };

        write_line(&mut out, config.output, &delivered).context("write event")?;
        written += 1;

        if config.max_events.is_some_and(|max| written >= max) {
            info!(written, "max_events reached");
            break;
        }
    }
    out.flush().context("flush output")?;

    let mut reports = Vec::with_capacity(handles.len());
    for (label, handle) in handles {
        reports.push(stop(label, handle).await);
    }

    Ok(TailSummary {
        written,
        subscriptions: reports,
    })
}

async fn stop(label: String, handle: SubscriptionHandle) -> SubscriptionReport {
    handle.cancel();
    let state = match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.terminated()).await {
        Ok(state) => state,
        Err(_) => {
            warn!(subscription = %label, "subscription did not stop before timeout");
            handle.state()
        }
    };
    let stats = handle.stats();

    if let SubscriptionState::Failed(cause) = &state {
        warn!(subscription = %label, error = %cause, "subscription ended with transport error");
    }
    debug!(
        subscription = %label,
        state = ?state,
        received = stats.received,
        delivered = stats.delivered,
        decode_failures = stats.decode_failures,
        unroutable = stats.unroutable,
        filtered = stats.filtered,
        "subscription stopped"
    );

    SubscriptionReport {
        label,
        state,
        stats,
    }
}

fn write_line<W: Write>(out: &mut W, format: OutputFormat, delivered: &Delivered) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let line = JsonLine {
                subscription: &delivered.label,
                kind: delivered.event.kind(),
                event: &delivered.event,
            };
            serde_json::to_writer(&mut *out, &line)?;
            writeln!(out)?;
        }
        OutputFormat::Summary => {
            let event = &delivered.event;
            let time = event
                .event_datetime()
                .map(|time| time.to_rfc3339())
                .unwrap_or_else(|| event.event_time().to_string());
            writeln!(
                out,
                "{} {} {} {}",
                delivered.label,
                event.kind(),
                event.symbol().unwrap_or("-"),
                time
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binance_stream_adapter::{AggTradeEvent, UserAccountEvent};

    fn delivered(event: StreamEvent) -> Delivered {
        Delivered {
            label: "bnb".to_string(),
            event,
        }
    }

    #[test]
    fn test_json_line_shape() {
        let event = StreamEvent::AggTrade(AggTradeEvent {
            event_type: "aggTrade".into(),
            event_time: 1_499_405_658_658,
            symbol: "BNBBTC".into(),
            agg_trade_id: 12345,
            ..Default::default()
        });
        let mut out = Vec::new();
        write_line(&mut out, OutputFormat::Json, &delivered(event)).expect("write");

        let line = String::from_utf8(out).expect("utf8");
        assert!(line.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).expect("json");
        assert_eq!(value["subscription"], "bnb");
        assert_eq!(value["kind"], "agg_trade");
        assert_eq!(value["event"]["a"], 12345);
        assert_eq!(value["event"]["s"], "BNBBTC");
    }

    #[test]
    fn test_summary_line_without_symbol() {
        let event = StreamEvent::UserAccount(UserAccountEvent {
            event_type: "outboundAccountInfo".into(),
            event_time: 0,
            ..Default::default()
        });
        let mut out = Vec::new();
        write_line(&mut out, OutputFormat::Summary, &delivered(event)).expect("write");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "bnb user_account - 1970-01-01T00:00:00+00:00\n"
        );
    }
}
