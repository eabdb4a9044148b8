//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Entry point of the subscription server. Loads the config, builds the shared subscription
// manager and serves the WebSocket and JSON-RPC transports.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use ledger_stream::domain::models::events::{LedgerClosed, StreamEvent};
use ledger_stream::{
    Api, Config, EventPublisher, InMemoryLedger, LedgerSummary, SubscriptionManager,
    WebhookDispatcher,
};

/// Real-time subscription server for ledger events
#[derive(Debug, Parser)]
#[command(name = "ledger-stream", version)]
struct Args {
    /// Address to listen on (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Outbound queue bound per connection (overrides QUEUE_CAPACITY)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Webhook request timeout in milliseconds (overrides WEBHOOK_TIMEOUT_MS)
    #[arg(long)]
    webhook_timeout_ms: Option<u64>,

    /// Node identifier reported by /health (overrides NODE_ID)
    #[arg(long)]
    node_id: Option<String>,

    /// Close a synthetic ledger every N seconds and publish it on the ledger stream
    #[arg(long, value_name = "SECONDS")]
    simulate_ledger_close: Option<u64>,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity.max(1);
        }
        if let Some(timeout) = self.webhook_timeout_ms {
            config.webhook_timeout = Duration::from_millis(timeout);
        }
        if let Some(node_id) = &self.node_id {
            config.node_id = node_id.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (for logging)
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = args.apply(Config::try_from_env().map_err(anyhow::Error::msg)?);
    info!(node_id = %config.node_id, "Starting ledger-stream");

    let ledger = Arc::new(InMemoryLedger::default());
    let manager = Arc::new(SubscriptionManager::new(ledger.clone(), config.queue_capacity));
    let publisher = EventPublisher::new(manager.clone())
        .with_webhooks(WebhookDispatcher::new(config.webhook_timeout)?);

    if let Some(seconds) = args.simulate_ledger_close {
        tokio::spawn(simulate_ledger_close(
            ledger,
            publisher,
            Duration::from_secs(seconds.clamp(1, u64::from(u32::MAX))),
        ));
    }

    let api = Api::new(config.bind_addr, manager, config);
    api.serve().await
}

/// Moves a summary to the next ledger, `every` later. Saturates instead of
/// overflowing for very long intervals.
fn advance(summary: &mut LedgerSummary, every: Duration) {
    let step = u32::try_from(every.as_secs()).unwrap_or(u32::MAX);
    summary.ledger_index = summary.ledger_index.saturating_add(1);
    summary.ledger_time = summary.ledger_time.saturating_add(step);
    summary.ledger_hash = format!("{:064X}", summary.ledger_index);
}

/// Advances the in-memory ledger on a timer and publishes each close.
async fn simulate_ledger_close(ledger: Arc<InMemoryLedger>, publisher: EventPublisher, every: Duration) {
    let mut summary = LedgerSummary::genesis();
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;
        advance(&mut summary, every);
        ledger.close_ledger(summary.clone());

        let event = StreamEvent::LedgerClosed(LedgerClosed {
            ledger_index: summary.ledger_index,
            ledger_hash: summary.ledger_hash.clone(),
            ledger_time: summary.ledger_time,
            fee_base: summary.fee_base,
            fee_ref: summary.fee_base,
            reserve_base: summary.reserve_base,
            reserve_inc: summary.reserve_inc,
            txn_count: 0,
            validated_ledgers: format!("1-{}", summary.ledger_index),
        });
        if let Err(e) = publisher.publish(&event) {
            warn!("Failed to publish ledger close: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_moves_to_next_ledger() {
        let mut summary = LedgerSummary::genesis();
        advance(&mut summary, Duration::from_secs(4));
        assert_eq!(summary.ledger_index, 2);
        assert_eq!(summary.ledger_time, 4);
        assert_eq!(summary.ledger_hash, format!("{:064X}", 2));
    }

    #[test]
    fn test_advance_saturates_on_long_interval() {
        let mut summary = LedgerSummary::genesis();
        summary.ledger_time = u32::MAX - 1;
        advance(&mut summary, Duration::from_secs(u64::from(u32::MAX) + 10));
        assert_eq!(summary.ledger_time, u32::MAX);
        advance(&mut summary, Duration::from_secs(1));
        assert_eq!(summary.ledger_time, u32::MAX);
    }
}
