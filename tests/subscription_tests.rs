//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// End-to-end tests of the subscription engine through the public crate API: a producer
// publishes typed events and consumers drain their outbound streams asynchronously.
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use ledger_stream::domain::models::events::{LedgerClosed, StreamEvent};
use ledger_stream::{
    BookSpec, BookTrade, ConnectionId, CurrencySpec, EventPublisher, FilterRequest,
    InMemoryLedger, LedgerSummary, OutboundStream, SubscriptionError, SubscriptionManager,
    TransactionEvent,
};

const ISSUER: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn setup() -> (Arc<InMemoryLedger>, Arc<SubscriptionManager>, EventPublisher) {
    let ledger = Arc::new(InMemoryLedger::default());
    let manager = Arc::new(SubscriptionManager::new(ledger.clone(), 32));
    let publisher = EventPublisher::new(manager.clone());
    (ledger, manager, publisher)
}

fn ledger_closed(index: u32) -> StreamEvent {
    StreamEvent::LedgerClosed(LedgerClosed {
        ledger_index: index,
        ledger_hash: format!("{:064X}", index),
        ledger_time: 750_000_000 + index,
        fee_base: 10,
        fee_ref: 10,
        reserve_base: 10_000_000,
        reserve_inc: 2_000_000,
        txn_count: 1,
        validated_ledgers: format!("1-{}", index),
    })
}

async fn next_json(stream: &mut OutboundStream) -> Value {
    let payload = tokio::time::timeout(Duration::from_secs(1), stream.recv())
        .await
        .expect("timed out waiting for event")
        .expect("stream closed");
    serde_json::from_slice(&payload).unwrap()
}

#[tokio::test]
async fn test_subscribe_ack_tracks_ledger_closes() {
    let (ledger, manager, _) = setup();
    let id = ConnectionId::generate();
    let (_conn, _stream) = assert_ok!(manager.open_connection(id.clone()));

    let mut summary = LedgerSummary::genesis();
    summary.ledger_index = 90;
    ledger.close_ledger(summary);

    let ack = assert_ok!(manager.subscribe(&id, &FilterRequest::new().with_streams(["ledger"])));
    let ack = serde_json::to_value(&ack).unwrap();
    assert_eq!(ack["ledger_index"], 90);
    for field in ["ledger_hash", "ledger_time", "fee_base", "reserve_base", "reserve_inc"] {
        assert!(ack.get(field).is_some(), "missing {}", field);
    }
}

#[tokio::test]
async fn test_events_arrive_in_publish_order() {
    let (_, manager, publisher) = setup();
    let id = ConnectionId::generate();
    let (_conn, mut stream) = assert_ok!(manager.open_connection(id.clone()));
    assert_ok!(manager.subscribe(&id, &FilterRequest::new().with_streams(["ledger"])));

    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(next_json(&mut stream).await["ledger_index"].as_u64().unwrap());
        }
        seen
    });

    for index in [10, 11, 12] {
        assert_ok!(publisher.publish(&ledger_closed(index)));
    }

    assert_eq!(consumer.await.unwrap(), vec![10, 11, 12]);
}

#[tokio::test]
async fn test_snapshot_book_then_trade() {
    let (ledger, manager, publisher) = setup();
    let usd = CurrencySpec::issued("USD", ISSUER);
    ledger.set_book_offers(
        CurrencySpec::native(),
        usd.clone(),
        vec![json!({"Account": ISSUER, "quality": "0.5"})],
    );

    let id = ConnectionId::generate();
    let (_conn, mut stream) = assert_ok!(manager.open_connection(id.clone()));
    let book = BookSpec::new(CurrencySpec::native(), usd.clone()).with_snapshot(true);
    let ack = assert_ok!(manager.subscribe(&id, &FilterRequest::new().with_book(&book)));
    assert_eq!(ack.offers.unwrap()[0]["quality"], "0.5");

    let transaction = TransactionEvent {
        engine_result: "tesSUCCESS".to_string(),
        engine_result_code: 0,
        engine_result_message: "The transaction was applied.".to_string(),
        ledger_index: Some(2),
        ledger_hash: Some("AB".repeat(32)),
        ledger_current_index: None,
        close_time_iso: Some("2026-01-01T00:00:00Z".to_string()),
        transaction: json!({"TransactionType": "OfferCreate"}),
        meta: Some(json!({"TransactionResult": "tesSUCCESS"})),
        validated: true,
    };
    let trades = vec![BookTrade::new(CurrencySpec::native(), usd)];
    let report = assert_ok!(publisher.publish_transaction(&transaction, &[], &trades));
    assert_eq!(report.matched, 1);

    let event = next_json(&mut stream).await;
    assert_eq!(event["type"], "transaction");
    assert_eq!(event["close_time_iso"], "2026-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_remove_ends_the_stream() {
    let (_, manager, publisher) = setup();
    let id = ConnectionId::generate();
    let (_conn, mut stream) = assert_ok!(manager.open_connection(id.clone()));
    assert_ok!(manager.subscribe(&id, &FilterRequest::new().with_streams(["ledger"])));

    assert!(manager.remove(&id));
    let report = assert_ok!(publisher.publish(&ledger_closed(3)));
    assert_eq!(report.matched, 0);
    assert_eq!(stream.recv().await, None);

    let err = assert_err!(manager.subscribe(&id, &FilterRequest::new().with_streams(["ledger"])));
    assert_eq!(err, SubscriptionError::ConnectionNotFound(id));
}
