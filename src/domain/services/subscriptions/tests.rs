#[cfg(test)]
pub mod tests {
    use crate::domain::models::requests::FilterRequest;
    use crate::domain::models::types::{
        BookSide, BookSpec, BookTrade, ConnectionId, CurrencySpec, LedgerSummary, StreamKind,
        SubscriptionKind,
    };
    use crate::domain::services::ledger::{LedgerError, MockLedgerService};
    use crate::domain::services::subscriptions::{
        Connection, OutboundStream, SubscriptionError, SubscriptionManager,
    };
    use crate::domain::services::validation::CurrencySpecError;
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const ALICE: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const BOB: &str = "rrrrrrrrrrrrrrrrrrrrBZbvji";
    const CAROL: &str = "rrrrrrrrrrrrrrrrrrrrrhoLvTp";

    // Helper: a ledger that always answers with the given header
    fn ledger_at(index: u32) -> MockLedgerService {
        let mut ledger = MockLedgerService::new();
        ledger.expect_current_ledger().returning(move || {
            let mut summary = LedgerSummary::genesis();
            summary.ledger_index = index;
            Ok(summary)
        });
        ledger.expect_book_offers().returning(|_| Ok(Vec::new()));
        ledger
    }

    fn manager_with(ledger: MockLedgerService, capacity: usize) -> SubscriptionManager {
        SubscriptionManager::new(Arc::new(ledger), capacity)
    }

    fn manager() -> SubscriptionManager {
        manager_with(ledger_at(7), 16)
    }

    fn connect(manager: &SubscriptionManager, id: &str) -> (ConnectionId, OutboundStream) {
        let id = ConnectionId::from(id);
        let (_, stream) = manager.open_connection(id.clone()).unwrap();
        (id, stream)
    }

    fn usd() -> CurrencySpec {
        CurrencySpec::issued("USD", ALICE)
    }

    fn drain(stream: &mut OutboundStream) -> Vec<Bytes> {
        std::iter::from_fn(|| stream.try_recv()).collect()
    }

    #[test]
    fn test_subscribe_returns_ledger_header() {
        let manager = manager_with(ledger_at(1234), 16);
        let (id, _stream) = connect(&manager, "c1");

        let result = manager
            .subscribe(&id, &FilterRequest::new().with_streams(["ledger"]))
            .unwrap();
        assert_eq!(result.ledger.ledger_index, 1234);
        assert!(result.offers.is_none());

        let body = serde_json::to_value(&result).unwrap();
        assert_eq!(body["ledger_index"], 1234);
        assert!(body.get("reserve_inc").is_some());
        assert!(body.get("offers").is_none());
    }

    #[test]
    fn test_resubscribe_is_idempotent() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");
        let request = FilterRequest::new().with_streams(["ledger"]);

        manager.subscribe(&id, &request).unwrap();
        let first = manager.subscriptions(&id).unwrap();
        manager.subscribe(&id, &request).unwrap();

        assert_eq!(manager.subscriptions(&id).unwrap(), first);
        assert_eq!(first.kinds(), vec![SubscriptionKind::Stream(StreamKind::Ledger)]);
        assert_eq!(manager.stream_subscriber_count(StreamKind::Ledger), 1);
    }

    #[test]
    fn test_accounts_are_unioned() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");

        manager.subscribe(&id, &FilterRequest::new().with_accounts([ALICE])).unwrap();
        manager.subscribe(&id, &FilterRequest::new().with_accounts([BOB])).unwrap();

        let filters = manager.subscriptions(&id).unwrap();
        let accounts = filters.accounts().unwrap();
        assert_eq!(accounts.len(), 2);
        assert!(accounts.contains(ALICE));
        assert!(accounts.contains(BOB));
        assert!(filters.accounts_proposed().is_none());
    }

    #[test]
    fn test_partial_account_removal() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");
        manager.subscribe(&id, &FilterRequest::new().with_accounts([ALICE, BOB])).unwrap();

        manager.unsubscribe(&id, &FilterRequest::new().with_accounts([ALICE])).unwrap();
        let filters = manager.subscriptions(&id).unwrap();
        assert_eq!(filters.accounts().unwrap().len(), 1);
        assert!(filters.accounts().unwrap().contains(BOB));

        manager.unsubscribe(&id, &FilterRequest::new().with_accounts([BOB])).unwrap();
        let filters = manager.subscriptions(&id).unwrap();
        assert!(filters.get(SubscriptionKind::Accounts).is_none());
        assert_eq!(manager.account_subscriber_count(BOB), 0);
    }

    #[test]
    fn test_unsubscribe_never_subscribed_is_noop() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");
        manager.subscribe(&id, &FilterRequest::new().with_streams(["ledger"])).unwrap();
        let before = manager.subscriptions(&id).unwrap();

        manager
            .unsubscribe(
                &id,
                &FilterRequest::new()
                    .with_streams(["validations"])
                    .with_accounts([CAROL])
                    .with_book(&BookSpec::new(CurrencySpec::native(), usd())),
            )
            .unwrap();

        assert_eq!(manager.subscriptions(&id).unwrap(), before);
    }

    #[test]
    fn test_stream_names_are_a_closed_set() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");

        for name in ["Ledger", "ledgers", "transactions_proposed", ""] {
            let err = manager
                .subscribe(&id, &FilterRequest::new().with_streams(["ledger", name]))
                .unwrap_err();
            assert_eq!(err, SubscriptionError::UnknownStreamType(name.to_string()));
            assert_eq!(err.token(), "malformedStream");
        }
        assert!(manager.subscriptions(&id).unwrap().is_empty());

        for kind in StreamKind::ALL {
            manager
                .subscribe(&id, &FilterRequest::new().with_streams([kind.as_str()]))
                .unwrap();
        }
        assert_eq!(manager.subscriptions(&id).unwrap().len(), StreamKind::ALL.len());
    }

    #[test]
    fn test_invalid_account_rejects_whole_request() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");

        let err = manager
            .subscribe(
                &id,
                &FilterRequest::new()
                    .with_streams(["ledger"])
                    .with_accounts([ALICE, "r0OIl"]),
            )
            .unwrap_err();
        assert_eq!(err.token(), "actMalformed");
        assert!(manager.subscriptions(&id).unwrap().is_empty());
        assert_eq!(manager.stream_subscriber_count(StreamKind::Ledger), 0);
    }

    #[test]
    fn test_book_validation_names_failing_side() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");

        let err = manager
            .subscribe(
                &id,
                &FilterRequest::new().with_raw_book(json!({
                    "taker_gets": {"currency": "USD"},
                    "taker_pays": {"currency": "XRP"}
                })),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SubscriptionError::InvalidCurrencySpec {
                side: BookSide::TakerGets,
                reason: CurrencySpecError::IssuerRequired,
            }
        );
        assert_eq!(err.token(), "dstIsrMalformed");

        let err = manager
            .subscribe(
                &id,
                &FilterRequest::new().with_raw_book(json!({
                    "taker_gets": {"currency": "XRP"},
                    "taker_pays": {"currency": "US$D"}
                })),
            )
            .unwrap_err();
        assert_eq!(err.token(), "srcCurMalformed");
        assert!(manager.subscriptions(&id).unwrap().books().is_empty());
    }

    #[test]
    fn test_book_snapshot_is_returned() {
        let mut ledger = MockLedgerService::new();
        ledger
            .expect_current_ledger()
            .returning(|| Ok(LedgerSummary::genesis()));
        ledger.expect_book_offers().returning(|book| {
            Ok(vec![json!({
                "TakerGets": book.taker_gets.currency,
                "TakerPays": book.taker_pays.currency
            })])
        });
        let manager = manager_with(ledger, 16);
        let (id, _stream) = connect(&manager, "c1");

        let one_sided = BookSpec::new(CurrencySpec::native(), usd()).with_snapshot(true);
        let result = manager
            .subscribe(&id, &FilterRequest::new().with_book(&one_sided))
            .unwrap();
        assert_eq!(result.offers.as_ref().map(Vec::len), Some(1));
        assert!(result.asks.is_none() && result.bids.is_none());

        let two_sided = one_sided.with_both(true);
        let result = manager
            .subscribe(&id, &FilterRequest::new().with_book(&two_sided))
            .unwrap();
        assert_eq!(result.asks.unwrap()[0]["TakerGets"], "XRP");
        assert_eq!(result.bids.unwrap()[0]["TakerGets"], "USD");
        assert!(result.offers.is_none());
    }

    #[test]
    fn test_ledger_failure_leaves_filters_untouched() {
        let mut ledger = MockLedgerService::new();
        ledger
            .expect_current_ledger()
            .returning(|| Err(LedgerError::NoClosedLedger));
        let manager = manager_with(ledger, 16);
        let (id, _stream) = connect(&manager, "c1");

        let err = manager
            .subscribe(&id, &FilterRequest::new().with_streams(["ledger"]))
            .unwrap_err();
        assert_eq!(err, SubscriptionError::Ledger(LedgerError::NoClosedLedger));
        assert!(manager.subscriptions(&id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_connection_is_rejected() {
        let manager = manager();
        let ghost = ConnectionId::from("ghost");

        let err = manager
            .subscribe(&ghost, &FilterRequest::new().with_streams(["ledger"]))
            .unwrap_err();
        assert_eq!(err, SubscriptionError::ConnectionNotFound(ghost.clone()));
        assert_eq!(err.token(), "noClient");
        assert!(manager.unsubscribe(&ghost, &FilterRequest::new()).is_err());
    }

    #[test]
    fn test_duplicate_connection_is_rejected() {
        let manager = manager();
        let (id, _stream) = connect(&manager, "c1");
        let (dup, _dup_stream) = Connection::open(id.clone(), 4);
        assert_eq!(
            manager.add(dup).unwrap_err(),
            SubscriptionError::DuplicateConnection(id)
        );
    }

    #[test]
    fn test_broadcast_isolation() {
        let manager = manager();
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        let (_c, mut stream_c) = connect(&manager, "c");
        manager.subscribe(&a, &FilterRequest::new().with_streams(["ledger"])).unwrap();
        manager.subscribe(&b, &FilterRequest::new().with_streams(["ledger"])).unwrap();

        let report = manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"L1"));
        assert_eq!(report.matched, 2);
        assert_eq!(report.enqueued, 2);

        assert_eq!(drain(&mut stream_a), vec![Bytes::from_static(b"L1")]);
        assert_eq!(drain(&mut stream_b), vec![Bytes::from_static(b"L1")]);
        assert!(drain(&mut stream_c).is_empty());
    }

    #[test]
    fn test_account_broadcast_is_delivered_once() {
        let manager = manager();
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        manager.subscribe(&a, &FilterRequest::new().with_accounts([ALICE, BOB])).unwrap();
        manager
            .subscribe(&b, &FilterRequest::new().with_accounts_proposed([ALICE]))
            .unwrap();

        let accounts = vec![ALICE.to_string(), BOB.to_string()];
        let report = manager.broadcast_to_accounts(Bytes::from_static(b"tx"), &accounts);
        assert_eq!(report.matched, 1);
        assert_eq!(drain(&mut stream_a).len(), 1);
        assert!(drain(&mut stream_b).is_empty());

        let report = manager.broadcast_to_proposed_accounts(Bytes::from_static(b"ptx"), &accounts);
        assert_eq!(report.matched, 1);
        assert_eq!(drain(&mut stream_b), vec![Bytes::from_static(b"ptx")]);
        assert!(drain(&mut stream_a).is_empty());
    }

    #[test]
    fn test_order_book_broadcast_matches_pairs() {
        let manager = manager();
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        let book = BookSpec::new(CurrencySpec::native(), usd());
        manager.subscribe(&a, &FilterRequest::new().with_book(&book)).unwrap();
        manager
            .subscribe(&b, &FilterRequest::new().with_book(&book.clone().with_both(true)))
            .unwrap();

        let reversed = BookTrade::new(usd(), CurrencySpec::native());
        let report = manager.broadcast_to_order_books(Bytes::from_static(b"rev"), &reversed);
        assert_eq!(report.matched, 1);
        assert!(drain(&mut stream_a).is_empty());
        assert_eq!(drain(&mut stream_b).len(), 1);

        let other = BookTrade::new(CurrencySpec::native(), CurrencySpec::issued("USD", BOB));
        assert_eq!(manager.broadcast_to_order_books(Bytes::from_static(b"x"), &other).matched, 0);
    }

    #[test]
    fn test_transaction_broadcast_deduplicates() {
        let manager = manager();
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        let book = BookSpec::new(CurrencySpec::native(), usd());
        manager
            .subscribe(
                &a,
                &FilterRequest::new()
                    .with_streams(["transactions"])
                    .with_accounts([ALICE])
                    .with_book(&book),
            )
            .unwrap();
        manager.subscribe(&b, &FilterRequest::new().with_book(&book)).unwrap();

        let trades = vec![BookTrade::new(CurrencySpec::native(), usd())];
        let report = manager.broadcast_transaction(
            Bytes::from_static(b"tx"),
            &[ALICE.to_string()],
            &trades,
        );

        assert_eq!(report.matched, 2);
        assert_eq!(drain(&mut stream_a).len(), 1);
        assert_eq!(drain(&mut stream_b).len(), 1);
    }

    #[test]
    fn test_broadcast_after_remove_is_silent() {
        let manager = manager();
        let (a, mut stream_a) = connect(&manager, "a");
        manager.subscribe(&a, &FilterRequest::new().with_streams(["ledger"])).unwrap();

        assert!(manager.remove(&a));
        assert!(!manager.remove(&a));

        let report = manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"late"));
        assert_eq!(report.matched, 0);
        assert!(drain(&mut stream_a).is_empty());
        assert!(stream_a.is_closed());
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.stream_subscriber_count(StreamKind::Ledger), 0);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let manager = manager_with(ledger_at(1), 2);
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        manager.subscribe(&a, &FilterRequest::new().with_streams(["ledger"])).unwrap();
        manager.subscribe(&b, &FilterRequest::new().with_streams(["ledger"])).unwrap();

        for payload in [b"1", b"2", b"3"] {
            manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(payload));
            // b keeps up, a does not
            drain(&mut stream_b);
        }

        assert_eq!(
            drain(&mut stream_a),
            vec![Bytes::from_static(b"1"), Bytes::from_static(b"2")]
        );
        assert_eq!(manager.connection(&a).unwrap().dropped_events(), 1);
        assert_eq!(manager.connection(&b).unwrap().dropped_events(), 0);
        assert_eq!(manager.connection_count(), 2);
    }

    #[test]
    fn test_closed_queue_schedules_removal() {
        let manager = manager();
        let (a, stream_a) = connect(&manager, "a");
        manager.subscribe(&a, &FilterRequest::new().with_streams(["ledger"])).unwrap();
        drop(stream_a);

        let report = manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"x"));
        assert_eq!(report.closed, 1);
        assert!(manager.connection(&a).is_none());
        assert_eq!(manager.stream_subscriber_count(StreamKind::Ledger), 0);
    }

    #[test]
    fn test_url_callbacks_are_tracked() {
        let manager = manager();
        let (a, _stream_a) = connect(&manager, "a");
        let (_b, _stream_b) = connect(&manager, "b");
        manager
            .subscribe(
                &a,
                &FilterRequest::new()
                    .with_streams(["ledger"])
                    .with_url("http://127.0.0.1:9/hook")
                    .with_url_credentials("user", "secret"),
            )
            .unwrap();

        let callbacks = manager.url_callbacks();
        assert_eq!(callbacks.len(), 1);
        assert_eq!(callbacks[0].0, a);
        assert_eq!(callbacks[0].1.username.as_deref(), Some("user"));

        let report = manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"L"));
        assert_eq!(report.callbacks.len(), 1);

        manager
            .unsubscribe(&a, &FilterRequest::new().with_url("http://127.0.0.1:9/hook"))
            .unwrap();
        assert!(manager.url_callbacks().is_empty());
    }

    #[test]
    fn test_subscribe_after_close_fails() {
        let manager = manager();
        let (a, _stream) = connect(&manager, "a");
        let connection = manager.connection(&a).unwrap();
        connection.close();

        let err = manager
            .subscribe(&a, &FilterRequest::new().with_streams(["ledger"]))
            .unwrap_err();
        assert_eq!(err, SubscriptionError::ConnectionClosed(a));
    }

    #[test]
    fn test_concurrent_subscribe_remove_and_broadcast() {
        let manager = Arc::new(manager_with(ledger_at(1), 4));
        let mut streams = Vec::new();
        for i in 0..32 {
            let (_, stream) = connect(&manager, &format!("c{}", i));
            streams.push(stream);
        }

        let mut handles = Vec::new();
        for worker in 0..4 {
            let manager = manager.clone();
            handles.push(thread::spawn(move || {
                for i in (worker..32).step_by(4) {
                    let id = ConnectionId::from(format!("c{}", i));
                    let _ = manager.subscribe(
                        &id,
                        &FilterRequest::new().with_streams(["ledger"]).with_accounts([ALICE]),
                    );
                    if i % 2 == 0 {
                        manager.remove(&id);
                    }
                }
            }));
        }
        let broadcaster = {
            let manager = manager.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"L"));
                    manager.broadcast_to_accounts(Bytes::from_static(b"T"), &[ALICE.to_string()]);
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        broadcaster.join().unwrap();

        assert_eq!(manager.connection_count(), 16);
        assert_eq!(manager.stream_subscriber_count(StreamKind::Ledger), 16);
        assert_eq!(manager.account_subscriber_count(ALICE), 16);
    }

    #[test]
    fn test_book_index_reaches_only_matching_pairs() {
        let manager = Arc::new(manager());
        let (a, mut stream_a) = connect(&manager, "a");
        let (b, mut stream_b) = connect(&manager, "b");
        let eur = CurrencySpec::issued("EUR", ALICE);
        manager
            .subscribe(&a, &FilterRequest::new().with_book(&BookSpec::new(CurrencySpec::native(), usd())))
            .unwrap();
        manager
            .subscribe(&b, &FilterRequest::new().with_book(&BookSpec::new(CurrencySpec::native(), eur)))
            .unwrap();

        let trade = BookTrade::new(CurrencySpec::native(), usd());
        assert_eq!(manager.book_subscriber_count(&trade), 1);
        assert_eq!(manager.book_subscriber_count(&trade.reversed()), 0);

        // b's filters stay locked; a trade on a's pair must not need them
        let b_connection = manager.connection(&b).unwrap();
        let guard = b_connection.lock_filters();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        {
            let manager = manager.clone();
            let trade = trade.clone();
            thread::spawn(move || {
                let report = manager.broadcast_to_order_books(Bytes::from_static(b"usd"), &trade);
                let _ = done_tx.send(report.matched);
            });
        }
        let matched = done_rx.recv_timeout(Duration::from_secs(1));
        drop(guard);

        assert_eq!(matched, Ok(1));
        assert_eq!(drain(&mut stream_a).len(), 1);
        assert!(drain(&mut stream_b).is_empty());
    }

    #[test]
    fn test_closed_connection_callback_is_skipped() {
        let manager = manager();
        let (a, stream_a) = connect(&manager, "a");
        manager
            .subscribe(
                &a,
                &FilterRequest::new()
                    .with_streams(["ledger"])
                    .with_url("http://127.0.0.1:9/hook"),
            )
            .unwrap();
        drop(stream_a);

        let report = manager.broadcast_to_stream(StreamKind::Ledger, Bytes::from_static(b"L"));
        assert_eq!(report.closed, 1);
        assert!(report.callbacks.is_empty());
        assert!(manager.url_callbacks().is_empty());
    }
}
