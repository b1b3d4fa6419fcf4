use tracing::{Instrument, info_span};

use crate::{SharedLogStorage, capture_subscriber};

#[test]
fn test_events_are_captured_with_message_and_fields() {
    let storage = SharedLogStorage::new();
    tracing::subscriber::with_default(capture_subscriber(storage.clone()), || {
        tracing::warn!(chunk_count = 3, "documents processed");
    });

    let records = storage.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, "WARN");
    assert_eq!(records[0].message, "documents processed");
    assert_eq!(records[0].fields["chunk_count"], serde_json::json!(3));
    assert!(records[0].session_id.is_none());
}

#[test]
fn test_session_id_is_inherited_from_enclosing_spans() {
    let storage = SharedLogStorage::new();
    tracing::subscriber::with_default(capture_subscriber(storage.clone()), || {
        let outer = info_span!("rag.session.ask", session.id = "session-789");
        let _outer = outer.enter();
        let inner = info_span!("rag.retrieve", k = 2);
        let _inner = inner.enter();
        tracing::error!(error = "upstream 503", "retrieval failed");
    });

    let records = storage.for_session("session-789");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].span.as_deref(), Some("rag.retrieve"));
    assert!(storage.contains("upstream 503"));
    assert!(storage.for_session("other").is_empty());
}

#[tokio::test]
async fn test_instrumented_futures_keep_their_session() {
    let storage = SharedLogStorage::new();
    let _guard = tracing::subscriber::set_default(capture_subscriber(storage.clone()));

    async {
        tokio::task::yield_now().await;
        tracing::info!("question answered");
    }
    .instrument(info_span!("rag.session.ask", session.id = "a"))
    .await;

    async {
        tracing::info!("question answered");
    }
    .instrument(info_span!("rag.session.ask", session.id = "b"))
    .await;

    assert_eq!(storage.for_session("a").len(), 1);
    assert_eq!(storage.for_session("b").len(), 1);

    storage.clear();
    assert!(storage.is_empty());
}

#[test]
fn test_global_init_happens_once() {
    let storage = SharedLogStorage::new();
    assert!(crate::init_with_storage("docqa-test", storage.clone()).is_ok());
    assert!(crate::init_telemetry("docqa-test").is_err());
    assert!(crate::init_json("docqa-test").is_err());

    tracing::info!("after init");
    assert!(storage.contains("telemetry initialized"));
    assert!(storage.contains("after init"));
}
