use async_trait::async_trait;
use jarvis_rs::commands::{self, Directive};
use jarvis_rs::error::Result;
use jarvis_rs::import::Importer;
use jarvis_rs::memory::store::MemoryStore;
use jarvis_rs::model::memory::{EpisodicMemoryEntry, MemoryFilters};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct MockStore {
    entries: Mutex<Vec<EpisodicMemoryEntry>>,
    consolidate_calls: AtomicUsize,
    last_short_only: Mutex<Option<bool>>,
}

#[async_trait]
impl MemoryStore for MockStore {
    async fn add(&self, entries: &[EpisodicMemoryEntry]) -> Result<()> {
        self.entries.lock().unwrap().extend_from_slice(entries);
        Ok(())
    }

    async fn query(
        &self,
        _text: &str,
        _filters: &MemoryFilters,
        _limit: i64,
    ) -> Result<Vec<EpisodicMemoryEntry>> {
        Ok(Vec::new())
    }

    async fn get(&self, _ids: &[String]) -> Result<Vec<EpisodicMemoryEntry>> {
        Ok(Vec::new())
    }

    async fn consolidate(&self, short_only: bool) -> Result<u64> {
        self.consolidate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_short_only.lock().unwrap() = Some(short_only);
        Ok(3)
    }
}

#[tokio::test]
async fn import_chat_directive_imports_and_reports() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let line = r#"@import_chat [{"id":1,"type_name":"文本","is_sender":1,"talker":"hack004","room_name":"r1","msg":"hello","CreateTime":"2025-01-01 00:00:00"}]"#;
    let directive = Directive::parse(line).unwrap().unwrap();
    let reply = commands::handle(directive, &importer).await;

    assert!(reply.contains("imported 1 of 1"), "got: {reply}");
    assert_eq!(store.entries.lock().unwrap().len(), 1);
    // Import triggers its maintenance pass
    assert_eq!(store.consolidate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn batch_import_directive_honors_batch_size() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records: Vec<serde_json::Value> = (0..4)
        .map(|i| {
            serde_json::json!({
                "id": i, "type_name": "文本", "is_sender": 0, "talker": "u1",
                "room_name": "r1", "msg": format!("m{i}"),
                "CreateTime": "2025-01-01 00:00:00"
            })
        })
        .collect();
    let line = format!(
        "batch_import_chat 2 {}",
        serde_json::Value::Array(records)
    );

    let directive = Directive::parse(&line).unwrap().unwrap();
    let reply = commands::handle(directive, &importer).await;

    assert!(reply.contains("imported 4 of 4"), "got: {reply}");
}

#[tokio::test]
async fn import_chat_with_bad_json_replies_without_storing() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let directive = Directive::parse("import_chat not-json-at-all")
        .unwrap()
        .unwrap();
    let reply = commands::handle(directive, &importer).await;

    assert!(reply.contains("invalid JSON"), "got: {reply}");
    assert!(store.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn import_chat_with_non_array_json_replies_with_error() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let directive = Directive::parse(r#"import_chat {"id": 1}"#).unwrap().unwrap();
    let reply = commands::handle(directive, &importer).await;

    assert!(reply.contains("array"), "got: {reply}");
    assert!(store.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sleep_directives_run_consolidation() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let reply = commands::handle(
        Directive::parse("sleep").unwrap().unwrap(),
        &importer,
    )
    .await;
    assert!(reply.contains("merged 3"), "got: {reply}");
    assert_eq!(*store.last_short_only.lock().unwrap(), Some(false));

    commands::handle(
        Directive::parse("sleep_short").unwrap().unwrap(),
        &importer,
    )
    .await;
    assert_eq!(*store.last_short_only.lock().unwrap(), Some(true));
    assert_eq!(store.consolidate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn undecodable_elements_count_as_skips() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let line = r#"import_chat [{"id":1,"type_name":"文本","is_sender":1,"talker":"u1","room_name":"r1","msg":"ok","CreateTime":"2025-01-01 00:00:00"}, 42]"#;
    let directive = Directive::parse(line).unwrap().unwrap();
    let reply = commands::handle(directive, &importer).await;

    assert!(reply.contains("imported 1 of 2"), "got: {reply}");
    assert!(reply.contains("1 skipped"), "got: {reply}");
}
