use async_trait::async_trait;
use jarvis_rs::error::{Error, Result};
use jarvis_rs::import::Importer;
use jarvis_rs::memory::store::MemoryStore;
use jarvis_rs::model::memory::{EpisodicMemoryEntry, MemoryFilters, SpeakerRole};
use jarvis_rs::model::record::RawChatRecord;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory store that records calls and can fail specific add calls.
#[derive(Default)]
struct MockStore {
    entries: Mutex<Vec<EpisodicMemoryEntry>>,
    add_calls: AtomicUsize,
    consolidate_calls: AtomicUsize,
    /// 1-based add-call numbers that should fail.
    fail_add_calls: Vec<usize>,
}

impl MockStore {
    fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_add_calls: calls.to_vec(),
            ..Default::default()
        }
    }

    fn stored(&self) -> Vec<EpisodicMemoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryStore for MockStore {
    async fn add(&self, entries: &[EpisodicMemoryEntry]) -> Result<()> {
        let call = self.add_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_add_calls.contains(&call) {
            return Err(Error::Other(format!("injected failure on add call {call}")));
        }
        self.entries.lock().unwrap().extend_from_slice(entries);
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        _filters: &MemoryFilters,
        limit: i64,
    ) -> Result<Vec<EpisodicMemoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.content.contains(text))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<EpisodicMemoryEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn consolidate(&self, _short_only: bool) -> Result<u64> {
        self.consolidate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

fn text_record(id: i64, talker: &str, msg: &str) -> RawChatRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "type_name": "文本",
        "is_sender": if talker == "hack004" { 1 } else { 0 },
        "talker": talker,
        "room_name": "caicai_77",
        "msg": msg,
        "CreateTime": "2025-03-11 11:07:54"
    }))
    .unwrap()
}

fn image_record(id: i64) -> RawChatRecord {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "type_name": "图片",
        "is_sender": 0,
        "talker": "caicai_77",
        "room_name": "caicai_77",
        "msg": "",
        "CreateTime": "2025-03-11 11:07:54"
    }))
    .unwrap()
}

#[tokio::test]
async fn single_text_record_imports() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records = vec![text_record(1, "u1", "hi")];
    let report = importer.import(&records, 1).await.unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed_chunks, 0);
}

#[tokio::test]
async fn non_text_records_are_skipped_and_counted() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records = vec![text_record(1, "u1", "hello"), image_record(2)];
    let report = importer.import(&records, 10).await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed_chunks, 0);
}

#[tokio::test]
async fn chunks_are_ceil_of_len_over_batch_size_and_ordered() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records: Vec<_> = (0..10)
        .map(|i| text_record(i, "u1", &format!("message {i}")))
        .collect();
    let report = importer.import(&records, 3).await.unwrap();

    // ceil(10 / 3) = 4 chunks, all submitted
    assert_eq!(store.add_calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.imported, 10);

    // Concatenated chunks reproduce the original order
    let contents: Vec<String> = store.stored().iter().map(|e| e.content.clone()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("message {i}")).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn failed_chunk_does_not_stop_the_import() {
    let store = MockStore::failing_on(&[2]);
    let importer = Importer::new(&store, "hack004");

    let records: Vec<_> = (0..9)
        .map(|i| text_record(i, "u1", &format!("message {i}")))
        .collect();
    let report = importer.import(&records, 3).await.unwrap();

    // All three chunks attempted, middle one lost
    assert_eq!(store.add_calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.total, 9);
    assert_eq!(report.imported, 6);
    assert_eq!(report.failed_chunks, 1);

    let contents: Vec<String> = store.stored().iter().map(|e| e.content.clone()).collect();
    assert!(contents.contains(&"message 0".to_string()));
    assert!(!contents.contains(&"message 3".to_string()));
    assert!(contents.contains(&"message 8".to_string()));
}

#[tokio::test]
async fn consolidation_runs_exactly_once_per_import() {
    let store = MockStore::failing_on(&[1]);
    let importer = Importer::new(&store, "hack004");

    let records: Vec<_> = (0..6)
        .map(|i| text_record(i, "u1", &format!("message {i}")))
        .collect();
    importer.import(&records, 2).await.unwrap();

    assert_eq!(store.consolidate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_input_still_triggers_maintenance() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let report = importer.import(&[], 5).await.unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(store.add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.consolidate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let result = importer.import(&[text_record(1, "u1", "hi")], 0).await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

#[tokio::test]
async fn import_all_uses_a_single_chunk() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records: Vec<_> = (0..5)
        .map(|i| text_record(i, "u1", &format!("message {i}")))
        .collect();
    let report = importer.import_all(&records).await.unwrap();

    assert_eq!(store.add_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.imported, 5);
}

#[tokio::test]
async fn fully_skipped_chunk_is_not_submitted() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records = vec![image_record(1), image_record(2)];
    let report = importer.import(&records, 10).await.unwrap();

    assert_eq!(store.add_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed_chunks, 0);
}

#[tokio::test]
async fn stored_entries_round_trip_through_get() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records = vec![
        text_record(1, "hack004", "my own message"),
        text_record(2, "caicai_77", "their message"),
    ];
    importer.import_all(&records).await.unwrap();

    let stored = store.stored();
    assert_eq!(stored.len(), 2);

    let ids: Vec<String> = stored.iter().map(|e| e.id.clone()).collect();
    let fetched = store.get(&ids).await.unwrap();
    assert_eq!(fetched.len(), 2);

    let own = fetched
        .iter()
        .find(|e| e.content == "my own message")
        .unwrap();
    assert_eq!(own.speaker_role, SpeakerRole::Own);
    let other = fetched
        .iter()
        .find(|e| e.content == "their message")
        .unwrap();
    assert_eq!(other.speaker_role, SpeakerRole::Other);
}

#[tokio::test]
async fn reimporting_creates_duplicates_with_fresh_ids() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let records = vec![text_record(1, "u1", "hello")];
    importer.import_all(&records).await.unwrap();
    importer.import_all(&records).await.unwrap();

    let stored = store.stored();
    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0].id, stored[1].id);
}

#[tokio::test]
async fn import_file_reads_a_json_array() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(
        &path,
        serde_json::json!([
            {"id": 1, "type_name": "文本", "is_sender": 1, "talker": "hack004",
             "room_name": "r1", "msg": "hi", "CreateTime": "2025-01-01 00:00:00"},
            {"id": 2, "type_name": "图片", "is_sender": 0, "talker": "u2",
             "room_name": "r1", "msg": "", "CreateTime": "2025-01-01 00:00:01"},
        ])
        .to_string(),
    )
    .unwrap();

    let report = importer.import_file(&path, true, 50).await.unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.imported, 1);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn import_file_rejects_non_array_top_level() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("single.json");
    std::fs::write(&path, r#"{"id": 1, "type_name": "文本"}"#).unwrap();

    let result = importer.import_file(&path, true, 50).await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(store.add_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn import_file_fails_on_missing_file() {
    let store = MockStore::default();
    let importer = Importer::new(&store, "hack004");

    let result = importer
        .import_file(std::path::Path::new("/no/such/file.json"), true, 50)
        .await;
    assert!(result.is_err());
}
