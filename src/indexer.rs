//! Indexing runs: walk, extract every file concurrently, persist, report.

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::capabilities::Capabilities;
use crate::directory::{walk_directory, DirectoryHandle};
use crate::entries::{walk_entries, DropEntry};
use crate::error::IndexError;
use crate::extract::ContentExtractor;
use crate::models::FileIndex;
use crate::source::FileHandle;
use crate::storage::{IndexPersistence, Tier};

pub const PROCESSING_ERROR: &str = "Error processing files. Please try again.";
pub const SELECTION_CANCELLED: &str = "File selection cancelled.";
pub const ACCESS_ERROR: &str = "Error accessing files. Please try again.";
pub const PICKER_UNAVAILABLE: &str =
    "File system access not available in this browser. Please use drag and drop instead.";

/// The UI side of a run: status text, progress and the finished index.
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);

    /// Completion percentage in `[0, 100]`.
    fn progress(&self, percent: f64);

    fn show_progress(&self);

    fn hide_progress(&self);

    /// Called once with every successfully assembled index.
    fn render(&self, _index: &FileIndex) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Persisted {
    Saved(Tier),
    /// Persistence is disabled for this build.
    Skipped,
    /// A newer run started before this one finished.
    Superseded,
    Failed(String),
}

#[derive(Debug)]
pub struct RunReport {
    /// Number of files handed to the assembler.
    pub files: usize,
    pub index: FileIndex,
    pub persisted: Persisted,
}

#[derive(Debug)]
pub enum RunOutcome {
    Indexed(RunReport),
    /// Nothing to index; no persistence happened.
    Empty,
    Cancelled,
    /// The host cannot pick directories; nothing was asked.
    Unavailable,
}

/// What a native picker handed back.
pub enum Selection {
    Directory(Box<dyn DirectoryHandle>),
    Files(Vec<Box<dyn FileHandle>>),
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub persist: bool,
    pub progress_clear_delay: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            persist: true,
            progress_clear_delay: Duration::from_secs(1),
        }
    }
}

pub struct Indexer {
    extractor: ContentExtractor,
    store: Arc<dyn IndexPersistence>,
    status: Arc<dyn StatusSink>,
    config: IndexerConfig,
    generation: AtomicU64,
    /// Held across the generation check and the save.
    save_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(
        extractor: ContentExtractor,
        store: Arc<dyn IndexPersistence>,
        status: Arc<dyn StatusSink>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            status,
            config,
            generation: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        }
    }

    fn begin_run(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Indexes dropped entries. A traversal failure anywhere aborts the run.
    pub async fn index_drop(&self, entries: Vec<DropEntry>) -> Result<RunOutcome, IndexError> {
        let run = self.begin_run();
        self.status.status("Processing dropped items...");
        self.status.show_progress();

        if entries.is_empty() {
            self.status.status("No valid files or folders were dropped.");
            self.status.hide_progress();
            return Ok(RunOutcome::Empty);
        }

        let files = match walk_entries(entries).await {
            Ok(files) => files,
            Err(e) => {
                error!("Error processing entries: {}", e);
                self.status.status(PROCESSING_ERROR);
                self.status.hide_progress();
                return Err(e);
            }
        };

        if files.is_empty() {
            self.status.status("No valid files found to index.");
            self.status.hide_progress();
            return Ok(RunOutcome::Empty);
        }

        self.status
            .status(&format!("Getting file content for {} files...", files.len()));
        self.assemble_run(run, files).await
    }

    /// Indexes everything accessible below a picked directory.
    pub async fn index_directory(&self, dir: &dyn DirectoryHandle) -> Result<RunOutcome, IndexError> {
        let run = self.begin_run();
        self.status
            .status(&format!("Indexing directory: {}...", dir.name()));
        self.status.show_progress();

        let files = walk_directory(dir, "").await;
        if files.is_empty() {
            self.status
                .status("No files found to index in the selected directory.");
            self.status.hide_progress();
            return Ok(RunOutcome::Empty);
        }

        self.assemble_run(run, files).await
    }

    /// Asks the host picker for a selection and indexes it. `pick` is only
    /// awaited when the host can pick directories.
    pub async fn pick_and_index<F>(
        &self,
        capabilities: &Capabilities,
        pick: F,
    ) -> Result<RunOutcome, IndexError>
    where
        F: Future<Output = Result<Selection, IndexError>>,
    {
        if !capabilities.directory_picker {
            self.status.status(PICKER_UNAVAILABLE);
            return Ok(RunOutcome::Unavailable);
        }

        self.status.status("Please select a directory...");
        self.index_selection(pick.await).await
    }

    /// Indexes the result of a native picker.
    pub async fn index_selection(
        &self,
        selection: Result<Selection, IndexError>,
    ) -> Result<RunOutcome, IndexError> {
        match selection {
            Ok(Selection::Directory(dir)) => self.index_directory(dir.as_ref()).await,
            Ok(Selection::Files(files)) => self.assemble(files).await,
            Err(IndexError::Cancelled) => {
                info!("Selection cancelled");
                self.status.status(SELECTION_CANCELLED);
                self.status.hide_progress();
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                error!("File selection error: {}", e);
                self.status.status(ACCESS_ERROR);
                self.status.hide_progress();
                Err(e)
            }
        }
    }

    /// Extracts every file into a fresh index, persists it and hands it to
    /// the status sink.
    pub async fn assemble(&self, files: Vec<Box<dyn FileHandle>>) -> Result<RunOutcome, IndexError> {
        let run = self.begin_run();
        self.assemble_run(run, files).await
    }

    async fn assemble_run(
        &self,
        run: u64,
        files: Vec<Box<dyn FileHandle>>,
    ) -> Result<RunOutcome, IndexError> {
        if files.is_empty() {
            self.status.status("No files to process.");
            self.status.hide_progress();
            return Ok(RunOutcome::Empty);
        }

        let total = files.len();
        self.status.status(&format!("Indexing {} files...", total));
        self.status.show_progress();

        let outcome = match AssertUnwindSafe(self.collect(&files)).catch_unwind().await {
            Ok(index) => {
                let persisted = self.persist(run, &index).await;
                self.status.render(&index);
                self.status
                    .status(&format!("Indexed {} files successfully.", total));
                info!("Indexed {} files ({} distinct paths)", total, index.len());

                Ok(RunOutcome::Indexed(RunReport {
                    files: total,
                    index,
                    persisted,
                }))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("Error processing files: {}", reason);
                self.status.status(PROCESSING_ERROR);
                Err(IndexError::Aborted(reason))
            }
        };

        tokio::time::sleep(self.config.progress_clear_delay).await;
        self.status.hide_progress();
        outcome
    }

    /// Extracts all files concurrently. When two files share a path, the one
    /// that settles last wins.
    async fn collect(&self, files: &[Box<dyn FileHandle>]) -> FileIndex {
        let total = files.len();
        let mut pending: FuturesUnordered<_> = files
            .iter()
            .map(|file| self.extractor.extract(file.as_ref()))
            .collect();

        let mut index = FileIndex::new();
        let mut completed = 0usize;
        while let Some(record) = pending.next().await {
            if let Some(previous) = index.insert(record) {
                debug!("Replaced earlier record for {}", previous.path);
            }
            completed += 1;
            self.status
                .progress(completed as f64 / total as f64 * 100.0);
        }
        index
    }

    async fn persist(&self, run: u64, index: &FileIndex) -> Persisted {
        if !self.config.persist {
            info!("Skipping file index save in development mode");
            return Persisted::Skipped;
        }

        let _guard = self.save_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != run {
            warn!("Run {} was superseded, not saving its index", run);
            return Persisted::Superseded;
        }

        match self.store.save(index).await {
            Ok(tier) => {
                debug!("Saved file index to {:?} tier", tier);
                Persisted::Saved(tier)
            }
            Err(e) => {
                error!("Error saving file index: {}", e);
                Persisted::Failed(e.to_string())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryChild, PickedFile};
    use crate::entries::{DirectoryEntry, EntryReader, FileEntry};
    use crate::error::{PreviewError, StorageError};
    use crate::models::CONTENT_NOT_AVAILABLE;
    use crate::preview::PageRenderer;
    use crate::source::MemoryFile;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Status(String),
        Progress(f64),
        Show,
        Hide,
        Render(usize),
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn statuses(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Status(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        fn progress(&self) -> Vec<f64> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    Event::Progress(percent) => Some(percent),
                    _ => None,
                })
                .collect()
        }

        fn renders(&self) -> usize {
            self.events()
                .iter()
                .filter(|event| matches!(event, Event::Render(_)))
                .count()
        }
    }

    impl StatusSink for RecordingSink {
        fn status(&self, message: &str) {
            self.events.lock().unwrap().push(Event::Status(message.to_string()));
        }

        fn progress(&self, percent: f64) {
            self.events.lock().unwrap().push(Event::Progress(percent));
        }

        fn show_progress(&self) {
            self.events.lock().unwrap().push(Event::Show);
        }

        fn hide_progress(&self) {
            self.events.lock().unwrap().push(Event::Hide);
        }

        fn render(&self, index: &FileIndex) {
            self.events.lock().unwrap().push(Event::Render(index.len()));
        }
    }

    #[derive(Default)]
    struct MockStore {
        saved: Mutex<Vec<FileIndex>>,
        fail: bool,
        /// Applied to the first save only.
        first_save_delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockStore {
        fn saves(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl IndexPersistence for MockStore {
        async fn save(&self, index: &FileIndex) -> Result<Tier, StorageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let (0, Some(delay)) = (call, self.first_save_delay) {
                tokio::time::sleep(delay).await;
            }
            self.saved.lock().unwrap().push(index.clone());
            if self.fail {
                return Err(StorageError::Unavailable("both tiers down".to_string()));
            }
            Ok(Tier::Bounded)
        }

        async fn load_all(&self) -> Result<FileIndex, StorageError> {
            Ok(self.saved.lock().unwrap().last().cloned().unwrap_or_default())
        }
    }

    struct NoRenderer;

    #[async_trait]
    impl PageRenderer for NoRenderer {
        async fn render_first_page(&self, _document: Vec<u8>, _scale: f32) -> Result<Vec<u8>, PreviewError> {
            Err(PreviewError::Render("no renderer".to_string()))
        }
    }

    fn setup(persist: bool) -> (Indexer, Arc<RecordingSink>, Arc<MockStore>) {
        setup_with_store(persist, MockStore::default())
    }

    fn setup_with_store(persist: bool, store: MockStore) -> (Indexer, Arc<RecordingSink>, Arc<MockStore>) {
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(store);
        let indexer = Indexer::new(
            ContentExtractor::new(Arc::new(NoRenderer), 0.5),
            store.clone(),
            sink.clone(),
            IndexerConfig {
                persist,
                progress_clear_delay: Duration::ZERO,
            },
        );
        (indexer, sink, store)
    }

    fn memory(path: &str, content: &str) -> Box<dyn FileHandle> {
        Box::new(MemoryFile::new(path, content))
    }

    fn indexed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Indexed(report) => report,
            other => panic!("expected an indexed run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_assemble_empty_input() {
        let (indexer, sink, store) = setup(true);

        let outcome = indexer.assemble(Vec::new()).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Empty));
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.statuses(), vec!["No files to process."]);
        assert_eq!(sink.renders(), 0);
    }

    #[tokio::test]
    async fn test_assemble_persists_and_renders() {
        let (indexer, sink, store) = setup(true);
        let files = vec![
            memory("a.txt", "hello world"),
            memory("b.csv", "x,y"),
            memory("c.png", "\u{89}PNG"),
        ];

        let report = indexed(indexer.assemble(files).await.unwrap());

        assert_eq!(report.files, 3);
        assert_eq!(report.persisted, Persisted::Saved(Tier::Bounded));
        assert_eq!(report.index.get("b.csv").unwrap().content, "x | y");
        assert_eq!(store.saves(), 1);
        assert_eq!(store.saved.lock().unwrap()[0], report.index);
        assert_eq!(sink.renders(), 1);
        assert_eq!(
            sink.statuses(),
            vec!["Indexing 3 files...", "Indexed 3 files successfully."]
        );
        assert_eq!(sink.events().last(), Some(&Event::Hide));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_reaches_100() {
        let (indexer, sink, _store) = setup(false);
        let files = (0..7).map(|i| memory(&format!("f{i}.txt"), "x")).collect();

        indexer.assemble(files).await.unwrap();

        let progress = sink.progress();
        assert_eq!(progress.len(), 7);
        assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(progress.iter().all(|p| (0.0..=100.0).contains(p)));
        assert_eq!(progress.last(), Some(&100.0));
    }

    #[tokio::test]
    async fn test_development_mode_skips_persistence() {
        let (indexer, sink, store) = setup(false);

        let report = indexed(indexer.assemble(vec![memory("a.md", "# A")]).await.unwrap());

        assert_eq!(report.persisted, Persisted::Skipped);
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.renders(), 1);
    }

    #[tokio::test]
    async fn test_degraded_records_still_count() {
        let (indexer, sink, _store) = setup(true);
        let files: Vec<Box<dyn FileHandle>> = vec![
            memory("ok.txt", "fine"),
            Box::new(MemoryFile::new("bad.txt", "never").failing()),
        ];

        let report = indexed(indexer.assemble(files).await.unwrap());

        assert_eq!(report.index.get("bad.txt").unwrap().content, CONTENT_NOT_AVAILABLE);
        assert!(sink
            .statuses()
            .contains(&"Indexed 2 files successfully.".to_string()));
    }

    #[tokio::test]
    async fn test_path_collision_keeps_last_settled() {
        let (indexer, _sink, _store) = setup(false);
        let files: Vec<Box<dyn FileHandle>> = vec![
            Box::new(MemoryFile::new("dup.txt", "slow").with_read_delay(Duration::from_millis(50))),
            Box::new(MemoryFile::new("dup.txt", "fast")),
        ];

        let report = indexed(indexer.assemble(files).await.unwrap());

        assert_eq!(report.files, 2);
        assert_eq!(report.index.len(), 1);
        assert_eq!(report.index.get("dup.txt").unwrap().content, "slow");
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let (indexer, _sink, _store) = setup(false);
        let build = || vec![memory("a.txt", "alpha"), memory("d/b.csv", "1,2"), memory("c.bin", "?")];

        let first = indexed(indexer.assemble(build()).await.unwrap()).index;
        let second = indexed(indexer.assemble(build()).await.unwrap()).index;

        let mut first_paths: Vec<_> = first.paths().collect();
        let mut second_paths: Vec<_> = second.paths().collect();
        first_paths.sort();
        second_paths.sort();
        assert_eq!(first_paths, second_paths);
        for path in first_paths {
            assert_eq!(first.get(path).unwrap().content, second.get(path).unwrap().content);
        }
    }

    #[tokio::test]
    async fn test_save_failure_does_not_fail_run() {
        let (indexer, sink, _store) = setup_with_store(
            true,
            MockStore {
                fail: true,
                ..Default::default()
            },
        );

        let report = indexed(indexer.assemble(vec![memory("a.txt", "a")]).await.unwrap());

        assert!(matches!(report.persisted, Persisted::Failed(_)));
        assert_eq!(sink.renders(), 1);
        assert!(sink
            .statuses()
            .contains(&"Indexed 1 files successfully.".to_string()));
    }

    struct PanickingFile;

    #[async_trait]
    impl FileHandle for PanickingFile {
        fn name(&self) -> &str {
            "boom.txt"
        }

        fn path(&self) -> &str {
            "boom.txt"
        }

        fn size(&self) -> u64 {
            0
        }

        fn mime_type(&self) -> &str {
            "text/plain"
        }

        fn last_modified(&self) -> i64 {
            0
        }

        fn download_url(&self) -> String {
            String::new()
        }

        async fn read_bytes(&self) -> Result<Vec<u8>, IndexError> {
            panic!("reader exploded")
        }
    }

    #[tokio::test]
    async fn test_fan_out_panic_is_reported_and_not_persisted() {
        let (indexer, sink, store) = setup(true);
        let files: Vec<Box<dyn FileHandle>> = vec![memory("a.txt", "a"), Box::new(PanickingFile)];

        let result = indexer.assemble(files).await;

        assert!(matches!(result, Err(IndexError::Aborted(reason)) if reason == "reader exploded"));
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.renders(), 0);
        assert_eq!(sink.statuses().last().map(String::as_str), Some(PROCESSING_ERROR));
        assert_eq!(sink.events().last(), Some(&Event::Hide));
    }

    #[tokio::test]
    async fn test_superseded_run_does_not_persist() {
        let (indexer, _sink, store) = setup(true);
        let slow: Vec<Box<dyn FileHandle>> = vec![Box::new(
            MemoryFile::new("old.txt", "old").with_read_delay(Duration::from_millis(50)),
        )];
        let fast = vec![memory("new.txt", "new")];

        let (old, new) = tokio::join!(indexer.assemble(slow), indexer.assemble(fast));

        assert_eq!(indexed(old.unwrap()).persisted, Persisted::Superseded);
        assert_eq!(indexed(new.unwrap()).persisted, Persisted::Saved(Tier::Bounded));
        assert_eq!(store.saves(), 1);
        assert!(store.saved.lock().unwrap()[0].get("new.txt").is_some());
    }

    #[tokio::test]
    async fn test_slow_save_cannot_overwrite_newer_run() {
        let (indexer, _sink, store) = setup_with_store(
            true,
            MockStore {
                first_save_delay: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        );

        let newer = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            indexer.assemble(vec![memory("new.txt", "new")]).await
        };
        let (old, new) = tokio::join!(indexer.assemble(vec![memory("old.txt", "old")]), newer);

        assert_eq!(indexed(old.unwrap()).persisted, Persisted::Saved(Tier::Bounded));
        assert_eq!(indexed(new.unwrap()).persisted, Persisted::Saved(Tier::Bounded));
        let stored = store.load_all().await.unwrap();
        assert_eq!(stored.paths().collect::<Vec<_>>(), vec!["new.txt"]);
    }

    struct Entry(&'static str);

    #[async_trait]
    impl FileEntry for Entry {
        fn full_path(&self) -> &str {
            self.0
        }

        async fn file(&self) -> Result<Box<dyn FileHandle>, IndexError> {
            Ok(memory(self.0, "dropped"))
        }
    }

    struct FailingDir;

    impl DirectoryEntry for FailingDir {
        fn full_path(&self) -> &str {
            "/broken"
        }

        fn create_reader(&self) -> Box<dyn EntryReader> {
            Box::new(FailingReader)
        }
    }

    struct FailingReader;

    #[async_trait]
    impl EntryReader for FailingReader {
        async fn read_entries(&mut self) -> Result<Vec<DropEntry>, IndexError> {
            Err(IndexError::Traversal {
                path: "/broken".to_string(),
                reason: "not readable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_drop_indexes_entries() {
        let (indexer, sink, store) = setup(true);
        let entries = vec![
            DropEntry::File(Box::new(Entry("/a.txt"))),
            DropEntry::File(Box::new(Entry("/b.txt"))),
        ];

        let report = indexed(indexer.index_drop(entries).await.unwrap());

        assert!(report.index.get("/a.txt").is_some());
        assert_eq!(store.saves(), 1);
        let statuses = sink.statuses();
        assert_eq!(statuses[0], "Processing dropped items...");
        assert!(statuses.contains(&"Getting file content for 2 files...".to_string()));
        assert_eq!(statuses.last().unwrap(), "Indexed 2 files successfully.");
    }

    #[tokio::test]
    async fn test_drop_traversal_failure_aborts_run() {
        let (indexer, sink, store) = setup(true);
        let entries = vec![
            DropEntry::File(Box::new(Entry("/fine.txt"))),
            DropEntry::Directory(Box::new(FailingDir)),
        ];

        let result = indexer.index_drop(entries).await;

        assert!(matches!(result, Err(IndexError::Traversal { .. })));
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.renders(), 0);
        assert_eq!(sink.statuses().last().map(String::as_str), Some(PROCESSING_ERROR));
    }

    #[tokio::test]
    async fn test_empty_drop() {
        let (indexer, sink, store) = setup(true);

        let outcome = indexer.index_drop(Vec::new()).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Empty));
        assert_eq!(store.saves(), 0);
        assert_eq!(
            sink.statuses().last().map(String::as_str),
            Some("No valid files or folders were dropped.")
        );
    }

    struct Picked {
        name: &'static str,
        broken: bool,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PickedFile for Picked {
        fn name(&self) -> &str {
            self.name
        }

        async fn get_file(&self, relative_path: String) -> Result<Box<dyn FileHandle>, IndexError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(IndexError::Access {
                    path: relative_path,
                    reason: "locked".to_string(),
                });
            }
            Ok(Box::new(MemoryFile::new(relative_path, "picked")))
        }
    }

    struct PickedDir {
        files: Vec<(&'static str, bool)>,
        fetches: Arc<AtomicUsize>,
    }

    impl DirectoryHandle for PickedDir {
        fn name(&self) -> &str {
            "picked"
        }

        fn values(&self) -> BoxStream<'_, Result<DirectoryChild, IndexError>> {
            let children: Vec<Result<DirectoryChild, IndexError>> = self
                .files
                .iter()
                .map(|&(name, broken)| {
                    Ok(DirectoryChild::File(Box::new(Picked {
                        name,
                        broken,
                        fetches: self.fetches.clone(),
                    })))
                })
                .collect();
            stream::iter(children).boxed()
        }
    }

    #[tokio::test]
    async fn test_directory_skips_broken_file() {
        let (indexer, sink, store) = setup(true);
        let fetches = Arc::new(AtomicUsize::new(0));
        let dir = PickedDir {
            files: vec![("one.txt", false), ("two.txt", true), ("three.txt", false)],
            fetches: fetches.clone(),
        };

        let report = indexed(indexer.index_directory(&dir).await.unwrap());

        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        assert_eq!(report.files, 2);
        let mut paths: Vec<_> = report.index.paths().collect();
        paths.sort();
        assert_eq!(paths, vec!["one.txt", "three.txt"]);
        assert_eq!(store.saves(), 1);
        assert_eq!(sink.statuses()[0], "Indexing directory: picked...");
    }

    #[tokio::test]
    async fn test_empty_directory_skips_assembly() {
        let (indexer, sink, store) = setup(true);
        let dir = PickedDir {
            files: Vec::new(),
            fetches: Arc::new(AtomicUsize::new(0)),
        };

        let outcome = indexer.index_directory(&dir).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Empty));
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.renders(), 0);
        assert_eq!(
            sink.statuses().last().map(String::as_str),
            Some("No files found to index in the selected directory.")
        );
    }

    #[tokio::test]
    async fn test_cancelled_selection() {
        let (indexer, sink, store) = setup(true);

        let outcome = indexer.index_selection(Err(IndexError::Cancelled)).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.statuses(), vec![SELECTION_CANCELLED]);
    }

    #[tokio::test]
    async fn test_pick_without_picker_support() {
        let (indexer, sink, store) = setup(true);
        let capabilities = Capabilities {
            directory_picker: false,
            standalone: false,
        };
        let asked = AtomicUsize::new(0);
        let pick = async {
            asked.fetch_add(1, Ordering::SeqCst);
            Err(IndexError::Cancelled)
        };

        let outcome = indexer.pick_and_index(&capabilities, pick).await.unwrap();

        assert!(matches!(outcome, RunOutcome::Unavailable));
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert_eq!(store.saves(), 0);
        assert_eq!(sink.statuses(), vec![PICKER_UNAVAILABLE]);
    }

    #[tokio::test]
    async fn test_pick_prompts_before_selection() {
        let (indexer, sink, store) = setup(true);
        let capabilities = Capabilities {
            directory_picker: true,
            standalone: true,
        };
        let selection = Selection::Files(vec![memory("chosen.txt", "chosen")]);

        let report = indexed(
            indexer
                .pick_and_index(&capabilities, async { Ok(selection) })
                .await
                .unwrap(),
        );

        assert!(report.index.get("chosen.txt").is_some());
        assert_eq!(store.saves(), 1);
        assert_eq!(sink.statuses()[0], "Please select a directory...");

        let cancelled = indexer
            .pick_and_index(&capabilities, async { Err(IndexError::Cancelled) })
            .await
            .unwrap();
        assert!(matches!(cancelled, RunOutcome::Cancelled));
        assert_eq!(
            sink.statuses().last().map(String::as_str),
            Some(SELECTION_CANCELLED)
        );
    }

    #[tokio::test]
    async fn test_failed_selection() {
        let (indexer, sink, _store) = setup(true);
        let error = IndexError::Access {
            path: "/secret".to_string(),
            reason: "denied".to_string(),
        };

        assert!(indexer.index_selection(Err(error)).await.is_err());
        assert_eq!(sink.statuses(), vec![ACCESS_ERROR]);
    }

    #[tokio::test]
    async fn test_selected_files() {
        let (indexer, _sink, store) = setup(true);
        let selection = Selection::Files(vec![memory("picked.md", "# picked")]);

        let report = indexed(indexer.index_selection(Ok(selection)).await.unwrap());

        assert_eq!(report.index.get("picked.md").unwrap().content, "# picked");
        assert_eq!(store.saves(), 1);
    }
}
