//! The paginated media viewer.
//!
//! [`ViewerModel`] holds the state and its transitions and does no I/O. [`ViewerController`]
//! owns a model on a single task, runs page fetches next to it and feeds their results
//! back in the order they were requested. Results of fetches superseded by a reload are
//! dropped.

use std::{collections::HashMap, sync::Arc};

use log::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    error::{FetchError, MediaError},
    gallery::{GalleryFile, GalleryMedia},
    media::{MediaBatch, MediaSource},
    url_factory::UrlFactories,
    viewer_page::{ViewSize, ViewerPage},
};

/// Start loading more once the current page is this close to the end of the list.
pub const LOAD_MORE_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerStatus {
    Loading,
    Ready,
    /// Ready, with the next page being fetched.
    LoadingMore,
    /// The initial load failed.
    Error(String),
}

/// One-off notifications for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    PageChanged { index: usize },
    /// Only ever sent for the page that just became visible.
    LoadPreview { index: usize, url: String },
    PagesChanged,
    /// Loading more failed, the loaded pages are untouched and loading more can be retried.
    LoadMoreFailed { message: String },
    /// The server sent media this client can't classify. Nothing after it can be loaded,
    /// so loading more stops for good.
    LoadMoreAborted { message: String },
}

/// Everything the host renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub status: ViewerStatus,
    pub pages: Vec<ViewerPage>,
    pub current_index: usize,
    pub are_actions_visible: bool,
    pub is_download_visible: bool,
    pub title: Option<String>,
}

impl ViewerSnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, ViewerStatus::Loading | ViewerStatus::LoadingMore)
    }

    /// Files to choose from when sharing, downloading or opening the media.
    pub fn files_of(&self, media_uid: &str) -> Option<&[GalleryFile]> {
        self.pages
            .iter()
            .find(|page| page.source.uid == media_uid)
            .map(|page| page.source.files())
    }
}

#[derive(Debug)]
pub struct ViewerModel {
    factories: UrlFactories,
    media: Vec<Arc<GalleryMedia>>,
    index_by_uid: HashMap<String, usize>,
    pages: Vec<ViewerPage>,
    current_index: usize,
    view_size: ViewSize,
    status: ViewerStatus,
    next_offset: usize,
    has_more: bool,
    are_actions_visible: bool,
}

impl ViewerModel {
    pub fn new(factories: UrlFactories, view_size: ViewSize) -> Self {
        Self {
            factories,
            media: Vec::new(),
            index_by_uid: HashMap::new(),
            pages: Vec::new(),
            current_index: 0,
            view_size,
            status: ViewerStatus::Loading,
            next_offset: 0,
            has_more: true,
            are_actions_visible: true,
        }
    }

    pub fn status(&self) -> &ViewerStatus {
        &self.status
    }

    pub fn pages(&self) -> &[ViewerPage] {
        &self.pages
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_page(&self) -> Option<&ViewerPage> {
        self.pages.get(self.current_index)
    }

    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn files_of(&self, media_uid: &str) -> Option<&[GalleryFile]> {
        self.index_by_uid.get(media_uid).map(|&i| self.media[i].files())
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        let current = self.current_page();
        ViewerSnapshot {
            status: self.status.clone(),
            pages: self.pages.clone(),
            current_index: self.current_index,
            are_actions_visible: self.are_actions_visible,
            is_download_visible: current.map_or(false, |page| !page.source.files().is_empty()),
            title: current.map(|page| page.source.title.clone()),
        }
    }

    /// Drop everything and wait for the initial page again.
    pub fn reset(&mut self) {
        self.media.clear();
        self.index_by_uid.clear();
        self.pages.clear();
        self.current_index = 0;
        self.status = ViewerStatus::Loading;
        self.next_offset = 0;
        self.has_more = true;
    }

    pub fn on_initial_loaded(&mut self, result: Result<MediaBatch, FetchError>) -> Vec<ViewerEvent> {
        let applied = result.and_then(|batch| self.apply_batch(batch).map_err(FetchError::from));

        match applied {
            Ok(_) => {
                self.status = ViewerStatus::Ready;
                let mut events = vec![ViewerEvent::PagesChanged];
                events.extend(self.page_events());
                events
            }
            Err(e) => {
                error!("failed to load the media list: {}", e);
                self.status = ViewerStatus::Error(e.to_string());
                Vec::new()
            }
        }
    }

    /// Move to loading more if that makes sense, returning the offset to fetch.
    pub fn start_load_more(&mut self) -> Option<usize> {
        if self.status != ViewerStatus::Ready || !self.has_more {
            return None;
        }
        self.status = ViewerStatus::LoadingMore;
        Some(self.next_offset)
    }

    pub fn on_more_loaded(&mut self, result: Result<MediaBatch, FetchError>) -> Vec<ViewerEvent> {
        if self.status != ViewerStatus::LoadingMore {
            warn!("ignoring a page loaded while in {:?}", self.status);
            return Vec::new();
        }
        self.status = ViewerStatus::Ready;

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                warn!("failed to load more media: {}", e);
                return vec![ViewerEvent::LoadMoreFailed { message: e.to_string() }];
            }
        };

        match self.apply_batch(batch) {
            Ok(true) => vec![ViewerEvent::PagesChanged],
            Ok(false) => Vec::new(),
            Err(e) => {
                error!("stopped loading more media: {}", e);
                self.has_more = false;
                vec![ViewerEvent::LoadMoreAborted { message: e.to_string() }]
            }
        }
    }

    pub fn should_load_more(&self) -> bool {
        self.status == ViewerStatus::Ready
            && self.has_more
            && self.current_index + LOAD_MORE_THRESHOLD >= self.pages.len()
    }

    pub fn on_page_changed(&mut self, index: usize) -> Vec<ViewerEvent> {
        if index == self.current_index || index >= self.pages.len() {
            return Vec::new();
        }
        self.current_index = index;
        self.page_events()
    }

    pub fn on_page_clicked(&mut self) {
        self.are_actions_visible = !self.are_actions_visible;
    }

    /// Re-derive all pages for the new size. Returns whether any page changed.
    pub fn set_view_size(&mut self, view_size: ViewSize) -> bool {
        if view_size == self.view_size {
            return false;
        }
        self.view_size = view_size;

        let pages = self
            .media
            .iter()
            .map(|media| ViewerPage::from_gallery_media(media.clone(), view_size))
            .collect::<Vec<_>>();
        let changed = pages != self.pages;
        self.pages = pages;
        changed
    }

    fn page_events(&self) -> Vec<ViewerEvent> {
        let index = self.current_index;
        let mut events = vec![ViewerEvent::PageChanged { index }];
        if let Some(url) = self.current_page().and_then(ViewerPage::preview_url) {
            events.push(ViewerEvent::LoadPreview {
                index,
                url: url.to_owned(),
            });
        }
        events
    }

    /// Add a fetched page. Media seen before gets the new files merged in, new media is
    /// appended. Nothing changes if any record fails to classify.
    fn apply_batch(&mut self, batch: MediaBatch) -> Result<bool, MediaError> {
        let incoming = batch
            .records
            .iter()
            .map(|record| GalleryMedia::from_merged_photo(record, &self.factories))
            .collect::<Result<Vec<_>, _>>()?;

        self.next_offset = batch.next_offset;
        self.has_more = !batch.is_last;

        let mut changed = false;
        for media in incoming {
            match self.index_by_uid.get(&media.uid) {
                Some(&i) => {
                    let known = self.media[i].files().len();
                    let merged = Arc::make_mut(&mut self.media[i]).merge_files(media.files().iter().cloned()).len();
                    if merged != known {
                        debug!("merged {} more files into {}", merged - known, media.uid);
                        self.pages[i] = ViewerPage::from_gallery_media(self.media[i].clone(), self.view_size);
                        changed = true;
                    }
                }
                None => {
                    let media = Arc::new(media);
                    self.index_by_uid.insert(media.uid.clone(), self.media.len());
                    self.pages.push(ViewerPage::from_gallery_media(media.clone(), self.view_size));
                    self.media.push(media);
                    changed = true;
                }
            }
        }

        Ok(changed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    LoadMore,
    PageChanged(usize),
    PageClicked,
    ViewSizeChanged(ViewSize),
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPurpose {
    Initial,
    More,
}

struct FetchResult {
    generation: u64,
    purpose: FetchPurpose,
    result: Result<MediaBatch, FetchError>,
}

/// Handle to a viewer running on its own task.
///
/// Dropping the handle stops the viewer and cancels any fetch in flight.
#[derive(Debug)]
pub struct ViewerController {
    commands: mpsc::UnboundedSender<ViewerCommand>,
    snapshots: watch::Receiver<ViewerSnapshot>,
    events: mpsc::UnboundedReceiver<ViewerEvent>,
    cancel: CancellationToken,
    _cancel_on_drop: DropGuard,
    task: JoinHandle<()>,
}

impl ViewerController {
    /// Start the viewer and its initial load.
    pub fn spawn<S: MediaSource>(source: S, factories: UrlFactories, view_size: ViewSize) -> Self {
        let model = ViewerModel::new(factories, view_size);
        let (snapshots_tx, snapshots) = watch::channel(model.snapshot());
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let task = ViewerTask {
            source: Arc::new(source),
            model,
            generation: 0,
            fetch_cancel: cancel.child_token(),
            results: results_tx,
            snapshots: snapshots_tx,
            events: events_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::task::spawn(task.run(commands_rx, results_rx));

        Self {
            commands,
            snapshots,
            events,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    /// Returns false if the viewer has stopped.
    pub fn send(&self, command: ViewerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn load_more(&self) -> bool {
        self.send(ViewerCommand::LoadMore)
    }

    pub fn page_changed(&self, index: usize) -> bool {
        self.send(ViewerCommand::PageChanged(index))
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewerSnapshot> {
        self.snapshots.clone()
    }

    pub async fn next_event(&mut self) -> Option<ViewerEvent> {
        self.events.recv().await
    }

    /// Take every event sent so far without waiting.
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait until a snapshot matches `predicate`, or the viewer stops.
    pub async fn wait_for(&self, predicate: impl Fn(&ViewerSnapshot) -> bool) -> Option<ViewerSnapshot> {
        let mut snapshots = self.subscribe();
        loop {
            {
                let snapshot = snapshots.borrow_and_update();
                if predicate(&snapshot) {
                    return Some(snapshot.clone());
                }
            }
            if snapshots.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Stop the viewer, cancelling any fetch in flight, and wait for it to finish.
    pub async fn dispose(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("viewer task failed: {}", e);
        }
    }
}

struct ViewerTask<S> {
    source: Arc<S>,
    model: ViewerModel,
    /// Bumped on reload so results of older fetches can be told apart.
    generation: u64,
    fetch_cancel: CancellationToken,
    results: mpsc::UnboundedSender<FetchResult>,
    snapshots: watch::Sender<ViewerSnapshot>,
    events: mpsc::UnboundedSender<ViewerEvent>,
    cancel: CancellationToken,
}

impl<S: MediaSource> ViewerTask<S> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ViewerCommand>,
        mut results: mpsc::UnboundedReceiver<FetchResult>,
    ) {
        self.start_fetch(FetchPurpose::Initial, 0);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("viewer disposed");
                    break;
                }

                Some(result) = results.recv() => self.on_fetch_result(result),

                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        debug!("viewer handle dropped");
                        break;
                    }
                },
            }
        }

        self.fetch_cancel.cancel();
    }

    fn on_command(&mut self, command: ViewerCommand) {
        debug!("viewer command {:?}", command);

        match command {
            ViewerCommand::LoadMore => self.load_more(),
            ViewerCommand::PageChanged(index) => {
                let events = self.model.on_page_changed(index);
                self.emit(events);
                if self.model.should_load_more() {
                    self.load_more();
                }
            }
            ViewerCommand::PageClicked => self.model.on_page_clicked(),
            ViewerCommand::ViewSizeChanged(view_size) => {
                if self.model.set_view_size(view_size) {
                    self.emit(vec![ViewerEvent::PagesChanged]);
                }
            }
            ViewerCommand::Reload => {
                self.generation += 1;
                self.fetch_cancel.cancel();
                self.fetch_cancel = self.cancel.child_token();
                self.model.reset();
                self.start_fetch(FetchPurpose::Initial, 0);
            }
        }

        self.publish();
    }

    fn on_fetch_result(&mut self, result: FetchResult) {
        if result.generation != self.generation {
            debug!(
                "discarding a result of fetch generation {}, now at {}",
                result.generation, self.generation
            );
            return;
        }

        // a failed fetch is only retried on request
        let fetched = result.result.is_ok();
        let events = match result.purpose {
            FetchPurpose::Initial => self.model.on_initial_loaded(result.result),
            FetchPurpose::More => self.model.on_more_loaded(result.result),
        };
        self.emit(events);

        if fetched && self.model.should_load_more() {
            self.load_more();
        }

        self.publish();
    }

    fn load_more(&mut self) {
        if let Some(offset) = self.model.start_load_more() {
            self.start_fetch(FetchPurpose::More, offset);
        }
    }

    fn start_fetch(&self, purpose: FetchPurpose, offset: usize) {
        let source = self.source.clone();
        let results = self.results.clone();
        let cancel = self.fetch_cancel.clone();
        let generation = self.generation;

        info!("loading media from offset {}", offset);
        tokio::task::spawn(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => debug!("fetch at offset {} cancelled", offset),

                result = source.fetch(offset) => {
                    // the viewer may be gone already
                    let _ = results.send(FetchResult { generation, purpose, result });
                }
            }
        });
    }

    fn emit(&self, events: Vec<ViewerEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.model.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::Mutex,
        time::Duration,
    };

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use shared_libs::json_templates::MergedPhoto;
    use tokio::sync::Notify;

    use super::*;
    use crate::{
        gallery::tests::factories,
        type_data::tests::{file, photo},
        viewer_page::PageKindTag,
    };

    const PHONE: ViewSize = ViewSize { width: 1080, height: 2400 };

    fn record(uid: &str, media_type: &str, files: &[&str]) -> MergedPhoto {
        let mut record = photo(
            media_type,
            files.iter().map(|name| file(name, false, false, None)).collect(),
            None,
        );
        record.uid = uid.to_owned();
        record.hash = format!("hash-{uid}");
        record.title = format!("title of {uid}");
        for file in &mut record.files {
            file.photo_uid = uid.to_owned();
        }
        record
    }

    fn batch(records: Vec<MergedPhoto>, next_offset: usize, is_last: bool) -> MediaBatch {
        MediaBatch {
            records,
            next_offset,
            is_last,
        }
    }

    enum Reply {
        Batch(MediaBatch),
        Fail(StatusCode),
        /// Wait to be released before answering.
        Gated(Arc<Notify>, MediaBatch),
        Hang,
    }

    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<VecDeque<Reply>>,
        offsets: Mutex<Vec<usize>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                offsets: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl MediaSource for Arc<ScriptedSource> {
        async fn fetch(&self, offset: usize) -> Result<MediaBatch, FetchError> {
            self.offsets.lock().unwrap().push(offset);
            let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Hang);
            match reply {
                Reply::Batch(batch) => Ok(batch),
                Reply::Fail(status) => Err(FetchError::Status(status)),
                Reply::Gated(gate, batch) => {
                    gate.notified().await;
                    Ok(batch)
                }
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    async fn wait_for(
        controller: &ViewerController,
        predicate: impl Fn(&ViewerSnapshot) -> bool,
    ) -> ViewerSnapshot {
        tokio::time::timeout(Duration::from_secs(5), controller.wait_for(predicate))
            .await
            .expect("viewer did not reach the expected state")
            .expect("viewer stopped")
    }

    fn model_with(records: Vec<MergedPhoto>, is_last: bool) -> ViewerModel {
        let mut model = ViewerModel::new(factories(), PHONE);
        let len = records.len();
        model.on_initial_loaded(Ok(batch(records, len, is_last)));
        model
    }

    #[test]
    fn initial_load_shows_the_first_page() {
        let mut model = ViewerModel::new(factories(), PHONE);
        let events = model.on_initial_loaded(Ok(batch(
            vec![record("a", "image", &["a.jpg"]), record("b", "sidecar", &["b.xmp"])],
            2,
            true,
        )));

        assert_eq!(model.status(), &ViewerStatus::Ready);
        assert_eq!(model.pages().len(), 2);
        assert_eq!(
            events,
            [
                ViewerEvent::PagesChanged,
                ViewerEvent::PageChanged { index: 0 },
                ViewerEvent::LoadPreview {
                    index: 0,
                    url: String::from("https://photos.example.org/api/v1/t/hash-a/pt/fit_2048"),
                },
            ]
        );

        let snapshot = model.snapshot();
        assert_eq!(snapshot.title.as_deref(), Some("title of a"));
        assert!(snapshot.is_download_visible);
        assert!(!snapshot.is_loading());
    }

    #[test]
    fn initial_failure_is_an_error_state() {
        let mut model = ViewerModel::new(factories(), PHONE);
        model.on_initial_loaded(Err(FetchError::Status(StatusCode::BAD_GATEWAY)));

        assert!(matches!(model.status(), ViewerStatus::Error(_)));
        assert!(model.pages().is_empty());
    }

    #[test]
    fn unsupported_type_fails_the_whole_batch() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"])], false);
        model.start_load_more().unwrap();

        let events = model.on_more_loaded(Ok(batch(
            vec![record("b", "image", &["b.jpg"]), record("c", "hologram", &["c.holo"])],
            3,
            true,
        )));

        assert!(matches!(&events[..], [ViewerEvent::LoadMoreAborted { message }] if message.contains("hologram")));
        assert_eq!(model.pages().len(), 1);
        assert_eq!(model.status(), &ViewerStatus::Ready);
        assert!(!model.has_more());
        assert!(!model.should_load_more());
        assert_eq!(model.start_load_more(), None);
    }

    #[test]
    fn more_pages_merge_repeated_media() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"]), record("b", "image", &["b.jpg"])], false);
        assert_eq!(model.start_load_more(), Some(2));
        assert_eq!(model.status(), &ViewerStatus::LoadingMore);
        assert_eq!(model.start_load_more(), None);

        let events = model.on_more_loaded(Ok(batch(
            vec![record("b", "image", &["b.jpg", "b.dng"]), record("c", "video", &["c.mp4"])],
            4,
            true,
        )));

        assert_eq!(events, [ViewerEvent::PagesChanged]);
        assert_eq!(model.status(), &ViewerStatus::Ready);
        assert_eq!(model.pages().len(), 3);
        assert_eq!(model.pages()[2].kind(), PageKindTag::Video);
        assert_eq!(
            model
                .files_of("b")
                .unwrap()
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>(),
            ["b.jpg", "b.dng"]
        );
        assert_eq!(model.pages()[1].source.files().len(), 2);
        assert!(!model.has_more());
        assert_eq!(model.start_load_more(), None);
    }

    #[test]
    fn repeating_known_files_changes_nothing() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"])], false);
        model.start_load_more().unwrap();

        let events = model.on_more_loaded(Ok(batch(vec![record("a", "image", &["a.jpg"])], 2, false)));

        assert!(events.is_empty());
        assert_eq!(model.files_of("a").unwrap().len(), 1);
    }

    #[test]
    fn failed_load_more_keeps_pages_and_can_be_retried() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"])], false);
        let before = model.pages().to_vec();
        model.start_load_more().unwrap();

        let events = model.on_more_loaded(Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE)));

        assert!(matches!(&events[..], [ViewerEvent::LoadMoreFailed { .. }]));
        assert_eq!(model.pages(), &before[..]);
        assert_eq!(model.status(), &ViewerStatus::Ready);
        assert_eq!(model.start_load_more(), Some(1));
    }

    #[test]
    fn loads_more_near_the_end_only() {
        let records = (0..10).map(|i| record(&format!("m{i}"), "image", &["x.jpg"])).collect();
        let mut model = model_with(records, false);

        assert!(!model.should_load_more());
        model.on_page_changed(6);
        assert!(!model.should_load_more());
        model.on_page_changed(7);
        assert!(model.should_load_more());
    }

    #[test]
    fn page_change_requests_only_the_visible_preview() {
        let mut model = model_with(
            vec![record("a", "image", &["a.jpg"]), record("b", "text", &["b.txt"]), record("c", "video", &["c.mp4"])],
            true,
        );

        assert_eq!(
            model.on_page_changed(2),
            [
                ViewerEvent::PageChanged { index: 2 },
                ViewerEvent::LoadPreview {
                    index: 2,
                    url: String::from("https://photos.example.org/api/v1/videos/hash-c/pt/avc"),
                },
            ]
        );
        assert_eq!(model.on_page_changed(1), [ViewerEvent::PageChanged { index: 1 }]);
        assert!(model.on_page_changed(1).is_empty());
        assert!(model.on_page_changed(3).is_empty());
        assert_eq!(model.current_index(), 1);
    }

    #[test]
    fn page_click_toggles_actions() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"])], true);

        assert!(model.snapshot().are_actions_visible);
        model.on_page_clicked();
        assert!(!model.snapshot().are_actions_visible);
        model.on_page_clicked();
        assert!(model.snapshot().are_actions_visible);
    }

    #[test]
    fn view_size_changes_rederive_previews() {
        let mut model = model_with(vec![record("a", "image", &["a.jpg"]), record("b", "video", &["b.mp4"])], true);
        let media_uids = model.pages().iter().map(|p| p.source.uid.clone()).collect::<Vec<_>>();

        assert!(!model.set_view_size(PHONE));
        // same tier, the pages only differ in the recorded size
        assert!(model.set_view_size(ViewSize::new(1080, 2200)));
        assert!(model.set_view_size(ViewSize::new(3840, 2160)));

        assert_eq!(
            model.pages()[0].preview_url(),
            Some("https://photos.example.org/api/v1/t/hash-a/pt/fit_3840")
        );
        assert_eq!(
            model.pages().iter().map(|p| p.source.uid.clone()).collect::<Vec<_>>(),
            media_uids
        );
    }

    #[tokio::test]
    async fn controller_loads_and_pages() {
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::Batch(batch(
                (0..5).map(|i| record(&format!("m{i}"), "image", &["x.jpg"])).collect(),
                5,
                false,
            )),
            Reply::Batch(batch(vec![record("m5", "live", &["y.jpg"])], 6, true)),
        ]));
        let mut controller = ViewerController::spawn(source.clone(), factories(), PHONE);

        let snapshot = wait_for(&controller, |s| s.status == ViewerStatus::Ready).await;
        assert_eq!(snapshot.pages.len(), 5);
        assert_eq!(controller.next_event().await, Some(ViewerEvent::PagesChanged));
        assert_eq!(controller.next_event().await, Some(ViewerEvent::PageChanged { index: 0 }));

        assert!(controller.page_changed(3));
        let snapshot = wait_for(&controller, |s| s.pages.len() == 6 && s.status == ViewerStatus::Ready).await;
        assert_eq!(snapshot.current_index, 3);
        assert_eq!(*source.offsets.lock().unwrap(), [0, 5]);

        assert_eq!(
            snapshot.files_of("m5").map(|files| files.len()),
            Some(1)
        );

        controller.dispose().await;
    }

    #[tokio::test]
    async fn controller_retries_after_a_failed_load_more() {
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::Batch(batch(
                (0..5).map(|i| record(&format!("m{i}"), "image", &["x.jpg"])).collect(),
                5,
                false,
            )),
            Reply::Fail(StatusCode::BAD_GATEWAY),
            Reply::Batch(batch(vec![record("m5", "image", &["x.jpg"])], 6, true)),
        ]));
        let mut controller = ViewerController::spawn(source.clone(), factories(), PHONE);
        wait_for(&controller, |s| s.status == ViewerStatus::Ready).await;

        controller.load_more();
        loop {
            match controller.next_event().await {
                Some(ViewerEvent::LoadMoreFailed { .. }) => break,
                Some(_) => continue,
                None => panic!("viewer stopped"),
            }
        }
        let snapshot = wait_for(&controller, |s| s.status == ViewerStatus::Ready).await;
        assert_eq!(snapshot.pages.len(), 5);

        controller.load_more();
        wait_for(&controller, |s| s.pages.len() == 6).await;
        assert_eq!(*source.offsets.lock().unwrap(), [0, 5, 5]);

        controller.dispose().await;
    }

    #[tokio::test]
    async fn reload_discards_the_superseded_fetch() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::Gated(gate.clone(), batch(vec![record("old", "image", &["old.jpg"])], 1, true)),
            Reply::Batch(batch(vec![record("new", "image", &["new.jpg"])], 1, true)),
        ]));
        let controller = ViewerController::spawn(source.clone(), factories(), PHONE);

        // make sure the first fetch is in flight before reloading
        while source.offsets.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        controller.send(ViewerCommand::Reload);

        let snapshot = wait_for(&controller, |s| s.status == ViewerStatus::Ready).await;
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.pages[0].source.uid, "new");
        assert_eq!(controller.snapshot().pages[0].source.uid, "new");
        assert_eq!(controller.snapshot().pages.len(), 1);

        controller.dispose().await;
    }

    #[tokio::test]
    async fn results_of_an_older_generation_are_dropped() {
        let model = ViewerModel::new(factories(), PHONE);
        let (snapshots, snapshots_rx) = watch::channel(model.snapshot());
        let (events, mut events_rx) = mpsc::unbounded_channel();
        let (results, _results_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut task = ViewerTask {
            source: Arc::new(Arc::new(ScriptedSource::default())),
            model,
            generation: 1,
            fetch_cancel: cancel.child_token(),
            results,
            snapshots,
            events,
            cancel,
        };

        task.on_fetch_result(FetchResult {
            generation: 0,
            purpose: FetchPurpose::Initial,
            result: Ok(batch(vec![record("old", "image", &["old.jpg"])], 1, true)),
        });

        assert_eq!(task.model.status(), &ViewerStatus::Loading);
        assert!(task.model.pages().is_empty());
        assert!(events_rx.try_recv().is_err());
        assert_eq!(snapshots_rx.borrow().status, ViewerStatus::Loading);

        task.on_fetch_result(FetchResult {
            generation: 1,
            purpose: FetchPurpose::Initial,
            result: Ok(batch(vec![record("new", "image", &["new.jpg"])], 1, true)),
        });

        assert_eq!(task.model.status(), &ViewerStatus::Ready);
        assert_eq!(task.model.pages()[0].source.uid, "new");
        assert_eq!(events_rx.try_recv().ok(), Some(ViewerEvent::PagesChanged));
        assert_eq!(snapshots_rx.borrow().pages.len(), 1);
    }

    #[tokio::test]
    async fn keeps_loading_past_pages_without_media() {
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::Batch(batch(vec![], 5, false)),
            Reply::Batch(batch(vec![], 10, false)),
            Reply::Batch(batch(vec![record("a", "image", &["a.jpg"])], 11, true)),
        ]));
        let controller = ViewerController::spawn(source.clone(), factories(), PHONE);

        let snapshot = wait_for(&controller, |s| s.pages.len() == 1 && s.status == ViewerStatus::Ready).await;
        assert_eq!(snapshot.pages[0].source.uid, "a");
        assert_eq!(*source.offsets.lock().unwrap(), [0, 5, 10]);

        controller.dispose().await;
    }

    #[tokio::test]
    async fn failed_load_more_is_not_retried_on_its_own() {
        let source = Arc::new(ScriptedSource::new(vec![
            Reply::Batch(batch(vec![], 5, false)),
            Reply::Fail(StatusCode::BAD_GATEWAY),
        ]));
        let mut controller = ViewerController::spawn(source.clone(), factories(), PHONE);

        loop {
            match controller.next_event().await {
                Some(ViewerEvent::LoadMoreFailed { .. }) => break,
                Some(_) => continue,
                None => panic!("viewer stopped"),
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*source.offsets.lock().unwrap(), [0, 5]);
        assert_eq!(controller.snapshot().status, ViewerStatus::Ready);

        controller.dispose().await;
    }

    #[tokio::test]
    async fn drained_events_are_gone() {
        let source = Arc::new(ScriptedSource::new(vec![Reply::Batch(batch(
            vec![record("a", "image", &["a.jpg"])],
            1,
            true,
        ))]));
        let mut controller = ViewerController::spawn(source, factories(), PHONE);
        wait_for(&controller, |s| s.status == ViewerStatus::Ready).await;

        let events = controller.drain_events();
        assert_eq!(events[0], ViewerEvent::PagesChanged);
        assert_eq!(events[1], ViewerEvent::PageChanged { index: 0 });
        assert!(controller.drain_events().is_empty());

        controller.dispose().await;
    }

    #[tokio::test]
    async fn dispose_cancels_a_hanging_fetch() {
        let source = Arc::new(ScriptedSource::new(vec![Reply::Hang]));
        let controller = ViewerController::spawn(source, factories(), PHONE);
        assert!(controller.snapshot().is_loading());

        tokio::time::timeout(Duration::from_secs(5), controller.dispose())
            .await
            .expect("dispose did not finish");
    }
}
