// src/plugin/engine.rs
// =============================================================================
// The Plugin: runs one check against every page the crawler discovers.
//
// Lifecycle of a page inside one plugin:
// 1. The crawler announces a new asset with on_new_parsed_asset()
// 2. If it's a page, the plugin watches its status channel
// 3. The first time the status reaches Parsed, the page goes into the
//    processed set and the checker's add_to_queue() turns it into work items
// 4. Each work item becomes one task on the plugin's queue
// 5. The task (the "gate") looks up the item's target asset, asks the crawler
//    to parse local pages, skips excluded targets, and otherwise runs check()
// 6. The outcome bumps passed/failed/skipped and a Progress event goes out
//
// Step 3 happens at most once per page, no matter how many times its status
// changes or how often it is announced.
//
// Rust concepts:
// - Arc<Self> receivers: methods that need to hand the plugin to spawned
//   tasks take `self: &Arc<Self>` so they can clone the Arc
// - Weak: the status listener only keeps a weak reference to the asset, so
//   it never keeps a retired asset alive
// - oneshot as a stop signal: dropping the sender ends the listener
// - broadcast: one sender, any number of subscribers
// =============================================================================

use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, trace, warn};
use url::Url;

use super::hooks::{CheckContext, Checker, Helpers, WorkItem};
use super::progress::{ItemOutcome, PluginEvent, Progress, Tally};
use super::queue::{
    panic_message, CompletionHook, IdleHook, QueueStats, TaskQueue, DEFAULT_CONCURRENCY,
};
use super::render;
use crate::asset::{Asset, AssetManager, AssetStatus};
use crate::error::{AuditError, Result, MAX_TITLE_LEN};
use crate::issues::{Issue, IssueStore};

// Events are small and subscribers read them quickly, so this only has to
// absorb bursts
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Shown at the start of the status line (at most 10 characters)
    pub title: String,
    /// What the checked units are called in the status line
    pub check_label: String,
    /// How many work items may be checked at once
    pub concurrency: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            title: "Plugin".to_string(),
            check_label: "pages".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// What the host hands a plugin in setup().
#[derive(Clone)]
pub struct HostContext {
    pub assets: Option<Arc<dyn AssetManager>>,
    pub issues: Arc<IssueStore>,
}

// A page with a live status listener. Dropping it stops the listener.
struct Watch {
    asset: Weak<Asset>,
    _stop: oneshot::Sender<()>,
}

pub struct Plugin {
    config: PluginConfig,
    checker: Arc<dyn Checker>,
    queue: TaskQueue<ItemOutcome>,
    tally: Arc<Tally>,
    // Pages already handed to add_to_queue()
    processed: Mutex<HashSet<Url>>,
    // Pages announced but not dispatched yet. Lock after `processed`
    // when both are needed.
    watching: Mutex<HashMap<Url, Watch>>,
    events: broadcast::Sender<PluginEvent>,
    host: OnceLock<HostContext>,
}

impl Plugin {
    /// Build a plugin around a checker.
    ///
    /// Fails if the title is longer than 10 characters.
    pub fn new(config: PluginConfig, checker: Arc<dyn Checker>) -> Result<Arc<Self>> {
        let len = config.title.chars().count();
        if len > MAX_TITLE_LEN {
            return Err(AuditError::TitleTooLong {
                title: config.title,
                len,
            });
        }

        let tally = Arc::new(Tally::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        // Both hooks run under the queue's lock, so every snapshot they send
        // has counters that agree with `done`
        let on_complete: CompletionHook<ItemOutcome> = {
            let tally = Arc::clone(&tally);
            let events = events.clone();
            Arc::new(move |outcome: ItemOutcome, stats: &QueueStats| {
                tally.record(outcome);
                // send() only fails when nobody is subscribed
                let _ = events.send(PluginEvent::Progress(tally.progress(stats)));
            })
        };
        let on_idle: IdleHook = {
            let tally = Arc::clone(&tally);
            let events = events.clone();
            Arc::new(move |stats: &QueueStats| {
                let _ = events.send(PluginEvent::Idle(tally.progress(stats)));
            })
        };

        let queue = TaskQueue::new(config.concurrency, on_complete, on_idle);

        Ok(Arc::new(Self {
            config,
            checker,
            queue,
            tally,
            processed: Mutex::new(HashSet::new()),
            watching: Mutex::new(HashMap::new()),
            events,
            host: OnceLock::new(),
        }))
    }

    /// Connect the plugin to its host and start the duration clock.
    pub fn setup(&self, host: HostContext) {
        if self.host.set(host).is_err() {
            warn!(plugin = %self.config.title, "setup called twice, keeping the first host");
        }
        self.queue.arm();
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn check_label(&self) -> &str {
        &self.config.check_label
    }

    /// Receive Progress and Idle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginEvent> {
        self.events.subscribe()
    }

    pub fn passed(&self) -> usize {
        self.tally.passed()
    }

    pub fn failed(&self) -> usize {
        self.tally.failed()
    }

    pub fn skipped(&self) -> usize {
        self.tally.skipped()
    }

    pub fn total(&self) -> usize {
        self.queue.total()
    }

    pub fn done(&self) -> usize {
        self.queue.done()
    }

    pub fn duration_secs(&self) -> u64 {
        self.queue.duration_secs()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Counters and queue numbers read together.
    pub fn progress(&self) -> Progress {
        self.queue.with_stats(|stats| self.tally.progress(stats))
    }

    pub fn status_line(&self) -> String {
        render::status_line(&self.config.title, &self.config.check_label, &self.progress())
    }

    /// True when the queue is idle and every page still being watched is
    /// untouched. A watched page past Unprocessed is either being fetched or
    /// parsed and waiting for its listener to dispatch it.
    pub fn is_settled(&self) -> bool {
        if !self.queue.is_idle() {
            return false;
        }
        let watching = lock(&self.watching);
        !watching.values().any(|watch| {
            watch
                .asset
                .upgrade()
                .is_some_and(|asset| asset.status() > AssetStatus::Unprocessed)
        })
    }

    /// Is a status listener still waiting on this page?
    pub fn is_watching(&self, url: &Url) -> bool {
        lock(&self.watching).contains_key(url)
    }

    /// Stop watching a page that will never be parsed.
    pub fn release(&self, url: &Url) {
        if lock(&self.watching).remove(url).is_some() {
            trace!(plugin = %self.config.title, url = %url, "page released");
        }
    }

    /// Stop every status listener. Called by the host once the crawl is over.
    pub fn release_all(&self) {
        let released = std::mem::take(&mut *lock(&self.watching));
        if !released.is_empty() {
            debug!(plugin = %self.config.title, pages = released.len(), "released unparsed pages");
        }
    }

    /// The host calls this once for every asset it creates.
    ///
    /// Pages get a status listener; anything else is ignored. A page that is
    /// already watched or dispatched keeps its existing state.
    pub fn on_new_parsed_asset(self: &Arc<Self>, asset: &Arc<Asset>) {
        if !asset.is_page() {
            trace!(plugin = %self.config.title, url = %asset.url(), "ignoring non-page asset");
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        {
            let processed = lock(&self.processed);
            let mut watching = lock(&self.watching);
            if processed.contains(asset.url()) || watching.contains_key(asset.url()) {
                trace!(plugin = %self.config.title, url = %asset.url(), "page already known");
                return;
            }
            watching.insert(
                asset.url().clone(),
                Watch {
                    asset: Arc::downgrade(asset),
                    _stop: stop_tx,
                },
            );
        }

        let mut status = asset.subscribe();
        let weak = Arc::downgrade(asset);
        let plugin = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                // The status at subscription time counts as a signal too
                let current = *status.borrow_and_update();
                if current >= AssetStatus::Parsed {
                    if let Some(asset) = weak.upgrade() {
                        plugin.dispatch(asset).await;
                    }
                    break;
                }
                tokio::select! {
                    // Err means the asset was dropped before it got parsed
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    // The watch entry is gone: released, or dispatched
                    _ = &mut stop_rx => break,
                }
            }
        });
    }

    // Run add_to_queue() for a parsed page, once per page.
    async fn dispatch(self: &Arc<Self>, asset: Arc<Asset>) {
        // The hold is taken before the page leaves `watching`, so there is no
        // moment where it is neither watched nor holding the queue
        let _hold = {
            let mut processed = lock(&self.processed);
            if !processed.insert(asset.url().clone()) {
                drop(processed);
                lock(&self.watching).remove(asset.url());
                trace!(plugin = %self.config.title, url = %asset.url(), "page already dispatched");
                return;
            }
            let hold = self.queue.hold();
            lock(&self.watching).remove(asset.url());
            hold
        };

        let helpers = Helpers::new(Arc::clone(&self.checker));
        let items = self
            .checker
            .add_to_queue(Arc::clone(&asset), &helpers)
            .await;
        debug!(
            plugin = %self.config.title,
            url = %asset.url(),
            items = items.len(),
            "page dispatched"
        );

        for item in items {
            let plugin = Arc::clone(self);
            self.queue.add(move || async move { plugin.run_item(item).await });
        }
    }

    // The gate: decide what happens to one work item.
    async fn run_item(&self, item: WorkItem) -> ItemOutcome {
        let host = self.host.get();
        let assets = host.and_then(|host| host.assets.clone());

        let target = match (item.url(), &assets) {
            (Some(url), Some(assets)) => assets.get_asset(url),
            _ => None,
        };

        // Grow the crawl. request_parse() returns right away and we never
        // wait for the parse; its pages arrive later through status changes.
        if let (Some(url), Some(target), Some(assets)) = (item.url(), &target, &assets) {
            if target.is_page() && self.checker.is_local_url(url) {
                assets.request_parse(target);
            }
        }

        if target.as_ref().is_some_and(|asset| asset.config().skip) {
            debug!(plugin = %self.config.title, url = ?item.url().map(Url::as_str), "item skipped");
            return ItemOutcome::Skipped;
        }

        let issues = match host {
            Some(host) => Arc::clone(&host.issues),
            None => {
                warn!(plugin = %self.config.title, "checking before setup, issues will be dropped");
                Arc::new(IssueStore::new())
            }
        };

        let url = item.url().map(|url| url.to_string());
        let ctx = CheckContext::new(
            item,
            self.config.title.clone(),
            issues,
            assets,
            Arc::clone(&self.checker),
        );

        if let Err(panic) = AssertUnwindSafe(self.checker.check(&ctx))
            .catch_unwind()
            .await
        {
            let message = panic_message(panic.as_ref());
            error!(plugin = %self.config.title, url = ?url, panic = %message, "check panicked");
            ctx.report(Issue::new(
                url.unwrap_or_default(),
                format!("check panicked: {}", message),
            ));
        }

        if ctx.reported() > 0 {
            ItemOutcome::Failed
        } else {
            ItemOutcome::Passed
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
