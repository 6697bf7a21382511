// src/plugin/hooks.rs
// =============================================================================
// The extension points a concrete check implements.
//
// A check is anything that implements the Checker trait:
// - add_to_queue(): turn a freshly parsed page into work items
//   (default: the page itself is the only item)
// - check(): inspect one work item and report issues (required)
// - is_local_url(): does this URL belong to the site being audited?
//   (default: yes, everything is local)
//
// The plugin engine owns an Arc<dyn Checker> and calls these hooks; it never
// needs to know which concrete check it is running.
//
// Rust concepts:
// - async-trait: plain traits can't (yet) have async methods usable through
//   `dyn`, so the #[async_trait] macro boxes the futures for us
// - Default methods: a trait can provide a body that implementors may override
// =============================================================================

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::asset::{Asset, AssetManager};
use crate::error::{AuditError, Result};
use crate::issues::{Issue, IssueStore};

/// A reference found on a page, waiting to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// The href exactly as written in the page
    pub href: String,
    /// Absolute URL, or None if the href could not be resolved
    pub url: Option<Url>,
    /// The page the link was found on
    pub source: Url,
}

/// One unit of work for a check.
#[derive(Debug, Clone)]
pub enum WorkItem {
    Link(LinkRef),
    Page(Arc<Asset>),
}

impl WorkItem {
    /// The URL this item points at, if there is one
    pub fn url(&self) -> Option<&Url> {
        match self {
            WorkItem::Link(link) => link.url.as_ref(),
            WorkItem::Page(asset) => Some(asset.url()),
        }
    }
}

/// Utilities handed to add_to_queue().
pub struct Helpers {
    checker: Arc<dyn Checker>,
}

impl Helpers {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    pub fn is_local_url(&self, url: &Url) -> bool {
        self.checker.is_local_url(url)
    }
}

/// What a check sees while it runs against one work item.
pub struct CheckContext {
    item: WorkItem,
    title: String,
    issues: Arc<IssueStore>,
    assets: Option<Arc<dyn AssetManager>>,
    checker: Arc<dyn Checker>,
    reported: AtomicUsize,
}

impl CheckContext {
    pub fn new(
        item: WorkItem,
        title: impl Into<String>,
        issues: Arc<IssueStore>,
        assets: Option<Arc<dyn AssetManager>>,
        checker: Arc<dyn Checker>,
    ) -> Self {
        Self {
            item,
            title: title.into(),
            issues,
            assets,
            checker,
            reported: AtomicUsize::new(0),
        }
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    /// Record a finding. Any report marks the current item as failed.
    pub fn report(&self, mut issue: Issue) {
        issue.check = self.title.clone();
        self.issues.add(issue);
        self.reported.fetch_add(1, Ordering::SeqCst);
    }

    /// Look up an asset through the asset manager.
    pub fn get_asset(&self, url: &Url) -> Result<Option<Arc<Asset>>> {
        let assets = self.assets.as_ref().ok_or(AuditError::NoAssetManager)?;
        Ok(assets.get_asset(url))
    }

    pub fn is_local_url(&self, url: &Url) -> bool {
        self.checker.is_local_url(url)
    }

    /// How many issues were reported through this context
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::SeqCst)
    }
}

#[async_trait]
pub trait Checker: Send + Sync {
    /// Derive work items from a page that just reached Parsed.
    async fn add_to_queue(&self, asset: Arc<Asset>, _helpers: &Helpers) -> Vec<WorkItem> {
        vec![WorkItem::Page(asset)]
    }

    /// Inspect one work item. Findings go through `ctx.report()`.
    ///
    /// Should not panic. If it does, the engine reports the panic as an
    /// issue and counts the item as failed.
    async fn check(&self, ctx: &CheckContext);

    fn is_local_url(&self, _url: &Url) -> bool {
        true
    }
}
