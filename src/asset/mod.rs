// src/asset/mod.rs
// =============================================================================
// The asset layer: everything the crawler discovers is an Asset.
//
// An asset is identified by its URL. It has:
// - a kind (an HTML page we can fetch and parse, or some other resource)
// - a status that only ever moves forward (Unprocessed -> ... -> Parsed)
// - a small per-asset config (currently just "skip this one")
// - page data filled in by the crawler once the page has been fetched
//
// Plugins never change an asset. They read its status and subscribe to its
// status channel, and they ask the AssetManager (the crawler) to parse pages.
//
// Rust concepts:
// - tokio::sync::watch: a channel that always holds the latest value,
//   perfect for "tell me whenever the status changes"
// - Traits: AssetManager is an interface the plugin engine talks to
// - Arc: shared ownership between the crawler and every plugin
// =============================================================================

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use url::Url;

// Status of an asset. The derive(PartialOrd, Ord) makes the order of the
// variants below the order used by comparisons, so `status >= Parsed` works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetStatus {
    /// Known, but nobody asked for it to be fetched yet
    Unprocessed,
    /// A parse was requested and the fetch is in flight
    Requested,
    /// Body downloaded (or the download failed)
    Fetched,
    /// Links and metadata extracted, plugins may now check it
    Parsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// An HTML document that can be fetched and parsed
    Page,
    /// Anything else (images, external sites, stylesheets...)
    Resource,
}

/// Per-asset configuration set by the host when the asset is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetConfig {
    /// Checks must not run against this asset
    pub skip: bool,
}

/// What the crawler learned when it fetched a page.
#[derive(Debug, Clone, Default)]
pub struct PageData {
    /// HTTP status code of the response, if one arrived
    pub http_status: Option<u16>,
    /// Why the fetch failed, if it did
    pub error: Option<String>,
    /// Text of the <title> element, if present
    pub title: Option<String>,
    /// Every <a href> on the page, in document order
    pub links: Vec<DiscoveredLink>,
}

/// A link as it appeared on a page, plus the absolute URL it resolves to
/// (None when the href is malformed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    pub href: String,
    pub url: Option<Url>,
}

#[derive(Debug)]
pub struct Asset {
    url: Url,
    kind: AssetKind,
    depth: usize,
    config: AssetConfig,
    // The sender keeps the current status; every subscriber gets a receiver
    status: watch::Sender<AssetStatus>,
    page: Mutex<PageData>,
}

impl Asset {
    pub fn new(url: Url, kind: AssetKind, depth: usize, config: AssetConfig) -> Self {
        let (status, _) = watch::channel(AssetStatus::Unprocessed);
        Self {
            url,
            kind,
            depth,
            config,
            status,
            page: Mutex::new(PageData::default()),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn is_page(&self) -> bool {
        self.kind == AssetKind::Page
    }

    /// How many link hops away from the crawl root this asset was found
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    pub fn status(&self) -> AssetStatus {
        *self.status.borrow()
    }

    /// Subscribe to status changes.
    ///
    /// The receiver sees the current status immediately and is woken up
    /// every time the status moves forward.
    pub fn subscribe(&self) -> watch::Receiver<AssetStatus> {
        self.status.subscribe()
    }

    /// Move the status forward. Returns false (and changes nothing) if `next`
    /// is not strictly after the current status.
    pub fn advance(&self, next: AssetStatus) -> bool {
        self.status.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Snapshot of the page data (cloned so no lock escapes)
    pub fn page(&self) -> PageData {
        self.page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the page data. Only the crawler calls this, before it
    /// advances the asset to Parsed.
    pub fn set_page(&self, data: PageData) {
        *self
            .page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = data;
    }
}

// The interface the plugin engine uses to talk to whoever owns the assets.
//
// Send + Sync lets us share an Arc<dyn AssetManager> across tokio tasks.
pub trait AssetManager: Send + Sync {
    /// Look up a known asset by URL
    fn get_asset(&self, url: &Url) -> Option<Arc<Asset>>;

    /// Ask for a page to be fetched and parsed.
    ///
    /// Fire-and-forget: this must return immediately. The parse happens in
    /// the background, and plugins hear about it through status changes.
    fn request_parse(&self, asset: &Arc<Asset>);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> Asset {
        Asset::new(
            Url::parse(url).unwrap(),
            AssetKind::Page,
            0,
            AssetConfig::default(),
        )
    }

    #[test]
    fn test_status_order() {
        assert!(AssetStatus::Parsed > AssetStatus::Fetched);
        assert!(AssetStatus::Fetched > AssetStatus::Requested);
        assert!(AssetStatus::Requested > AssetStatus::Unprocessed);
    }

    #[test]
    fn test_advance_only_moves_forward() {
        let asset = page("https://example.com/");
        assert!(asset.advance(AssetStatus::Fetched));
        assert!(!asset.advance(AssetStatus::Requested));
        assert!(!asset.advance(AssetStatus::Fetched));
        assert_eq!(asset.status(), AssetStatus::Fetched);
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let asset = page("https://example.com/");
        let mut rx = asset.subscribe();
        asset.advance(AssetStatus::Parsed);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AssetStatus::Parsed);
    }

    #[test]
    fn test_page_data_roundtrip() {
        let asset = page("https://example.com/");
        asset.set_page(PageData {
            http_status: Some(200),
            title: Some("Home".to_string()),
            ..PageData::default()
        });
        assert_eq!(asset.page().title.as_deref(), Some("Home"));
    }
}
