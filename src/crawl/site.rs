// src/crawl/site.rs
// =============================================================================
// The site crawler: owns every asset and grows the crawl on demand.
//
// How it works:
// 1. run() registers the start URL as the root page and requests its parse
// 2. request_parse() spawns a background fetch for a page (if it is within
//    the depth limit and wasn't requested before) and returns immediately
// 3. The fetch downloads the page, extracts its title and links, registers
//    every newly seen URL as an asset (announcing each to all plugins), and
//    finally moves the page to Parsed
// 4. Plugins react to Parsed, and their work items call request_parse() for
//    local pages, which brings us back to step 2 (with follow_all set, step 3
//    requests every page it finds itself)
// 5. run() returns once no fetch is in flight and every plugin has settled,
//    then stops every plugin's remaining listeners and detaches the plugins
//
// Politeness:
// - Only same-host pages are ever fetched
// - A depth limit stops the crawl from running away
//
// Rust concepts:
// - Arc::new_cyclic: gives the crawler a Weak pointer to itself so that
//   request_parse(&self) can hand an owned Arc to a spawned task
// - HashMap behind a Mutex: the asset registry, shared by many tasks
// - AtomicUsize: counts in-flight fetches without a lock
// =============================================================================

use anyhow::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::extract;
use crate::asset::{Asset, AssetConfig, AssetKind, AssetManager, AssetStatus, PageData};
use crate::error::AuditError;
use crate::plugin::Plugin;

// How often run() re-checks whether the crawl has settled
const SETTLE_POLL: Duration = Duration::from_millis(50);

// File extensions that are never HTML pages
const RESOURCE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "css", "js", "pdf", "zip", "gz", "mp3",
    "mp4", "woff", "woff2", "ttf", "xml", "json", "txt",
];

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Pages deeper than this many hops from the root are never fetched
    /// (1 = just the starting page)
    pub max_depth: usize,
    /// URLs containing any of these strings are marked skip
    pub exclude: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Fetch every page found while parsing, instead of waiting for a check
    /// to ask for it
    pub follow_all: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            exclude: Vec::new(),
            timeout: Duration::from_secs(10),
            follow_all: false,
        }
    }
}

pub struct SiteCrawler {
    root: Url,
    client: Client,
    options: CrawlOptions,
    assets: Mutex<HashMap<Url, Arc<Asset>>>,
    plugins: Mutex<Vec<Arc<Plugin>>>,
    in_flight: AtomicUsize,
    me: Weak<SiteCrawler>,
}

impl SiteCrawler {
    // Parameters:
    //   start_url: where the crawl begins; its host decides what counts as a page
    //   options: depth limit, exclude rules, timeout
    pub fn new(start_url: &str, options: CrawlOptions) -> Result<Arc<Self>> {
        let invalid = |message: String| AuditError::InvalidUrl {
            url: start_url.to_string(),
            message,
        };
        let mut root = Url::parse(start_url).map_err(|e| invalid(e.to_string()))?;
        root.set_fragment(None);
        if root.host_str().is_none() {
            return Err(invalid("URL has no host".to_string()).into());
        }

        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Arc::new_cyclic(|me| Self {
            root,
            client,
            options,
            assets: Mutex::new(HashMap::new()),
            plugins: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            me: me.clone(),
        }))
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Shared HTTP client (checks reuse it for connection pooling)
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Plugins that hear about every asset registered from now on.
    pub fn attach(&self, plugin: Arc<Plugin>) {
        lock(&self.plugins).push(plugin);
    }

    /// Crawl from the root until nothing is left to fetch or check.
    ///
    /// Plugins are detached when the crawl is over, so a second run() starts
    /// with none attached.
    pub async fn run(&self) -> Result<()> {
        let (root, _) = self.register(self.root.clone(), 0);
        info!(url = %self.root, max_depth = self.options.max_depth, "crawl started");
        self.request_parse(&root);

        while !self.is_settled() {
            tokio::time::sleep(SETTLE_POLL).await;
        }

        // Pages nobody asked for are still watched; end those listeners and
        // drop our side of the plugin <-> host references
        let plugins = std::mem::take(&mut *lock(&self.plugins));
        for plugin in &plugins {
            plugin.release_all();
        }

        info!(assets = lock(&self.assets).len(), "crawl settled");
        Ok(())
    }

    /// No fetch in flight and every plugin idle with nothing left to dispatch.
    ///
    /// in_flight is read on both sides of the plugin check: a gate item can
    /// start a fetch and finish while the plugins are being looked at.
    pub fn is_settled(&self) -> bool {
        if self.in_flight.load(Ordering::SeqCst) != 0 {
            return false;
        }
        let plugins = lock(&self.plugins).clone();
        plugins.iter().all(|plugin| plugin.is_settled())
            && self.in_flight.load(Ordering::SeqCst) == 0
    }

    // Pages this crawler would ever fetch
    fn is_parseable(&self, asset: &Asset) -> bool {
        asset.is_page() && !asset.config().skip && asset.depth() < self.options.max_depth
    }

    /// Pages vs resources: a page is an http(s) URL on the root's host whose
    /// path doesn't end in a known resource extension.
    pub fn classify(&self, url: &Url) -> AssetKind {
        let web = url.scheme() == "http" || url.scheme() == "https";
        let same_host = url.host_str() == self.root.host_str();
        let resource = url
            .path()
            .rsplit('/')
            .next()
            .and_then(|segment| segment.rsplit_once('.'))
            .is_some_and(|(_, ext)| RESOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));

        if web && same_host && !resource {
            AssetKind::Page
        } else {
            AssetKind::Resource
        }
    }

    fn is_excluded(&self, url: &Url) -> bool {
        self.options
            .exclude
            .iter()
            .any(|pattern| url.as_str().contains(pattern.as_str()))
    }

    // Returns the asset for `url`, creating it if needed. The bool is true
    // when the asset is new; new assets are announced to every plugin.
    fn register(&self, url: Url, depth: usize) -> (Arc<Asset>, bool) {
        let asset = {
            let mut assets = lock(&self.assets);
            if let Some(existing) = assets.get(&url) {
                return (Arc::clone(existing), false);
            }
            let config = AssetConfig {
                skip: self.is_excluded(&url),
            };
            let asset = Arc::new(Asset::new(url.clone(), self.classify(&url), depth, config));
            assets.insert(url, Arc::clone(&asset));
            asset
        };

        debug!(url = %asset.url(), kind = ?asset.kind(), depth, "asset registered");

        // Cloned so no lock is held while plugins run their hooks
        let plugins = lock(&self.plugins).clone();
        let parseable = self.is_parseable(&asset);
        for plugin in &plugins {
            plugin.on_new_parsed_asset(&asset);
            if asset.is_page() && !parseable {
                // Too deep or excluded: it will never reach Parsed
                plugin.release(asset.url());
            }
        }
        (asset, true)
    }

    // Fetch a page and turn it into PageData. Failures are recorded on the
    // page instead of being returned, so the page still reaches Parsed.
    async fn parse(&self, asset: Arc<Asset>) {
        let data = match fetch_page(&self.client, asset.url()).await {
            Ok((status, body)) => {
                let mut data = extract::parse_page(&body, asset.url());
                data.http_status = Some(status);
                if !(200..300).contains(&status) {
                    data.error = Some(format!("HTTP {}", status));
                }
                data
            }
            Err(e) => {
                warn!(url = %asset.url(), error = %e, "failed to fetch page");
                PageData {
                    error: Some(e.to_string()),
                    ..PageData::default()
                }
            }
        };
        asset.advance(AssetStatus::Fetched);

        // Register what we found before the page turns Parsed, so plugins
        // can already look these assets up when they react
        for link in &data.links {
            if let Some(url) = &link.url {
                let (found, _) = self.register(url.clone(), asset.depth() + 1);
                if self.options.follow_all {
                    self.request_parse(&found);
                }
            }
        }

        debug!(url = %asset.url(), links = data.links.len(), "page parsed");
        asset.set_page(data);
        asset.advance(AssetStatus::Parsed);
    }
}

impl AssetManager for SiteCrawler {
    fn get_asset(&self, url: &Url) -> Option<Arc<Asset>> {
        lock(&self.assets).get(url).cloned()
    }

    fn request_parse(&self, asset: &Arc<Asset>) {
        if !self.is_parseable(asset) {
            return;
        }
        // A page marked Requested must always get its fetch
        let Some(me) = self.me.upgrade() else {
            return;
        };
        // Only the first request moves Unprocessed -> Requested
        if !asset.advance(AssetStatus::Requested) {
            return;
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let asset = Arc::clone(asset);
        tokio::spawn(async move {
            me.parse(asset).await;
            me.in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

// Fetches a web page and returns its status code and body
async fn fetch_page(client: &Client, url: &Url) -> Result<(u16, String)> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{build_client, LinksChecker, PagesChecker};
    use crate::issues::IssueStore;
    use crate::plugin::{Checker, HostContext, PluginConfig};
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler(options: CrawlOptions) -> Arc<SiteCrawler> {
        SiteCrawler::new("https://example.com/start#top", options).unwrap()
    }

    #[test]
    fn test_invalid_start_url() {
        assert!(SiteCrawler::new("not a url", CrawlOptions::default()).is_err());
    }

    #[test]
    fn test_root_drops_fragment() {
        let crawler = crawler(CrawlOptions::default());
        assert_eq!(crawler.root().as_str(), "https://example.com/start");
    }

    #[test]
    fn test_classify() {
        let crawler = crawler(CrawlOptions::default());
        let kind = |s: &str| crawler.classify(&Url::parse(s).unwrap());

        assert_eq!(kind("https://example.com/docs"), AssetKind::Page);
        assert_eq!(kind("https://example.com/docs/v1.2/"), AssetKind::Page);
        assert_eq!(kind("https://example.com/logo.PNG"), AssetKind::Resource);
        assert_eq!(kind("https://other.org/"), AssetKind::Resource);
        assert_eq!(kind("ftp://example.com/file"), AssetKind::Resource);
    }

    #[test]
    fn test_register_is_idempotent_and_applies_excludes() {
        let crawler = crawler(CrawlOptions {
            exclude: vec!["/private".to_string()],
            ..CrawlOptions::default()
        });
        let url = Url::parse("https://example.com/private/area").unwrap();

        let (first, new) = crawler.register(url.clone(), 1);
        assert!(new);
        assert!(first.config().skip);

        let (second, new) = crawler.register(url.clone(), 1);
        assert!(!new);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(crawler.get_asset(&url).is_some());
    }

    #[tokio::test]
    async fn test_request_parse_respects_depth_and_skip() {
        let crawler = crawler(CrawlOptions {
            max_depth: 1,
            exclude: vec!["/private".to_string()],
            ..CrawlOptions::default()
        });
        let (deep, _) = crawler.register(Url::parse("https://example.com/deep").unwrap(), 1);
        let (private, _) = crawler.register(Url::parse("https://example.com/private").unwrap(), 0);

        crawler.request_parse(&deep);
        crawler.request_parse(&private);

        assert_eq!(deep.status(), AssetStatus::Unprocessed);
        assert_eq!(private.status(), AssetStatus::Unprocessed);
        assert!(crawler.is_settled());
    }

    // ---- crawling a local site ----------------------------------------------
    //
    //   /  -> /a, /missing (404)
    //   /a -> /b
    //   /b

    fn html(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
            .collect();
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, anchors
        )
    }

    async fn site() -> MockServer {
        let server = MockServer::start().await;
        let pages = [
            ("/", html("Home", &["/a", "/missing"])),
            ("/a", html("A", &["/b"])),
            ("/b", html("B", &[])),
        ];
        for (route, body) in pages {
            Mock::given(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
                .mount(&server)
                .await;
        }
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        server
    }

    struct Audit {
        crawler: Arc<SiteCrawler>,
        plugin: Arc<Plugin>,
        issues: Arc<IssueStore>,
    }

    async fn audit(
        server: &MockServer,
        options: CrawlOptions,
        title: &str,
        make_checker: impl FnOnce(&SiteCrawler) -> Arc<dyn Checker>,
    ) -> Audit {
        let crawler = SiteCrawler::new(&format!("{}/", server.uri()), options).unwrap();
        let plugin = Plugin::new(
            PluginConfig {
                title: title.to_string(),
                ..PluginConfig::default()
            },
            make_checker(&crawler),
        )
        .unwrap();
        let issues = Arc::new(IssueStore::new());
        plugin.setup(HostContext {
            assets: Some(crawler.clone() as Arc<dyn AssetManager>),
            issues: Arc::clone(&issues),
        });
        crawler.attach(Arc::clone(&plugin));

        tokio::time::timeout(Duration::from_secs(20), crawler.run())
            .await
            .expect("crawl did not settle")
            .unwrap();

        Audit {
            crawler,
            plugin,
            issues,
        }
    }

    fn status_of(crawler: &SiteCrawler, server: &MockServer, route: &str) -> Option<AssetStatus> {
        let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
        crawler.get_asset(&url).map(|asset| asset.status())
    }

    fn links_checker(crawler: &SiteCrawler) -> Arc<dyn Checker> {
        let client = build_client(Duration::from_secs(5)).unwrap();
        Arc::new(LinksChecker::new(crawler.root(), client))
    }

    #[tokio::test]
    async fn test_links_audit_follows_local_links() {
        let server = site().await;
        let options = CrawlOptions {
            max_depth: 3,
            ..CrawlOptions::default()
        };
        let run = audit(&server, options, "Links", links_checker).await;

        for route in ["/", "/a", "/b", "/missing"] {
            assert_eq!(
                status_of(&run.crawler, &server, route),
                Some(AssetStatus::Parsed),
                "{}",
                route
            );
        }
        assert!(run.crawler.is_settled());

        let progress = run.plugin.progress();
        assert_eq!(progress.done, 3);
        assert_eq!(progress.passed, 2);
        assert_eq!(progress.failed, 1);

        let issues = run.issues.all();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].url.ends_with("/missing"));
        assert_eq!(issues[0].message, "HTTP 404");
    }

    #[tokio::test]
    async fn test_pages_audit_with_follow_all_visits_every_page() {
        let server = site().await;
        let options = CrawlOptions {
            max_depth: 3,
            follow_all: true,
            ..CrawlOptions::default()
        };
        let run = audit(&server, options, "Pages", |_| {
            Arc::new(PagesChecker) as Arc<dyn Checker>
        })
        .await;

        assert_eq!(status_of(&run.crawler, &server, "/b"), Some(AssetStatus::Parsed));
        assert_eq!(run.plugin.done(), 4);
        assert_eq!(run.plugin.passed(), 3);
        assert_eq!(run.plugin.failed(), 1);

        let issues = run.issues.all();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "page could not be loaded: HTTP 404");
    }

    #[tokio::test]
    async fn test_pages_beyond_depth_are_released() {
        let server = site().await;
        let options = CrawlOptions {
            max_depth: 2,
            follow_all: true,
            ..CrawlOptions::default()
        };
        let run = audit(&server, options, "Pages", |_| {
            Arc::new(PagesChecker) as Arc<dyn Checker>
        })
        .await;

        // /b sits at depth 2: registered, never fetched, not watched
        let b = Url::parse(&format!("{}/b", server.uri())).unwrap();
        assert_eq!(
            status_of(&run.crawler, &server, "/b"),
            Some(AssetStatus::Unprocessed)
        );
        assert!(!run.plugin.is_watching(&b));
        assert_eq!(run.plugin.done(), 3);
    }

    #[tokio::test]
    async fn test_run_detaches_plugins() {
        let server = site().await;
        let options = CrawlOptions {
            max_depth: 1,
            ..CrawlOptions::default()
        };
        let run = audit(&server, options, "Links", links_checker).await;

        // Listener tasks wind down after run() releases them
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(lock(&run.crawler.plugins).is_empty());
        assert_eq!(Arc::strong_count(&run.plugin), 1);
    }
}
