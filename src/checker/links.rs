// src/checker/links.rs
// =============================================================================
// The Links check: every link on every crawled page must work.
//
// - add_to_queue(): one work item per unique link on the page
// - is_local_url(): a link is local when it points at the crawl root's host,
//   so the engine asks the crawler to follow it
// - check(): HTTP request through checker::http, reporting anything that
//   isn't OK (and hrefs that aren't valid URLs at all)
//
// The same URL usually appears on many pages (navigation bars!), so results
// are cached per URL and each one is requested only once.
// =============================================================================

use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::debug;
use url::Url;

use super::http::{check_link, LinkCheckResult};
use crate::asset::Asset;
use crate::issues::Issue;
use crate::plugin::{CheckContext, Checker, Helpers, LinkRef, WorkItem};

pub struct LinksChecker {
    root_host: Option<String>,
    client: Client,
    cache: Mutex<HashMap<Url, LinkCheckResult>>,
}

impl LinksChecker {
    pub fn new(root: &Url, client: Client) -> Self {
        Self {
            root_host: root.host_str().map(str::to_string),
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn lookup(&self, url: &Url) -> LinkCheckResult {
        if let Some(hit) = self.cached(url) {
            return hit;
        }
        // Two pages may race to check the same URL; both requests are
        // harmless and the second insert just overwrites the first
        let result = check_link(&self.client, url).await;
        self.cache_lock().insert(url.clone(), result.clone());
        result
    }

    fn cached(&self, url: &Url) -> Option<LinkCheckResult> {
        self.cache_lock().get(url).cloned()
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<Url, LinkCheckResult>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Checker for LinksChecker {
    async fn add_to_queue(&self, asset: Arc<Asset>, _helpers: &Helpers) -> Vec<WorkItem> {
        let page = asset.page();
        let mut seen = HashSet::new();

        page.links
            .into_iter()
            .filter(|link| {
                let key = match &link.url {
                    Some(url) => url.to_string(),
                    None => link.href.clone(),
                };
                seen.insert(key)
            })
            .map(|link| {
                WorkItem::Link(LinkRef {
                    href: link.href,
                    url: link.url,
                    source: asset.url().clone(),
                })
            })
            .collect()
    }

    async fn check(&self, ctx: &CheckContext) {
        let WorkItem::Link(link) = ctx.item() else {
            return;
        };

        let Some(url) = &link.url else {
            ctx.report(
                Issue::new(link.href.clone(), "malformed link").on_page(link.source.to_string()),
            );
            return;
        };

        let result = self.lookup(url).await;
        debug!(url = %url, status = ?result.status, "link checked");
        if !result.is_ok() {
            let message = result
                .message
                .unwrap_or_else(|| format!("{:?}", result.status));
            ctx.report(Issue::new(url.to_string(), message).on_page(link.source.to_string()));
        }
    }

    fn is_local_url(&self, url: &Url) -> bool {
        url.host_str().is_some() && url.host_str() == self.root_host.as_deref()
    }
}
