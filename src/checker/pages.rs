// src/checker/pages.rs
// =============================================================================
// The Pages check: every crawled page should load and have a <title>.
//
// This check keeps the default add_to_queue(), so each parsed page is its
// own work item, and it never makes requests of its own: the crawler already
// fetched the page, and the result is stored on the asset.
// =============================================================================

use async_trait::async_trait;

use crate::issues::Issue;
use crate::plugin::{CheckContext, Checker, WorkItem};

pub struct PagesChecker;

#[async_trait]
impl Checker for PagesChecker {
    async fn check(&self, ctx: &CheckContext) {
        let WorkItem::Page(asset) = ctx.item() else {
            return;
        };
        let page = asset.page();
        let url = asset.url().to_string();

        if let Some(error) = page.error {
            ctx.report(Issue::new(url, format!("page could not be loaded: {}", error)));
            return;
        }

        if page.title.is_none() {
            ctx.report(Issue::new(url, "page has no <title>"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, AssetConfig, AssetKind, PageData};
    use crate::issues::IssueStore;
    use std::sync::Arc;
    use url::Url;

    async fn run(data: PageData) -> Vec<Issue> {
        let asset = Arc::new(Asset::new(
            Url::parse("https://example.com/").unwrap(),
            AssetKind::Page,
            0,
            AssetConfig::default(),
        ));
        asset.set_page(data);

        let issues = Arc::new(IssueStore::new());
        let ctx = CheckContext::new(
            WorkItem::Page(asset),
            "Pages",
            Arc::clone(&issues),
            None,
            Arc::new(PagesChecker),
        );
        PagesChecker.check(&ctx).await;
        issues.all()
    }

    #[tokio::test]
    async fn test_healthy_page_has_no_issues() {
        let issues = run(PageData {
            http_status: Some(200),
            title: Some("Home".to_string()),
            ..PageData::default()
        })
        .await;
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_reported_once() {
        let issues = run(PageData {
            http_status: Some(500),
            error: Some("HTTP 500".to_string()),
            ..PageData::default()
        })
        .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "page could not be loaded: HTTP 500");
    }

    #[tokio::test]
    async fn test_missing_title_is_reported() {
        let issues = run(PageData {
            http_status: Some(200),
            ..PageData::default()
        })
        .await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "page has no <title>");
    }
}
