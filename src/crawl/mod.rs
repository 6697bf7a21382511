// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - The crawler owns every discovered asset and implements AssetManager
// - Pages are fetched only when someone asks (request_parse), so the crawl
//   grows breadth-first as the checks work through what was found
// - Same-host restriction and a depth limit keep the crawl bounded
//
// Rust concepts:
// - Async programming: fetches run as independent tokio tasks
// - Collections: HashMap registry of assets keyed by URL
// =============================================================================

pub(crate) mod extract;
mod site;

pub use site::{CrawlOptions, SiteCrawler};
