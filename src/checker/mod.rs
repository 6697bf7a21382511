// src/checker/mod.rs
// =============================================================================
// The concrete checks this tool ships with.
//
// Submodules:
// - http: asks a URL whether it is alive (used by the Links check)
// - links: Links check, one work item per link found on a page
// - pages: Pages check, one work item per page
//
// Each check implements plugin::Checker; main.rs wraps each one in a Plugin.
// =============================================================================

mod http;
mod links;
mod pages;

pub use http::build_client;
pub use links::LinksChecker;
pub use pages::PagesChecker;

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why is the trait in plugin/ and the checks in checker/?
//    - plugin/ is the engine, it only knows the Checker interface
//    - checker/ is the list of things we check
//    - Adding a new check means adding a file here, the engine stays the same
//
// 2. What does 'pub use' do here?
//    - Callers write checker::LinksChecker instead of checker::links::LinksChecker
//    - http stays mostly private: only build_client is needed outside
// -----------------------------------------------------------------------------
