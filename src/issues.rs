// src/issues.rs
// =============================================================================
// The issue store: where checks put what they find.
//
// An issue is a finding ("this link is broken"), not an error in our own
// program. Plugins hand issues to the store through their check context; the
// CLI reads them all back at the end to print the report.
// =============================================================================

use serde::Serialize;
use std::sync::Mutex;

/// One finding reported by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Title of the plugin that reported it ("Links", "Pages"...)
    pub check: String,
    /// The page the problem was found on, when that differs from `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// The URL the issue is about
    pub url: String,
    pub message: String,
}

impl Issue {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: String::new(),
            page: None,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn on_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }
}

// Append-only store shared (through an Arc) by every plugin.
#[derive(Debug, Default)]
pub struct IssueStore {
    issues: Mutex<Vec<Issue>>,
}

impl IssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, issue: Issue) {
        self.lock().push(issue);
    }

    /// Copy of every issue reported so far, in report order
    pub fn all(&self) -> Vec<Issue> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Issue>> {
        // A panic while holding this lock can only happen mid-push, so the
        // Vec is still usable
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
