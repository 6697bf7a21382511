// src/config.rs
// =============================================================================
// The optional TOML config file, and how CLI flags override it.
//
// Example file:
//
//   max_depth = 3
//   concurrency = 16
//   timeout_secs = 5
//   exclude = ["/private", "/drafts"]
//
//   [checks.links]
//   enabled = true
//   title = "Links"
//
//   [checks.pages]
//   enabled = false
//
// Every field has a default, so an empty file (or no file) is valid.
// =============================================================================

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cli::{CheckName, SiteArgs};
use crate::crawl::CrawlOptions;
use crate::error::AuditError;
use crate::plugin::{PluginConfig, DEFAULT_CONCURRENCY};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub max_depth: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub exclude: Vec<String>,
    pub checks: ChecksConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: 10,
            exclude: Vec::new(),
            checks: ChecksConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    pub links: CheckConfig,
    pub pages: CheckConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    pub enabled: bool,
    /// Overrides the check's built-in title (max 10 characters)
    pub title: Option<String>,
    /// Overrides what the status line calls the checked units
    pub check_label: Option<String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title: None,
            check_label: None,
        }
    }
}

/// Read and parse a config file. Does not validate it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AuditConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: AuditConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

impl AuditConfig {
    /// Build the effective config: the file (if any), then CLI overrides.
    pub fn resolve(args: &SiteArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => load_from_path(path)?,
            None => AuditConfig::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &SiteArgs) {
        if let Some(depth) = args.max_depth {
            self.max_depth = depth;
        }
        if let Some(concurrency) = args.concurrency {
            self.concurrency = concurrency;
        }
        self.exclude.extend(args.exclude.iter().cloned());
        if let Some(only) = args.only {
            self.checks.links.enabled = only == CheckName::Links;
            self.checks.pages.enabled = only == CheckName::Pages;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), AuditError> {
        if self.max_depth == 0 {
            return Err(AuditError::Config("max_depth must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(AuditError::Config("concurrency must be at least 1".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(AuditError::Config("timeout_secs must be at least 1".to_string()));
        }
        if !self.checks.links.enabled && !self.checks.pages.enabled {
            return Err(AuditError::Config("every check is disabled".to_string()));
        }
        Ok(())
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_depth: self.max_depth,
            exclude: self.exclude.clone(),
            timeout: self.timeout(),
            // Only the Links check targets other pages, so without it
            // nothing would grow the crawl past the root
            follow_all: !self.checks.links.enabled,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn check(&self, name: CheckName) -> &CheckConfig {
        match name {
            CheckName::Links => &self.checks.links,
            CheckName::Pages => &self.checks.pages,
        }
    }

    /// Plugin settings for one check, with that check's built-in defaults.
    pub fn plugin_config(&self, name: CheckName) -> PluginConfig {
        let (title, label) = match name {
            CheckName::Links => ("Links", "links"),
            CheckName::Pages => ("Pages", "pages"),
        };
        let check = self.check(name);
        PluginConfig {
            title: check.title.clone().unwrap_or_else(|| title.to_string()),
            check_label: check.check_label.clone().unwrap_or_else(|| label.to_string()),
            concurrency: self.concurrency,
        }
    }
}
