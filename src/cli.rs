// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
// Every crawl setting is an Option here: None means "use the config file
// value (or its default)", so flags only override what was actually passed.
// =============================================================================

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-auditor",
    version = "0.1.0",
    about = "Crawl a website and run checks against every page it finds",
    long_about = "site-auditor crawls a website breadth-first and runs a set of checks \
                  (broken links, pages that fail to load or lack a title) against every \
                  page it discovers. It exits with 1 when any check reports an issue, \
                  which makes it easy to use in CI."
)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    ///
    /// If omitted, the AUDIT_LOG environment variable or `warn` is used.
    #[arg(long, value_enum, global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a website and audit every page
    ///
    /// Example: site-auditor site https://example.com --max-depth 3
    Site(SiteArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct SiteArgs {
    /// Website URL to start from (e.g., https://example.com)
    pub website_url: String,

    /// Output issues as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Maximum crawl depth (1 = just the starting page)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// How many work items each check runs at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Mark URLs containing this text as skipped (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Run only this check
    #[arg(long, value_enum)]
    pub only: Option<CheckName>,

    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// The checks that ship with the tool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CheckName {
    Links,
    Pages,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
