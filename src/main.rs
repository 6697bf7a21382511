// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap, set up logging
// 2. Merge the config file (if any) with CLI flags
// 3. Build the crawler and one plugin per enabled check, and wire them up
// 4. Run the crawl until every plugin has settled
// 5. Print the status lines and the issues (table or JSON)
// 6. Exit with proper code (0 = clean, 1 = issues found, 2 = error)
//
// Rust concepts used:
// - async/await: the crawl and the checks run as many concurrent tasks
// - Arc<dyn Trait>: the crawler is handed to plugins as an AssetManager
// - broadcast channels: we subscribe to each plugin's progress events
// =============================================================================

// Module declarations - tells Rust about our other source files
mod asset;   // src/asset/ - assets and the AssetManager interface
mod checker; // src/checker/ - the Links and Pages checks
mod cli;     // src/cli.rs - command-line parsing
mod config;  // src/config.rs - TOML config file
mod crawl;   // src/crawl/ - website crawling logic
mod error;   // src/error.rs - library error type
mod issues;  // src/issues.rs - what checks report
mod logging; // src/logging.rs - tracing setup
mod plugin;  // src/plugin/ - queue, dispatcher, gate, progress, render

use clap::Parser; // Parser trait enables the parse() method
use cli::{CheckName, Cli, Commands, SiteArgs};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

// anyhow::Result is like std::result::Result but simpler for applications
// It lets us return any error type with the ? operator
use anyhow::Result;

use asset::AssetManager;
use checker::{LinksChecker, PagesChecker};
use config::AuditConfig;
use crawl::SiteCrawler;
use issues::{Issue, IssueStore};
use plugin::{Checker, HostContext, Plugin, PluginEvent, Progress};

// The #[tokio::main] attribute transforms our async main into a real main function
// It creates a tokio runtime and runs our async code inside it
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // If an unexpected error occurred, print it and exit with code 2
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = no issues
//   Ok(1) = at least one check reported an issue
//   Err   = we couldn't run the audit at all (exit code 2)
async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Site(args) => handle_site_scan(args).await,
    }
}

async fn handle_site_scan(args: SiteArgs) -> Result<i32> {
    let config = AuditConfig::resolve(&args)?;
    debug!(?config, "effective config");

    let crawler = SiteCrawler::new(&args.website_url, config.crawl_options())?;
    let issues = Arc::new(IssueStore::new());
    let plugins = build_plugins(&config, &crawler)?;

    let host = HostContext {
        assets: Some(crawler.clone() as Arc<dyn AssetManager>),
        issues: Arc::clone(&issues),
    };
    for plugin in &plugins {
        plugin.setup(host.clone());
        crawler.attach(Arc::clone(plugin));
    }
    let listeners: Vec<JoinHandle<()>> = plugins.iter().map(|p| log_events(p)).collect();

    if !args.json {
        println!("🔍 Auditing website: {}", crawler.root());
        println!("📊 Max crawl depth: {}\n", config.max_depth);
    }

    crawler.run().await?;

    for listener in listeners {
        listener.abort();
    }

    let issues = issues.all();
    if args.json {
        print_json(&plugins, &issues)?;
    } else {
        for plugin in &plugins {
            println!("{}", plugin.status_line());
        }
        println!();
        print_table(&issues);
    }

    if issues.is_empty() {
        Ok(0)
    } else {
        Ok(1)
    }
}

// One plugin per enabled check, in a fixed order
fn build_plugins(config: &AuditConfig, crawler: &SiteCrawler) -> Result<Vec<Arc<Plugin>>> {
    let mut plugins = Vec::new();

    for name in [CheckName::Links, CheckName::Pages] {
        if !config.check(name).enabled {
            continue;
        }
        let checker: Arc<dyn Checker> = match name {
            CheckName::Links => {
                let client = checker::build_client(config.timeout())?;
                Arc::new(LinksChecker::new(crawler.root(), client))
            }
            CheckName::Pages => Arc::new(PagesChecker),
        };
        plugins.push(Plugin::new(config.plugin_config(name), checker)?);
    }

    Ok(plugins)
}

// Mirror a plugin's events into the log until the task is aborted
fn log_events(source: &Plugin) -> JoinHandle<()> {
    let mut events = source.subscribe();
    let title = source.title().to_string();
    let label = source.check_label().to_string();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PluginEvent::Progress(progress)) => {
                    debug!("{}", plugin::status_line(&title, &label, &progress));
                }
                Ok(PluginEvent::Idle(progress)) => {
                    info!(plugin = %title, done = progress.done, failed = progress.failed, "plugin idle");
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(plugin = %title, missed, "progress events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[derive(Serialize)]
struct JsonReport<'a> {
    checks: Vec<JsonCheck>,
    issues: &'a [Issue],
}

#[derive(Serialize)]
struct JsonCheck {
    title: String,
    #[serde(flatten)]
    progress: Progress,
}

fn print_json(plugins: &[Arc<Plugin>], issues: &[Issue]) -> Result<()> {
    let report = JsonReport {
        checks: plugins
            .iter()
            .map(|plugin| JsonCheck {
                title: plugin.title().to_string(),
                progress: plugin.progress(),
            })
            .collect(),
        issues,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// Prints issues as a human-readable table in the terminal
fn print_table(issues: &[Issue]) {
    if issues.is_empty() {
        println!("✅ No issues found");
        return;
    }

    println!("{:<10} {:<60} {:<40}", "CHECK", "URL", "MESSAGE");
    println!("{}", "=".repeat(110));

    for issue in issues {
        println!(
            "{:<10} {:<60} {:<40}",
            issue.check,
            truncate(&issue.url, 57),
            issue.message
        );
        if let Some(page) = &issue.page {
            println!("{:<10} {:<60}", "", format!("  on {}", truncate(page, 54)));
        }
    }

    println!();
    println!("📊 Summary: {} issue(s)", issues.len());
}

// Truncate URL if too long for display (counting chars, not bytes)
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
