use crate::report::{render_json_report, render_text_report};
use anyhow::{Context, Result, bail};
use catalink_core::config::{ConfigSource, Settings};
use catalink_core::monitor::crawler_for;
use catalink_core::supervisor::initial_crawl_timestamp;
use catalink_core::{CrawlSupervisor, notifier_for};
use catalink_scanner::Whitelist;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

// Helper functions for endpoint loading

/// Load endpoints from a hosts file, or from the `--endpoint` arguments.
///
/// With `required` set, an empty result is an error.
pub fn load_endpoints_from_source(
    endpoints: &[Url],
    hosts_file: Option<&PathBuf>,
    required: bool,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_endpoints_from_file(hosts_file_path)
    } else if !endpoints.is_empty() {
        Ok(endpoints.iter().map(|u| u.as_str().to_string()).collect())
    } else if required {
        Err("Either --endpoint or --hosts-file must be provided".to_string())
    } else {
        Ok(Vec::new())
    }
}

/// Load and parse endpoints from a file. Blank lines and `#` comments are skipped.
pub fn load_endpoints_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let endpoints: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_endpoint_line)
        .collect();

    if endpoints.is_empty() {
        return Err(format!("No valid endpoints found in {}", path.display()));
    }

    Ok(endpoints)
}

/// Parse a single line as an endpoint URL, adding http:// if it has no scheme
pub fn parse_endpoint_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // Something like "host:8080" parses as scheme "host"; only trust real ones.
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|u| u.has_host()) {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid endpoint '{}'", "⚠".yellow(), line);
    None
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Read the whitelist, preferring the command line path over the config.
pub fn load_whitelist(override_path: Option<&String>, settings: &Settings) -> Result<Whitelist> {
    let path = match override_path {
        Some(p) => expand_path(p),
        None => settings.whitelist_path.clone(),
    };
    let whitelist = Whitelist::load(&path)
        .with_context(|| format!("Failed to read whitelist {}", path.display()))?;
    if whitelist.is_empty() {
        warn!("Whitelist {} is empty; references will not be followed", path.display());
    }
    Ok(whitelist)
}

fn config_path(args: &ArgMatches) -> PathBuf {
    let raw = args
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("./config.ini");
    expand_path(raw)
}

fn endpoint_args(args: &ArgMatches) -> Vec<Url> {
    args.get_many::<Url>("endpoint")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

pub fn print_banner() {
    println!(
        "{} {}",
        "catalink".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("{}", "federated catalog crawler".dimmed());
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub async fn handle_run(args: &ArgMatches) -> Result<()> {
    let path = config_path(args);
    let config = ConfigSource::load(path.clone())
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let settings = config.current();

    let whitelist = load_whitelist(args.get_one::<String>("whitelist"), &settings)?;
    let seeds = load_endpoints_from_source(
        &endpoint_args(args),
        args.get_one::<PathBuf>("hosts-file"),
        false,
    )
    .map_err(anyhow::Error::msg)?;

    let notifier = notifier_for(&settings);
    match &settings.nats_url {
        Some(url) => info!("Publishing notifications to {}", url),
        None => info!("NATS_URL not set; notifications are logged only"),
    }

    print_divider();
    println!("  Whitelisted domains: {}", whitelist.len());
    println!("  Monitor interval:    {:?}", settings.monitor_interval);
    println!("  Crawling interval:   {:?}", settings.crawling_interval);
    println!("  Graph store:         {}", settings.graphdb_insert_url);
    print_divider();

    let mut supervisor = CrawlSupervisor::new(Arc::new(whitelist), notifier, config.subscribe());
    supervisor.start();
    if !seeds.is_empty() {
        let added = supervisor.endpoints().combine(seeds);
        info!("Submitted {} seed endpoint(s)", added);
    }

    wait_for_shutdown(&config).await?;
    supervisor.shutdown().await;
    println!("\n{} Crawling stopped", "✓".green());
    Ok(())
}

/// Block until Ctrl-C. On unix, SIGHUP reloads the config file meanwhile.
#[cfg(unix)]
async fn wait_for_shutdown(config: &ConfigSource) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C");
                return Ok(());
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading settings");
                // A failed reload is logged and keeps the previous settings.
                let _ = config.reload();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_config: &ConfigSource) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C");
    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let endpoints = load_endpoints_from_source(
        &endpoint_args(args),
        args.get_one::<PathBuf>("hosts-file"),
        true,
    )
    .map_err(anyhow::Error::msg)?;

    let path = config_path(args);
    let settings = Settings::load(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let whitelist = Arc::new(load_whitelist(args.get_one::<String>("whitelist"), &settings)?);
    let crawler = crawler_for(&settings, Arc::clone(&whitelist))?;

    let format = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let output = args.get_one::<PathBuf>("output");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Crawling {} endpoint(s), {} whitelisted domain(s)",
        endpoints.len(),
        whitelist.len()
    ));

    let result = crawler.run_pass(&endpoints, initial_crawl_timestamp()).await;
    spinner.finish_and_clear();
    let pass = result.context("Crawl pass aborted")?;

    let report = match format {
        "json" => render_json_report(&pass)?,
        "text" => render_text_report(&pass),
        other => bail!("Unsupported report format: {}", other),
    };

    match output {
        Some(path) => write_report(path, &report)?,
        None => print!("{}", report),
    }
    Ok(())
}

fn write_report(path: &Path, report: &str) -> Result<()> {
    fs::write(path, report).with_context(|| format!("Failed to write report to {}", path.display()))?;
    println!("{} Report saved to {}", "✓".green(), path.display());
    Ok(())
}
