use anyhow::Result;
use catalink_scanner::{CrawlPass, DomainOutcome};
use colored::Colorize;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Short label for an outcome, colored by severity.
pub fn outcome_label(outcome: &DomainOutcome) -> String {
    match outcome {
        DomainOutcome::Ingested { triples, failed: 0 } => {
            format!("ingested {} triple(s)", triples).green().to_string()
        }
        DomainOutcome::Ingested { triples, failed } => {
            format!("ingested {} triple(s), {} failed", triples, failed)
                .yellow()
                .to_string()
        }
        DomainOutcome::Empty => "no data".dimmed().to_string(),
        DomainOutcome::Unchanged => "unchanged since last crawl".cyan().to_string(),
        DomainOutcome::Pending => "aborted".red().to_string(),
        DomainOutcome::NoMetadataApi => "no metadata API (404)".yellow().to_string(),
        DomainOutcome::CatalogError { status } => {
            format!("catalog error ({})", status).red().to_string()
        }
        DomainOutcome::Unreachable { reason } => format!("unreachable: {}", reason).red().to_string(),
        DomainOutcome::MalformedResponse { reason } => {
            format!("malformed response: {}", reason).red().to_string()
        }
    }
}

/// Human-readable pass report, domains in visit order.
pub fn render_text_report(pass: &CrawlPass) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n# Summary:\n");
    report.push_str(&format!("  Domains visited: {}\n", pass.len()));
    report.push_str(&format!("  Triples fetched: {}\n", pass.triples_fetched));
    report.push_str(&format!("  Triples inserted: {}\n", pass.triples_inserted));
    if pass.insert_failures > 0 {
        report.push_str(&format!(
            "  Insert failures: {}\n",
            pass.insert_failures.to_string().red()
        ));
    }
    report.push_str(&format!("  Elapsed: {:.2?}\n", pass.elapsed));
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");

    for (position, domain_report) in pass.reports().iter().enumerate() {
        report.push_str(&format!(
            "  {:>3}. {}  {}\n",
            position + 1,
            domain_report.domain.as_str().bold(),
            outcome_label(&domain_report.outcome)
        ));
        report.push_str(&format!("       {}\n", domain_report.endpoint.dimmed()));
    }
    report.push('\n');

    report
}

pub fn render_json_report(pass: &CrawlPass) -> Result<String> {
    let mut json = serde_json::to_string_pretty(pass)?;
    json.push('\n');
    Ok(json)
}
