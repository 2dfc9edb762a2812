use anyhow::Result;
use clap::{Parser, Subcommand};
use dejobs_pipeline::{plan_queries, RunOutcome, RunSummary, SearchConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dejobs-cli")]
#[command(about = "Germany IT job search command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full search and write the CSV report.
    Search,
    /// Print the planned queries without searching.
    Plan,
}

// The search is a best-effort batch job: failures are logged and the process
// still exits 0.
#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Search) {
        Commands::Search => match dejobs_pipeline::run_search_once_from_env().await {
            Ok(summary) => print_search_summary(&summary),
            Err(err) => error!("search run failed: {err:#}"),
        },
        Commands::Plan => match plan_preview() {
            Ok(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            Err(err) => error!("planning failed: {err:#}"),
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_search_summary(summary: &RunSummary) {
    match &summary.outcome {
        RunOutcome::Report(report) => {
            println!("Total jobs found: {}", report.rows);
            println!("Results saved to: {}", report.path.display());
            println!("Columns saved: {}", report.column_list());
            println!();
            println!("Sample of results (first 5 jobs):");
            println!("{}", report.preview);
        }
        RunOutcome::NoJobsFound => {
            println!("No jobs found matching the search criteria.");
        }
        RunOutcome::NoExpectedColumns => {
            println!("No expected columns found; CSV not created.");
        }
    }
    println!();
    println!(
        "search complete: run_id={} queries={} with_results={} empty={} failed={}",
        summary.run_id,
        summary.queries_total,
        summary.queries_with_results,
        summary.queries_empty,
        summary.queries_failed
    );
}

fn plan_preview() -> Result<Vec<String>> {
    let config = SearchConfig::from_env();
    let plan = config.load_plan()?;
    let queries = plan_queries(&plan);

    let mut lines = Vec::with_capacity(queries.len() + 1);
    lines.push(format!(
        "{} queries over {} terms (results_wanted={} hours_old={})",
        queries.len(),
        plan.search_terms.len(),
        plan.results_wanted,
        plan.hours_old
    ));
    for (i, query) in queries.iter().enumerate() {
        let marker = if query.is_priority_location {
            "priority"
        } else {
            "general"
        };
        lines.push(format!(
            "{:>3}. [{marker}] {} @ {}",
            i + 1,
            query.search_term,
            query.location
        ));
    }
    Ok(lines)
}
