//! Search pipeline orchestration: planning, collection, aggregation and the
//! CSV report.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::{QuoteStyle, WriterBuilder};
use dejobs_core::{JobQuery, JobRecord, Site};
use dejobs_providers::{
    FixtureSearchProvider, JobSearchProvider, ProviderError, SearchRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "dejobs-pipeline";

const PREVIEW_ROWS: usize = 5;

/// The standing search: which terms to run, where, and how far back.
/// Plan files only need to name the fields they change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchPlan {
    pub search_terms: Vec<String>,
    pub sites: Vec<Site>,
    pub priority_location: String,
    pub priority_location_name: String,
    pub general_location: String,
    pub results_wanted: usize,
    pub hours_old: u32,
    pub country: String,
}

impl Default for SearchPlan {
    fn default() -> Self {
        Self {
            search_terms: [
                "Software Engineer",
                "Software Developer",
                "DevOps Engineer",
                "Site Reliability Engineer",
                "System Engineer",
                "Backend Developer",
                "Full Stack Developer",
                "Python Developer",
                "Java Developer",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            sites: vec![Site::Indeed, Site::Linkedin, Site::Google],
            priority_location: "Berlin, Germany".to_string(),
            priority_location_name: "Berlin".to_string(),
            general_location: "Germany".to_string(),
            results_wanted: 20,
            hours_old: 168,
            country: "Germany".to_string(),
        }
    }
}

impl SearchPlan {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub output_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub plan_path: PathBuf,
}

impl SearchConfig {
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("DEJOBS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("jobs")),
            fixtures_dir: std::env::var("DEJOBS_FIXTURES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("fixtures")),
            plan_path: std::env::var("DEJOBS_PLAN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("searches.yaml")),
        }
    }

    pub fn load_plan(&self) -> Result<SearchPlan> {
        if self.plan_path.exists() {
            SearchPlan::from_yaml_file(&self.plan_path)
        } else {
            Ok(SearchPlan::default())
        }
    }
}

/// Every term at the priority location first, then every term at the general
/// location, both in plan order.
pub fn plan_queries(plan: &SearchPlan) -> Vec<JobQuery> {
    let mut queries = Vec::with_capacity(plan.search_terms.len() * 2);
    for term in &plan.search_terms {
        queries.push(JobQuery {
            search_term: term.clone(),
            location: plan.priority_location.clone(),
            is_priority_location: true,
        });
    }
    for term in &plan.search_terms {
        queries.push(JobQuery {
            search_term: term.clone(),
            location: plan.general_location.clone(),
            is_priority_location: false,
        });
    }
    queries
}

#[derive(Debug)]
pub enum QueryOutcome {
    Found(Vec<JobRecord>),
    Empty,
    Failed(ProviderError),
}

pub async fn classify_search(
    provider: &dyn JobSearchProvider,
    request: &SearchRequest,
) -> QueryOutcome {
    match provider.search(request).await {
        Ok(rows) if rows.is_empty() => QueryOutcome::Empty,
        Ok(rows) => QueryOutcome::Found(rows),
        Err(err) => QueryOutcome::Failed(err),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollectStats {
    pub with_results: usize,
    pub empty: usize,
    pub failed: usize,
}

/// The rows one query produced, kept in collection order.
#[derive(Debug, Clone)]
pub struct CollectedSet {
    pub query: JobQuery,
    pub rows: Vec<JobRecord>,
}

/// Merges the collected result sets: duplicate application links are dropped
/// keeping the first row seen, then rows are ordered priority-location first
/// and newest posting date first within each group. Ties keep collection
/// order.
pub fn aggregate(priority_name: &str, sets: Vec<CollectedSet>) -> Vec<JobRecord> {
    let mut rows: Vec<JobRecord> = sets.into_iter().flat_map(|set| set.rows).collect();
    drop_duplicate_links(&mut rows);

    let mut flagged: Vec<(bool, JobRecord)> = rows
        .into_iter()
        .map(|row| (row.location_mentions(priority_name), row))
        .collect();
    flagged.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| cmp_dates_desc(a.1.date_posted, b.1.date_posted))
    });
    flagged.into_iter().map(|(_, row)| row).collect()
}

fn drop_duplicate_links(rows: &mut Vec<JobRecord>) {
    let mut seen = HashSet::new();
    rows.retain(|row| match row.application_link() {
        Some(link) => seen.insert(link.to_string()),
        None => true,
    });
}

fn cmp_dates_desc(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputColumn {
    JobTitle,
    ApplicationLink,
    Company,
    Platform,
}

impl OutputColumn {
    pub const ALL: [OutputColumn; 4] = [
        OutputColumn::JobTitle,
        OutputColumn::ApplicationLink,
        OutputColumn::Company,
        OutputColumn::Platform,
    ];

    pub fn header(self) -> &'static str {
        match self {
            OutputColumn::JobTitle => "Job Title",
            OutputColumn::ApplicationLink => "Job Application Link",
            OutputColumn::Company => "Company",
            OutputColumn::Platform => "Platform",
        }
    }

    pub fn value(self, row: &JobRecord) -> Option<&str> {
        match self {
            OutputColumn::JobTitle => row.title.as_deref(),
            OutputColumn::ApplicationLink => row.application_link(),
            OutputColumn::Company => row.company.as_deref(),
            OutputColumn::Platform => row.site.as_deref(),
        }
    }
}

/// A column makes the report only when at least one row carries a value for
/// it. Order follows `OutputColumn::ALL`.
pub fn available_columns(rows: &[JobRecord]) -> Vec<OutputColumn> {
    OutputColumn::ALL
        .into_iter()
        .filter(|column| rows.iter().any(|row| column.value(row).is_some()))
        .collect()
}

pub fn report_file_name(stamp: DateTime<Utc>) -> String {
    format!("germany_it_jobs_{}.csv", stamp.format("%Y%m%d_%H%M%S"))
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<OutputColumn>,
    pub preview: String,
}

impl WrittenReport {
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.header())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Writes the CSV under `output_dir`, quoting every non-numeric field and
/// escaping embedded quotes with a backslash. Returns `None` without touching
/// the filesystem when no output column has a value in any row.
pub fn write_report(
    output_dir: &Path,
    stamp: DateTime<Utc>,
    rows: &[JobRecord],
) -> Result<Option<WrittenReport>> {
    let columns = available_columns(rows);
    if columns.is_empty() {
        warn!("no output column has a value in any row; skipping the csv");
        return Ok(None);
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(report_file_name(stamp));
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .double_quote(false)
        .escape(b'\\')
        .from_path(&path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(columns.iter().map(|column| column.header()))
        .with_context(|| format!("writing header to {}", path.display()))?;
    for row in rows {
        writer
            .write_record(
                columns
                    .iter()
                    .map(|column| column.value(row).unwrap_or_default()),
            )
            .with_context(|| format!("writing row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;

    Ok(Some(WrittenReport {
        path,
        rows: rows.len(),
        columns,
        preview: render_preview(rows, PREVIEW_ROWS),
    }))
}

const PREVIEW_COLUMNS: [&str; 6] = [
    "title",
    "company",
    "location",
    "job_type",
    "site",
    "date_posted",
];

fn preview_value(row: &JobRecord, column: &str) -> Option<String> {
    match column {
        "title" => row.title.clone(),
        "company" => row.company.clone(),
        "location" => row.location.clone(),
        "job_type" => row.job_type.clone(),
        "site" => row.site.clone(),
        "date_posted" => row.date_posted.map(|d| d.to_string()),
        _ => None,
    }
}

/// Space-aligned table of the first `limit` rows over the preview columns
/// populated somewhere in `rows`. Empty when nothing is populated.
pub fn render_preview(rows: &[JobRecord], limit: usize) -> String {
    let columns: Vec<&str> = PREVIEW_COLUMNS
        .into_iter()
        .filter(|column| rows.iter().any(|row| preview_value(row, column).is_some()))
        .collect();
    if columns.is_empty() {
        return String::new();
    }

    let shown = &rows[..rows.len().min(limit)];
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    let mut body: Vec<Vec<String>> = Vec::with_capacity(shown.len());
    for row in shown {
        let mut cells = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let cell = preview_value(row, column).unwrap_or_default();
            widths[i] = widths[i].max(cell.chars().count());
            cells.push(cell);
        }
        body.push(cells);
    }

    let mut lines = Vec::with_capacity(body.len() + 1);
    let header = columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{:<width$}", column, width = widths[i]))
        .collect::<Vec<_>>()
        .join("  ");
    lines.push(header.trim_end().to_string());
    for cells in body {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

#[derive(Debug, Serialize)]
pub enum RunOutcome {
    Report(WrittenReport),
    NoJobsFound,
    NoExpectedColumns,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub queries_total: usize,
    pub queries_with_results: usize,
    pub queries_empty: usize,
    pub queries_failed: usize,
    pub rows_collected: usize,
    pub outcome: RunOutcome,
}

pub struct SearchPipeline {
    config: SearchConfig,
    plan: SearchPlan,
    provider: Box<dyn JobSearchProvider>,
}

impl SearchPipeline {
    pub fn new(
        config: SearchConfig,
        plan: SearchPlan,
        provider: Box<dyn JobSearchProvider>,
    ) -> Self {
        Self {
            config,
            plan,
            provider,
        }
    }

    pub async fn run_once(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let queries = plan_queries(&self.plan);
        info!(
            %run_id,
            terms = self.plan.search_terms.len(),
            queries = queries.len(),
            hours_old = self.plan.hours_old,
            "starting job search run"
        );

        let (sets, stats) = self.collect(&queries).await;
        let rows_collected: usize = sets.iter().map(|set| set.rows.len()).sum();
        let rows = aggregate(&self.plan.priority_location_name, sets);

        let outcome = if rows.is_empty() {
            info!("no jobs matched the search criteria");
            RunOutcome::NoJobsFound
        } else {
            match write_report(&self.config.output_dir, started_at, &rows)? {
                Some(report) => RunOutcome::Report(report),
                None => RunOutcome::NoExpectedColumns,
            }
        };

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            queries_total: queries.len(),
            queries_with_results: stats.with_results,
            queries_empty: stats.empty,
            queries_failed: stats.failed,
            rows_collected,
            outcome,
        })
    }

    fn request_for(&self, query: &JobQuery) -> SearchRequest {
        SearchRequest {
            sites: self.plan.sites.clone(),
            search_term: query.search_term.clone(),
            location: query.location.clone(),
            results_wanted: self.plan.results_wanted,
            hours_old: self.plan.hours_old,
            country_hint: self.plan.country.clone(),
        }
    }

    /// One attempt per query, in plan order. A failed query is logged and
    /// skipped; it never aborts the run.
    async fn collect(&self, queries: &[JobQuery]) -> (Vec<CollectedSet>, CollectStats) {
        let mut sets = Vec::new();
        let mut stats = CollectStats::default();
        for query in queries {
            let request = self.request_for(query);
            match classify_search(self.provider.as_ref(), &request).await {
                QueryOutcome::Found(rows) => {
                    info!(
                        term = %query.search_term,
                        location = %query.location,
                        rows = rows.len(),
                        "query returned rows"
                    );
                    stats.with_results += 1;
                    sets.push(CollectedSet {
                        query: query.clone(),
                        rows,
                    });
                }
                QueryOutcome::Empty => {
                    info!(
                        term = %query.search_term,
                        location = %query.location,
                        "query returned no rows"
                    );
                    stats.empty += 1;
                }
                QueryOutcome::Failed(err) => {
                    warn!(
                        term = %query.search_term,
                        location = %query.location,
                        error = %err,
                        "query failed; continuing with the next one"
                    );
                    stats.failed += 1;
                }
            }
        }
        (sets, stats)
    }
}

pub async fn run_search_once_from_env() -> Result<RunSummary> {
    let config = SearchConfig::from_env();
    let plan = config.load_plan()?;
    let provider = FixtureSearchProvider::new(config.fixtures_dir.clone());
    let pipeline = SearchPipeline::new(config, plan, Box::new(provider));
    pipeline.run_once().await
}
