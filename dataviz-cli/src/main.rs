//! dataviz: terminal front end for the DataViz analysis service
//!
//! # Subcommands
//! - `login --token <jwt>` / `logout` / `whoami`  manage the stored session
//! - `list [--json]`                             list the session's analyses
//! - `watch`                                     poll the list until Ctrl+C
//! - `upload <file>`                             submit a dataset
//! - `open <id> [--graph-type T] [--column C] [--json]`  insights and charts
//! - `delete <id> [--yes]`                       delete an analysis
//! - `download <id> [--out-dir DIR]`             save the result archive
//! - `report <id>`                               print the HTML report URL

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dataviz_core::{AnalysisJob, Chart, ColumnOption, DashboardConfig, Insight};
use dataviz_engine::{Dashboard, StatusMessage, ViewState};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "dataviz",
    version,
    about = "Upload datasets and browse analysis insights and charts"
)]
struct Cli {
    #[arg(short, long, env = "DATAVIZ_CONFIG", default_value = "dataviz.toml")]
    config: String,

    /// Analysis service base URL (overrides the config file)
    #[arg(long, env = "DATAVIZ_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store a session token
    Login {
        #[arg(long, env = "DATAVIZ_TOKEN")]
        token: String,
    },

    /// Forget the stored session token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List analyses for the current session
    List {
        #[arg(long)]
        json: bool,
    },

    /// Keep the analysis list refreshed until interrupted
    Watch,

    /// Upload a dataset file (.csv, .xlsx, .xls, .json)
    Upload { file: PathBuf },

    /// Show an analysis with its insights and charts
    Open {
        id: Uuid,

        /// Only show charts of this type
        #[arg(long)]
        graph_type: Option<String>,

        /// Only show charts involving this column
        #[arg(long)]
        column: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Delete an analysis
    Delete {
        id: Uuid,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Download the results archive
    Download {
        id: Uuid,

        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the HTML report URL
    Report { id: Uuid },
}

// ============================================================================
// Output Formatting
// ============================================================================

/// JSON shape printed by `open --json`.
#[derive(Debug, Serialize)]
struct DetailOutput<'a> {
    job: &'a AnalysisJob,
    insights: &'a [Insight],
    charts: Vec<Chart>,
    graph_types: Vec<String>,
    columns: Vec<ColumnOption>,
}

impl<'a> DetailOutput<'a> {
    fn from_view(job: &'a AnalysisJob, state: &'a ViewState) -> Self {
        Self {
            job,
            insights: &state.insights,
            charts: state.visible_charts(),
            graph_types: state.type_options(),
            columns: state.column_options(),
        }
    }
}

fn job_line(job: &AnalysisJob) -> String {
    let shape = match (job.rows_count, job.columns_count) {
        (Some(rows), Some(cols)) => format!("  {} rows x {} cols", rows, cols),
        _ => String::new(),
    };
    format!(
        "{}  {:<10}  {}  {}{}",
        job.id,
        job.status.as_str(),
        job.created_at.format("%Y-%m-%d %H:%M"),
        job.display_name(),
        shape
    )
}

fn insight_block(insight: &Insight) -> String {
    let mut out = format!("## {}", insight.heading());
    if let Some(description) = insight.description.as_deref().filter(|d| !d.is_empty()) {
        out.push('\n');
        out.push_str(description);
    }
    if let Some(metrics) = &insight.metrics {
        for (name, value) in metrics {
            out.push_str(&format!("\n  {}: {}", name, value));
        }
    }
    out
}

fn chart_line(chart: &Chart, image_url: Option<String>) -> String {
    match image_url {
        Some(url) => format!("{}  {}", chart.caption(), url),
        None => chart.caption(),
    }
}

fn print_status(status: Option<StatusMessage>) {
    if let Some(status) = status {
        let marker = if status.is_error() { "error" } else { "ok" };
        eprintln!("[{}] {}", marker, status.message);
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run(dashboard: &mut Dashboard, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { token } => {
            dashboard.session().sign_in(&token).await?;
            match dashboard.session().current_user().await {
                Some(user) => println!("Signed in as user {}", user),
                None => eprintln!("Token stored, but it does not carry a user_id claim"),
            }
        }

        Commands::Logout => {
            dashboard.session().sign_out().await?;
            println!("Signed out");
        }

        Commands::Whoami => match dashboard.session().current_user().await {
            Some(user) => println!("{}", user),
            None => println!("Not signed in"),
        },

        Commands::List { json } => {
            let jobs = dashboard.registry().refresh().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
            } else if jobs.is_empty() {
                eprintln!("No analyses found");
            } else {
                for job in &jobs {
                    println!("{}", job_line(job));
                }
            }
        }

        Commands::Watch => {
            let mut jobs = dashboard.registry().subscribe();
            dashboard.mount();
            loop {
                tokio::select! {
                    changed = jobs.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = jobs.borrow_and_update().clone();
                        println!("--- {} analyses ---", snapshot.len());
                        for job in &snapshot {
                            println!("{}", job_line(job));
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                }
            }
            dashboard.teardown().await;
        }

        Commands::Upload { file } => {
            let result = dashboard.uploads().submit_path(&file).await;
            print_status(dashboard.status().current());
            let job = result?;
            println!("{}", job_line(&job));
        }

        Commands::Open {
            id,
            graph_type,
            column,
            json,
        } => {
            dashboard.detail().open(id).await?;
            let view = dashboard.view();
            view.select_type(graph_type.as_deref());
            if let Some(column) = column.as_deref() {
                view.select_column(column);
            }

            let state = view.snapshot();
            let job = state
                .open_job
                .as_ref()
                .context("analysis was closed before it could be shown")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&DetailOutput::from_view(job, &state))?);
                return Ok(());
            }

            println!("{}\n", job_line(job));
            println!("# Insights ({})", state.insights.len());
            for insight in &state.insights {
                println!("{}\n", insight_block(insight));
            }

            let charts = state.visible_charts();
            println!("# Charts ({} of {})", charts.len(), state.charts.len());
            for chart in &charts {
                let url = chart
                    .image_url
                    .as_deref()
                    .map(|p| dashboard.artifacts().resolve_url(p));
                println!("{}", chart_line(chart, url));
            }
        }

        Commands::Delete { id, yes } => {
            let deletion = dashboard.deletion();
            deletion.prompt_delete(id)?;
            if !yes && !confirm(&format!("Delete analysis {}? [y/N] ", id)).await? {
                deletion.cancel_delete();
                println!("Cancelled");
                return Ok(());
            }
            let result = deletion.confirm_delete().await;
            print_status(dashboard.status().current());
            result?;
        }

        Commands::Download { id, out_dir } => {
            let artifacts = dashboard.artifacts();
            let result = match out_dir {
                Some(dir) => artifacts.download_results_to(id, &dir).await,
                None => artifacts.download_results(id).await,
            };
            print_status(dashboard.status().current());
            println!("{}", result?.display());
        }

        Commands::Report { id } => {
            let result = dashboard.artifacts().report_url_for(id).await;
            print_status(dashboard.status().current());
            println!("{}", result?);
        }
    }

    Ok(())
}

async fn confirm(prompt: &str) -> anyhow::Result<bool> {
    eprint!("{}", prompt);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match DashboardConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("dataviz: failed to load config from {}: {}", cli.config, e);
            std::process::exit(1);
        }
    };
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut dashboard = match Dashboard::from_config(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("dataviz: {}", e);
            std::process::exit(1);
        }
    };

    let result = run(&mut dashboard, cli.command).await;
    dashboard.teardown().await;

    if let Err(e) = result {
        eprintln!("dataviz: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
