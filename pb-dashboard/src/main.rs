//! pb-dashboard - terminal front end for the PureBreath upload flow
//!
//! ```text
//! pb-dashboard upload cough.wav --user-id u1
//! pb-dashboard history --user-id u1 --report <ANALYSIS_ID>
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pb_common::config::{load_config, resolve_config_path};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pb_dashboard::render::{render_history, render_report, render_session};
use pb_dashboard::{AudioFile, Dashboard, DashboardEvent, RefreshOutcome, SelectionOutcome};

#[derive(Parser, Debug)]
#[command(name = "pb-dashboard")]
#[command(about = "Upload respiratory recordings and review analysis history")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Prediction service base URL
    #[arg(long, env = "PB_ANALYSIS_API_URL", global = true)]
    analysis_api_url: Option<String>,

    /// pb-api base URL
    #[arg(long, env = "PB_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one recording
    Upload {
        path: PathBuf,

        #[arg(short, long)]
        user_id: Option<String>,

        /// Declared MIME type (detected from the file when omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show recent analyses
    History {
        #[arg(short, long)]
        user_id: String,

        #[arg(short, long)]
        limit: Option<u32>,

        /// Show the report for one analysis instead of the list
        #[arg(long)]
        report: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pb_dashboard={0},pb_common={0}", config.logging.level).into()
            }),
        )
        // Logs on stderr, panels on stdout
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut dashboard_config = config.dashboard;
    if let Some(url) = args.analysis_api_url {
        dashboard_config.analysis_api_url = url;
    }
    if let Some(url) = args.api_url {
        dashboard_config.api_url = url;
    }

    match args.command {
        Command::Upload {
            path,
            user_id,
            mime,
        } => {
            let dashboard = Dashboard::new(&dashboard_config, user_id)?;
            upload(&dashboard, path, mime).await
        }
        Command::History {
            user_id,
            limit,
            report,
        } => {
            if let Some(limit) = limit {
                dashboard_config.history_limit = limit;
            }
            let dashboard = Dashboard::new(&dashboard_config, Some(user_id))?;
            history(&dashboard, report.as_deref()).await
        }
    }
}

async fn upload(dashboard: &Dashboard, path: PathBuf, mime: Option<String>) -> Result<ExitCode> {
    let file = AudioFile::from_path(&path, mime)
        .await
        .with_context(|| format!("Could not open {}", path.display()))?;
    println!(
        "Selected: {} ({:.2} MB, {})",
        file.name,
        file.size as f64 / 1024.0 / 1024.0,
        file.mime_type
    );

    if dashboard.mount().await == RefreshOutcome::Failed {
        warn!("Could not load history from pb-api");
    }

    // Live progress lines while the request is outstanding
    let mut events = dashboard.state().subscribe_events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::Progress { percent, .. }) => println!("Uploading... {percent}%"),
                Ok(DashboardEvent::AttemptFinished { .. }) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = match dashboard.select_file(file).await {
        SelectionOutcome::Uploaded(report) => {
            // The printer stops on its own at the attempt's final reset
            if report.applied {
                let _ = printer.await;
            } else {
                printer.abort();
            }
            report
        }
        SelectionOutcome::Rejected(_) => {
            printer.abort();
            print!("{}", render_session(&dashboard.state().session()));
            return Ok(ExitCode::FAILURE);
        }
        SelectionOutcome::Ignored => {
            printer.abort();
            return Err(anyhow!("An upload is already in progress"));
        }
    };

    if let Some(follow_up) = report.follow_up {
        if let Err(e) = follow_up.await {
            warn!(error = %e, "Follow-up task failed");
        }
    }

    println!();
    print!("{}", render_session(&dashboard.state().session()));

    if dashboard.user_id().is_some() {
        println!();
        print!("{}", render_history(&dashboard.state().history()));
    }

    Ok(if report.outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn history(dashboard: &Dashboard, report_id: Option<&str>) -> Result<ExitCode> {
    if dashboard.refresh_history().await == RefreshOutcome::Failed {
        return Err(anyhow!("Could not load history from pb-api"));
    }
    let view = dashboard.state().history();

    match report_id {
        Some(id) => match view.entries.iter().find(|e| e.id == id) {
            Some(entry) => print!("{}", render_report(entry)),
            None => {
                eprintln!("No analysis {id} among the {} most recent", view.entries.len());
                return Ok(ExitCode::FAILURE);
            }
        },
        None => print!("{}", render_history(&view)),
    }
    Ok(ExitCode::SUCCESS)
}
