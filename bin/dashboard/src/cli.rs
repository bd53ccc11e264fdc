//! Command-line interface.

use bpm_dashboard_api::{ApiError, HistoryQuery};
use bpm_dashboard_core::{DeviceId, StatisticsPeriod};
use clap::{Parser, Subcommand};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

use crate::app::{App, LoginPrompt, interactive_login};
use crate::error::AppError;
use crate::render;

/// Measurements fetched per refresh of the `watch` view.
pub const WATCH_HISTORY_LIMIT: u32 = 50;

/// Terminal dashboard for BPM telemetry.
#[derive(Debug, Parser)]
#[command(name = "bpm-dashboard", version, about)]
pub struct Cli {
    /// Print raw JSON responses instead of summaries.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sign in.
    Login {
        /// Email to sign in with; prompted for when omitted.
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget stored tokens.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Show the latest measurement.
    Status,
    /// List past measurements.
    History {
        /// Maximum number of measurements.
        #[arg(long)]
        limit: Option<u32>,
        /// Only measurements from this device.
        #[arg(long)]
        device: Option<String>,
        /// Earliest timestamp (ISO-8601).
        #[arg(long)]
        from: Option<String>,
        /// Latest timestamp (ISO-8601).
        #[arg(long)]
        to: Option<String>,
        /// Write the measurements as CSV (date, time, bpm, status, device).
        /// Takes precedence over `--json`.
        #[arg(long)]
        csv: bool,
    },
    /// Show aggregate statistics.
    Stats {
        /// Aggregation period: day, week or month.
        #[arg(long, default_value_t = StatisticsPeriod::Day)]
        period: StatisticsPeriod,
    },
    /// List devices.
    Devices,
    /// Show the backend's view of the user.
    Profile,
    /// Check backend health.
    Health,
    /// Live dashboard, refreshed until Ctrl-C.
    Watch,
}

impl Command {
    /// Returns the email given on the command line, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Login { email } => email.as_deref(),
            _ => None,
        }
    }
}

fn request_failed(report: Report<ApiError>) -> Report<AppError> {
    let details = report.current_context().to_string();
    report.context(AppError::Request { details })
}

fn history_query(
    limit: Option<u32>,
    device: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> HistoryQuery {
    let mut query = HistoryQuery::new();
    if let Some(limit) = limit {
        query = query.with_limit(limit);
    }
    if let Some(device) = device {
        query = query.with_device(DeviceId::from(device));
    }
    if let Some(from) = from {
        query = query.with_start_date(from);
    }
    if let Some(to) = to {
        query = query.with_end_date(to);
    }
    query
}

fn print(json: bool, value: &JsonValue, summary: fn(&JsonValue) -> String) {
    if json {
        println!("{}", render::json(value));
    } else {
        println!("{}", summary(value));
    }
}

/// Runs `command` against a started application.
///
/// # Errors
///
/// Returns the failure of the command: a rejected login, a missing session
/// for `whoami`, or a failed backend request.
pub async fn run(
    app: &App,
    command: &Command,
    json: bool,
    prompt: Arc<dyn LoginPrompt>,
) -> Result<(), Report<AppError>> {
    let gateway = app.gateway();
    match command {
        Command::Login { .. } => {
            interactive_login(app.sessions(), prompt, "Sign in to the BPM dashboard.").await?;
        }
        Command::Logout => {
            app.sessions().logout().await;
            println!("Signed out.");
        }
        Command::Whoami => {
            let session = app.sessions().session().ok_or(AppError::NotLoggedIn)?;
            if json {
                let value =
                    serde_json::to_value(session.as_ref()).map_err(|e| AppError::Output {
                        details: e.to_string(),
                    })?;
                println!("{}", render::json(&value));
            } else {
                println!("{}", render::session(&session));
            }
        }
        Command::Status => {
            let value = gateway.current_status().await.map_err(request_failed)?;
            print(json, &value, render::status);
        }
        Command::History {
            limit,
            device,
            from,
            to,
            csv,
        } => {
            let query = history_query(*limit, device.as_deref(), from.as_deref(), to.as_deref());
            let value = gateway.bpm_history(&query).await.map_err(request_failed)?;
            if *csv {
                println!("{}", render::history_csv(&value));
            } else {
                print(json, &value, render::history);
            }
        }
        Command::Stats { period } => {
            let value = gateway
                .bpm_statistics(*period)
                .await
                .map_err(request_failed)?;
            print(json, &value, render::statistics);
        }
        Command::Devices => {
            let value = gateway.devices().await.map_err(request_failed)?;
            print(json, &value, render::devices);
        }
        Command::Profile => {
            let value = gateway.user_profile().await.map_err(request_failed)?;
            print(json, &value, render::profile);
        }
        Command::Health => {
            let value = gateway.health().await.map_err(request_failed)?;
            print(json, &value, render::health);
        }
        Command::Watch => watch(app, json).await,
    }
    Ok(())
}

/// Refreshes the dashboard view until Ctrl-C.
///
/// Refresh failures are reported and retried on the next tick. After a 401
/// the view pauses until the session changes, so the expiry prompt is not
/// raced by further rejected requests.
async fn watch(app: &App, json: bool) {
    let gateway = app.gateway();
    let mut ticker = tokio::time::interval(app.settings().refresh_interval());
    let mut states = app.sessions().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let recent = HistoryQuery::new().with_limit(WATCH_HISTORY_LIMIT);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => return,
            _ = ticker.tick() => {}
        }

        let _ = states.borrow_and_update();
        let refreshed = tokio::try_join!(
            gateway.current_status(),
            gateway.bpm_history(&recent),
            gateway.bpm_statistics(StatisticsPeriod::Day),
        );

        match refreshed {
            Ok((current, history, daily)) => {
                if json {
                    let value = serde_json::json!({
                        "current": current,
                        "history": history,
                        "statistics": daily,
                    });
                    println!("{}", render::json(&value));
                } else {
                    println!("{}\n", render::dashboard(&current, &history, &daily));
                }
            }
            Err(report) if matches!(report.current_context(), ApiError::Unauthorized { .. }) => {
                eprintln!("Session expired; waiting for sign-in.");
                tokio::select! {
                    _ = &mut ctrl_c => return,
                    changed = states.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
                debug!("session changed; resuming refresh");
            }
            Err(report) => eprintln!("refresh failed: {report}"),
        }
    }
}
