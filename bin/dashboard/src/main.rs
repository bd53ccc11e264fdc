use bpm_dashboard::app::{App, LoginPrompt, TerminalPrompt};
use bpm_dashboard::cli::{self, Cli};
use bpm_dashboard::config::Settings;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(report) => {
            eprintln!("{report}");
            return ExitCode::FAILURE;
        }
    };

    let app = match App::start(settings).await {
        Ok(app) => app,
        Err(report) => {
            eprintln!("{report}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(api_url = %app.runtime().api_url, "dashboard started");

    let prompt: Arc<dyn LoginPrompt> =
        Arc::new(TerminalPrompt::new(cli.command.email().map(ToString::to_string)));
    let listener = match app.listen_for_expiry(prompt.clone()) {
        Ok(listener) => listener,
        Err(report) => {
            eprintln!("{report}");
            return ExitCode::FAILURE;
        }
    };

    let result = cli::run(&app, &cli.command, cli.json, prompt).await;
    let code = match &result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{}", report.current_context());
            ExitCode::FAILURE
        }
    };

    // A 401 raised by the command is answered by the listener before it stops.
    listener.stop().await;
    code
}
