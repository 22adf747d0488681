use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod controller;
mod data;
mod domain;
mod filter;
mod input;
mod kpi;
mod model;
mod ui;

use controller::Controller;
use domain::{DashConfig, DashError};
use model::{Model, Status};
use ui::DashUI;

/// A tui based employee performance dashboard.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// CSV report to load
    file: String,

    /// Field separator of the report
    #[arg(long, default_value_t = ',')]
    separator: char,

    /// Append logs to this file (the terminal itself stays quiet)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: {:?}", e);
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run(cli: Cli) -> Result<(), DashError> {
    if !cli.separator.is_ascii() {
        return Err(DashError::LoadingFailed(format!(
            "separator '{}' is not a single ascii character",
            cli.separator
        )));
    }
    let path = shellexpand::full(&cli.file)
        .map_err(|e| DashError::LoadingFailed(e.to_string()))?
        .into_owned();

    let config = DashConfig::default().event_poll_time(80u64);

    // Load before the terminal switches modes so a parse error stays readable.
    let mut model = Model::load(PathBuf::from(path), cli.separator as u8, &config)?;

    let ui = DashUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    model.update(domain::Message::Resize(
        size.width as usize,
        size.height as usize,
    ))?;

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_logging(path: Option<&Path>) -> Result<(), DashError> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
