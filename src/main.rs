use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod dispatcher;
mod domain;
mod gateway;
mod inputter;
mod model;
mod record;
mod screen;
mod ui;
mod view;

use controller::Controller;
use dispatcher::Dispatcher;
use domain::{AppConfig, DEFAULT_BACKEND_URL, Route, ScoreviewError};
use gateway::HttpGateway;
use model::{Model, Status};
use ui::TableUI;

/// Terminal dashboard for the student score backend.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Base url of the backend
    #[arg(long, env = "BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// Screen shown at start
    #[arg(long, value_enum, default_value_t = Route::Login)]
    screen: Route,

    /// Log file, the terminal belongs to the UI
    #[arg(long, default_value = "~/.scoreview.log")]
    log_file: String,

    /// Key event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Timeout for a single backend request in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &str) -> Result<(), ScoreviewError> {
    let path = shellexpand::full(path).map_err(|e| ScoreviewError::Logging(e.to_string()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&*path)?;
    let filter = EnvFilter::try_from_env("SCOREVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .map_err(|e| ScoreviewError::Logging(e.to_string()))
}

fn run(args: Args) -> Result<(), ScoreviewError> {
    init_logging(&args.log_file)?;

    let cfg = AppConfig::new(&args.backend_url)?
        .event_poll_time(args.poll_ms)
        .request_timeout(Duration::from_secs(args.timeout_secs));
    info!("Starting scoreview against {}", cfg.backend_url);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let gateway = Arc::new(HttpGateway::new(&cfg.backend_url, cfg.request_timeout));
    let (replies_tx, replies_rx) = mpsc::channel();
    let dispatcher = Dispatcher::new(gateway, runtime.handle().clone(), replies_tx);

    let mut model = Model::init();
    if args.screen != Route::Login {
        dispatcher.dispatch_all(model.navigate(args.screen));
    }

    let controller = Controller::new(&cfg, replies_rx);
    let mut ui = TableUI::new(&cfg);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &controller, &mut ui, &dispatcher);
    ratatui::restore();
    info!("Shutting down");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    model: &mut Model,
    controller: &Controller,
    ui: &mut TableUI,
    dispatcher: &Dispatcher<HttpGateway>,
) -> Result<(), ScoreviewError> {
    while model.status != Status::Quitting {
        // Render the current view
        terminal.draw(|f| ui.draw(model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(model)? {
            dispatcher.dispatch_all(model.update(message));
        };
    }
    Ok(())
}
