use std::io;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::gateway::{Credentials, GatewayError};
use crate::record::Record;

pub const DEFAULT_BACKEND_URL: &str =
    "https://dashboard-api-git-main-yossaphan-kaenwongs-projects.vercel.app";

pub const HELP_TEXT: &str = "Dashboard
  ↑/k ↓/j      move row
  ←/h →/l      move column
  PgUp PgDn    page
  g / G        first / last row
  s / Enter    sort by column (again to flip)
  /            edit filter
  n            edit number of top records
  y            copy row
  i            insert a student
  r            reload
  b            back to login
  q            quit

Forms
  Tab / ↓      next field
  Shift-Tab/↑  previous field
  ← / → Space  change choice
  Enter        activate
  Esc          leave

F1 or ? shows this help, Ctrl-C always quits.";

#[derive(Debug, Error)]
pub enum ScoreviewError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("backend url is not set")]
    MissingBackendUrl,
    #[error("could not set up logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Setters)]
pub struct AppConfig {
    pub backend_url: Url,
    pub event_poll_time: u64,
    pub request_timeout: Duration,
    pub max_column_width: usize,
}

impl AppConfig {
    pub fn new(backend_url: &str) -> Result<Self, ScoreviewError> {
        let trimmed = backend_url.trim();
        if trimmed.is_empty() {
            return Err(ScoreviewError::MissingBackendUrl);
        }
        let url = Url::parse(trimmed).map_err(|e| ScoreviewError::InvalidBackendUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScoreviewError::InvalidBackendUrl {
                url: trimmed.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(Self {
            backend_url: url,
            event_poll_time: 100,
            request_timeout: Duration::from_secs(30),
            max_column_width: 24,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Route {
    Login,
    Dashboard,
    Insert,
}

/// Identifies one activation of a screen. Replies carry the ticket of the
/// screen that asked for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ticket(pub u64);

impl Ticket {
    pub fn next(self) -> Self {
        Ticket(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    FetchRecords,
    FetchAggregates,
    Submit(Record),
    Login(Credentials),
    SignIn(Credentials),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub ticket: Ticket,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Records(Result<Vec<Record>, GatewayError>),
    Aggregates(Result<Vec<Record>, GatewayError>),
    Submitted(Result<Value, GatewayError>),
    LoggedIn(Result<Value, GatewayError>),
    SignedIn(Result<Value, GatewayError>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Enter,
    Exit,
    Help,
    Sort,
    Filter,
    TopRecords,
    CopyRow,
    Reload,
    GoInsert,
    GoLogin,
    RawKey(KeyEvent),
    Reply(Ticket, Reply),
}

/// What a screen asks the model to do after handling a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Navigate(Route),
    Request(Request),
    Copy(String),
    Quit,
}
