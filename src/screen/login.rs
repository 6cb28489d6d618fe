use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{info, warn};

use crate::domain::{Effect, Message, Reply, Request, Route};
use crate::gateway::{Credentials, GatewayError};
use crate::inputter::Inputter;
use crate::screen::cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    Password,
    Login,
    SignIn,
}

const FOCUS_ORDER: [LoginFocus; 4] = [
    LoginFocus::Username,
    LoginFocus::Password,
    LoginFocus::Login,
    LoginFocus::SignIn,
];

pub struct LoginScreen {
    pub username: Inputter,
    pub password: Inputter,
    pub focus: LoginFocus,
    pub message: Option<String>,
    pub pending: bool,
}

impl LoginScreen {
    pub fn new() -> Self {
        Self {
            username: Inputter::default(),
            password: Inputter::masked(),
            focus: LoginFocus::Username,
            message: None,
            pending: false,
        }
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match message {
            Message::RawKey(key) => self.key(key),
            _ => Vec::new(),
        }
    }

    fn key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.move_focus(true),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(false),
            KeyCode::Esc => return vec![Effect::Quit],
            KeyCode::Enter => {
                return match self.focus {
                    LoginFocus::Username => {
                        self.focus = LoginFocus::Password;
                        Vec::new()
                    }
                    LoginFocus::Password | LoginFocus::Login => self.request(false),
                    LoginFocus::SignIn => self.request(true),
                };
            }
            _ => match self.focus {
                LoginFocus::Username => {
                    self.username.read(key);
                }
                LoginFocus::Password => {
                    self.password.read(key);
                }
                _ => {}
            },
        }
        Vec::new()
    }

    fn move_focus(&mut self, forward: bool) {
        let idx = FOCUS_ORDER
            .iter()
            .position(|f| *f == self.focus)
            .unwrap_or(0);
        self.focus = FOCUS_ORDER[cycle(idx, FOCUS_ORDER.len(), forward)];
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.value().to_string(),
            password: self.password.value().to_string(),
        }
    }

    fn request(&mut self, sign_in: bool) -> Vec<Effect> {
        let credentials = self.credentials();
        info!(
            "{} as {:?}",
            if sign_in { "Signing in" } else { "Logging in" },
            credentials.username
        );
        self.pending = true;
        let request = if sign_in {
            Request::SignIn(credentials)
        } else {
            Request::Login(credentials)
        };
        vec![Effect::Request(request)]
    }

    pub fn on_reply(&mut self, reply: Reply) -> Vec<Effect> {
        self.pending = false;
        match reply {
            Reply::LoggedIn(Ok(payload)) => {
                if payload.is_null() {
                    warn!("Login answered with an empty payload");
                    return Vec::new();
                }
                info!("Login successful");
                self.message = Some(String::from("Login successful"));
                return vec![Effect::Navigate(Route::Dashboard)];
            }
            Reply::LoggedIn(Err(GatewayError::Auth(e))) => {
                warn!("Login refused: {e:?}");
                self.message = Some(format!("Error: {e}"));
            }
            Reply::LoggedIn(Err(e)) => {
                warn!("Login error: {e}");
                self.message = Some(format!("An error occurred while logging in: {e}"));
            }
            Reply::SignedIn(Ok(payload)) => {
                info!("Sign in answered {payload}");
                self.message = Some(String::from("Sign in successful"));
            }
            Reply::SignedIn(Err(e)) => {
                warn!("Sign in error: {e}");
                self.message = Some(String::from("An error occurred while signing in"));
            }
            other => warn!("Login screen ignores {other:?}"),
        }
        Vec::new()
    }
}

impl Default for LoginScreen {
    fn default() -> Self {
        Self::new()
    }
}
