use std::time::Instant;

use arboard::Clipboard;
use tracing::{debug, info, trace, warn};

use crate::domain::{Command, Effect, HELP_TEXT, Message, Route, Ticket};
use crate::screen::Screen;

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Screen,
    Popup,
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    screen: Screen,
    ticket: Ticket,
    clipboard: Option<Clipboard>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init() -> Self {
        let (screen, _) = Screen::open(Route::Login);
        Self {
            status: Status::Ready,
            modus: Modus::Screen,
            screen,
            ticket: Ticket::default(),
            clipboard: None,
            status_message: "Started scoreview!".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    #[cfg(test)]
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn last_status_message_update(&self) -> Instant {
        self.last_status_message_update
    }

    pub fn show_popup(&self) -> bool {
        self.modus == Modus::Popup
    }

    pub fn popup_message(&self) -> &'static str {
        HELP_TEXT
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::Screen && self.screen.raw_keyevents()
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    /// Replace the active screen. Any reply still in flight for the old
    /// screen is dropped once it arrives.
    pub fn navigate(&mut self, route: Route) -> Vec<Command> {
        self.ticket = self.ticket.next();
        info!("Navigate to {route:?} with {:?}", self.ticket);
        let (screen, effects) = Screen::open(route);
        self.screen = screen;
        self.modus = Modus::Screen;
        self.set_status_message(match route {
            Route::Login => "Please log in",
            Route::Dashboard => "Dashboard",
            Route::Insert => "Insert a student",
        });
        self.apply(effects)
    }

    pub fn update(&mut self, message: Message) -> Vec<Command> {
        trace!("Update: Modus {:?}, Message {:?}", self.modus, message);
        match message {
            Message::Quit => {
                self.quit();
                Vec::new()
            }
            Message::Reply(ticket, reply) => {
                if ticket != self.ticket {
                    debug!("Dropping reply for {ticket:?}, active is {:?}", self.ticket);
                    return Vec::new();
                }
                let effects = self.screen.on_reply(reply);
                self.apply(effects)
            }
            msg => match self.modus {
                Modus::Popup => {
                    if matches!(msg, Message::Exit | Message::Enter | Message::Help) {
                        trace!("Close popup ...");
                        self.modus = Modus::Screen;
                    }
                    Vec::new()
                }
                Modus::Screen => {
                    if msg == Message::Help {
                        self.modus = Modus::Popup;
                        return Vec::new();
                    }
                    let effects = self.screen.update(msg);
                    self.apply(effects)
                }
            },
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Vec<Command> {
        let mut commands = Vec::new();
        for effect in effects {
            match effect {
                Effect::Navigate(route) => commands.extend(self.navigate(route)),
                Effect::Request(request) => commands.push(Command {
                    ticket: self.ticket,
                    request,
                }),
                Effect::Copy(text) => self.copy(text),
                Effect::Quit => self.quit(),
            }
        }
        commands
    }

    fn copy(&mut self, text: String) {
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .inspect_err(|e| warn!("No clipboard available: {e:?}"))
                .ok();
        }
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(text).map_err(|e| format!("{e}")),
            None => Err(String::from("no clipboard")),
        };
        match result {
            Ok(_) => {
                trace!("Copied row to clipboard.");
                self.set_status_message("Copied row to clipboard");
            }
            Err(e) => {
                trace!("Error copying to clipboard: {e}");
                self.set_status_message(format!("Copy failed: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Reply, Request};
    use crate::record::Record;
    use crate::screen::Load;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use serde_json::json;

    fn records() -> Vec<Record> {
        vec![Record::new().with("StudentID", 1).with("DVRTID", 90)]
    }

    fn dashboard(model: &Model) -> &crate::screen::DashboardScreen {
        match model.screen() {
            Screen::Dashboard(d) => d,
            _ => panic!("not on the dashboard"),
        }
    }

    #[test]
    fn starts_on_login() {
        let model = Model::init();
        assert_eq!(model.screen().route(), Route::Login);
        assert!(model.raw_keyevents());
    }

    #[test]
    fn dashboard_entry_requests_with_new_ticket() {
        let mut model = Model::init();
        let commands = model.navigate(Route::Dashboard);
        let ticket = model.ticket();
        assert_ne!(ticket, Ticket::default());
        assert_eq!(
            commands,
            vec![
                Command {
                    ticket,
                    request: Request::FetchRecords
                },
                Command {
                    ticket,
                    request: Request::FetchAggregates
                },
            ]
        );
    }

    #[test]
    fn replies_for_the_active_screen_apply() {
        let mut model = Model::init();
        model.navigate(Route::Dashboard);
        let ticket = model.ticket();
        model.update(Message::Reply(ticket, Reply::Records(Ok(records()))));
        assert_eq!(dashboard(&model).view().len(), 1);
        assert_eq!(dashboard(&model).aggregates, Load::Pending);
    }

    #[test]
    fn late_replies_are_dropped() {
        let mut model = Model::init();
        model.navigate(Route::Dashboard);
        let old = model.ticket();
        model.update(Message::Reload);
        assert_ne!(model.ticket(), old);
        model.update(Message::Reply(old, Reply::Records(Ok(records()))));
        assert_eq!(dashboard(&model).records, Load::Pending);

        model.update(Message::GoInsert);
        let commands = model.update(Message::Reply(old, Reply::Records(Ok(records()))));
        assert!(commands.is_empty());
        assert_eq!(model.screen().route(), Route::Insert);
    }

    #[test]
    fn login_success_moves_to_dashboard() {
        let mut model = Model::init();
        let login_ticket = model.ticket();
        let commands = model.update(Message::Reply(
            login_ticket,
            Reply::LoggedIn(Ok(json!({"user": "ann"}))),
        ));
        assert_eq!(model.screen().route(), Route::Dashboard);
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| c.ticket == model.ticket()));
    }

    #[test]
    fn form_requests_carry_the_current_ticket() {
        let mut model = Model::init();
        model.navigate(Route::Insert);
        let commands = model.update(Message::RawKey(KeyEvent::new(
            KeyCode::Enter,
            KeyModifiers::NONE,
        )));
        assert!(matches!(
            commands.as_slice(),
            [Command { ticket, request: Request::Submit(_) }] if *ticket == model.ticket()
        ));
    }

    #[test]
    fn help_popup_swallows_keys() {
        let mut model = Model::init();
        model.navigate(Route::Dashboard);
        model.update(Message::Help);
        assert!(model.show_popup());
        assert!(!model.raw_keyevents());
        assert!(model.update(Message::GoInsert).is_empty());
        assert_eq!(model.screen().route(), Route::Dashboard);
        model.update(Message::Exit);
        assert!(!model.show_popup());
    }

    #[test]
    fn quit_from_anywhere() {
        let mut model = Model::init();
        model.update(Message::Help);
        model.update(Message::Quit);
        assert_eq!(model.status, Status::Quitting);
    }

    #[test]
    fn escape_on_login_quits() {
        let mut model = Model::init();
        model.update(Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert_eq!(model.status, Status::Quitting);
    }
}
