// Each screen owns its state and turns messages into effects. The model
// decides what an effect means (navigation, gateway requests, clipboard).

pub mod dashboard;
pub mod insert;
pub mod login;

pub use dashboard::DashboardScreen;
pub use insert::InsertScreen;
pub use login::LoginScreen;

use tracing::trace;

use crate::domain::{Effect, Message, Reply, Route};

#[derive(Debug, Clone, PartialEq)]
pub enum Load<T> {
    Pending,
    Ready(T),
    Failed(String),
}

pub enum Screen {
    Login(LoginScreen),
    Dashboard(DashboardScreen),
    Insert(InsertScreen),
}

impl Screen {
    /// A fresh screen for `route` plus whatever it needs on entry.
    pub fn open(route: Route) -> (Self, Vec<Effect>) {
        match route {
            Route::Login => (Screen::Login(LoginScreen::new()), Vec::new()),
            Route::Dashboard => {
                let (screen, effects) = DashboardScreen::open();
                (Screen::Dashboard(screen), effects)
            }
            Route::Insert => (Screen::Insert(InsertScreen::new()), Vec::new()),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Screen::Login(_) => Route::Login,
            Screen::Dashboard(_) => Route::Dashboard,
            Screen::Insert(_) => Route::Insert,
        }
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match self {
            Screen::Login(s) => s.update(message),
            Screen::Dashboard(s) => s.update(message),
            Screen::Insert(s) => s.update(message),
        }
    }

    pub fn on_reply(&mut self, reply: Reply) -> Vec<Effect> {
        trace!("Reply for {:?}", self.route());
        match self {
            Screen::Login(s) => s.on_reply(reply),
            Screen::Dashboard(s) => s.on_reply(reply),
            Screen::Insert(s) => s.on_reply(reply),
        }
    }

    /// Forms take every key as text input.
    pub fn raw_keyevents(&self) -> bool {
        match self {
            Screen::Login(_) | Screen::Insert(_) => true,
            Screen::Dashboard(s) => s.editing.is_some(),
        }
    }
}

/// Move a focus index by one, wrapping around.
pub(crate) fn cycle(focus: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (focus + 1) % len
    } else {
        (focus + len - 1) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Request;

    #[test]
    fn dashboard_entry_fetches_both_lists() {
        let (screen, effects) = Screen::open(Route::Dashboard);
        assert_eq!(screen.route(), Route::Dashboard);
        assert_eq!(
            effects,
            vec![
                Effect::Request(Request::FetchRecords),
                Effect::Request(Request::FetchAggregates)
            ]
        );
    }

    #[test]
    fn forms_open_without_requests() {
        for route in [Route::Login, Route::Insert] {
            let (screen, effects) = Screen::open(route);
            assert!(effects.is_empty());
            assert!(screen.raw_keyevents());
        }
    }

    #[test]
    fn cycling_wraps() {
        assert_eq!(cycle(0, 3, false), 2);
        assert_eq!(cycle(2, 3, true), 0);
        assert_eq!(cycle(1, 3, true), 2);
    }
}
