use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{trace, warn};

use crate::domain::{AppConfig, Message, ScoreviewError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
    replies: Receiver<Message>,
}

impl Controller {
    pub fn new(cfg: &AppConfig, replies: Receiver<Message>) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
            replies,
        }
    }

    /// Gateway replies first, then at most one terminal event.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, ScoreviewError> {
        match self.replies.try_recv() {
            Ok(message) => return Ok(Some(message)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => warn!("Reply channel closed"),
        }

        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(map_key(key, model.raw_keyevents()));
        }
        Ok(None)
    }
}

/// Map a key press to a message. In raw mode the active screen gets the key
/// itself, only quit and help stay bound.
pub fn map_key(key: event::KeyEvent, raw: bool) -> Option<Message> {
    let message = match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
        (KeyCode::F(1), _) => Some(Message::Help),
        _ if raw => Some(Message::RawKey(key)),
        (KeyCode::Char('q'), _) => Some(Message::Quit),
        (KeyCode::Char('?'), _) => Some(Message::Help),
        (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
        (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
        (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
        (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
        (KeyCode::PageUp, _) => Some(Message::MovePageUp),
        (KeyCode::PageDown, _) => Some(Message::MovePageDown),
        (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
        (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
        (KeyCode::Enter, _) => Some(Message::Enter),
        (KeyCode::Esc, _) => Some(Message::Exit),
        (KeyCode::Char('s'), _) => Some(Message::Sort),
        (KeyCode::Char('/'), _) => Some(Message::Filter),
        (KeyCode::Char('n'), _) => Some(Message::TopRecords),
        (KeyCode::Char('y'), _) => Some(Message::CopyRow),
        (KeyCode::Char('r'), _) => Some(Message::Reload),
        (KeyCode::Char('i'), _) => Some(Message::GoInsert),
        (KeyCode::Char('b'), _) => Some(Message::GoLogin),
        _ => None,
    };
    trace!("Mapped: {key:?} => {message:?}");
    message
}
