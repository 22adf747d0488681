use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{DashConfig, DashError, Message};
use crate::filter::Dimension;
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DashConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DashError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    // While the search box is open every key goes to it raw.
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Right => Some(Message::MoveRight),
            KeyCode::PageUp => Some(Message::MovePageUp),
            KeyCode::PageDown => Some(Message::MovePageDown),
            KeyCode::Home => Some(Message::MoveBeginning),
            KeyCode::End => Some(Message::MoveEnd),
            KeyCode::Tab => Some(Message::ToggleView),
            KeyCode::Char('e') => Some(Message::OpenPicker(Dimension::Employee)),
            KeyCode::Char('s') => Some(Message::OpenPicker(Dimension::Supervisor)),
            KeyCode::Char('l') => Some(Message::OpenPicker(Dimension::Level)),
            KeyCode::Char('o') => Some(Message::OpenPicker(Dimension::Location)),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('r') => Some(Message::ResetFilters),
            KeyCode::Char('d') => Some(Message::Export),
            KeyCode::Char('y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Char('[') => Some(Message::PrevChartKpi),
            KeyCode::Char(']') => Some(Message::NextChartKpi),
            KeyCode::Char(' ') => Some(Message::ToggleSelect),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
