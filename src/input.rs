use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Single line text input for the name search box.
#[derive(Default)]
pub struct SearchInput {
    text: String,
    cursor: usize,
    finished: bool,
    canceled: bool,
}

/// Snapshot handed to the model and the status line renderer.
#[derive(Default, Clone)]
pub struct InputState {
    pub text: String,
    pub cursor: usize,
    pub finished: bool,
    pub canceled: bool,
}

impl SearchInput {
    pub fn read(&mut self, key: KeyEvent) -> InputState {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.finished = true,
            (KeyCode::Esc, KeyModifiers::NONE) => {
                self.text.clear();
                self.cursor = 0;
                self.finished = true;
                self.canceled = true;
            }
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Left, KeyModifiers::NONE) => self.cursor = self.cursor.saturating_sub(1),
            (KeyCode::Right, KeyModifiers::NONE) => {
                if self.cursor < self.text.chars().count() {
                    self.cursor += 1;
                }
            }
            (code, _) => {
                if let Some(chr) = code.as_char() {
                    self.text.insert(self.byte_pos(), chr);
                    self.cursor += 1;
                }
            }
        }
        self.state()
    }

    pub fn state(&self) -> InputState {
        InputState {
            text: self.text.clone(),
            cursor: self.cursor,
            finished: self.finished,
            canceled: self.canceled,
        }
    }

    pub fn reset(&mut self, initial: &str) {
        self.text = initial.to_string();
        self.cursor = self.text.chars().count();
        self.finished = false;
        self.canceled = false;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let pos = self.byte_pos();
            self.text.remove(pos);
        }
    }

    // Cursor position is in chars, String edits need bytes.
    fn byte_pos(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(input: &mut SearchInput, code: KeyCode) -> InputState {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn typing_and_confirming() {
        let mut input = SearchInput::default();
        input.reset("");
        press(&mut input, KeyCode::Char('r'));
        press(&mut input, KeyCode::Char('a'));
        press(&mut input, KeyCode::Char('o'));
        let state = press(&mut input, KeyCode::Enter);
        assert!(state.finished);
        assert!(!state.canceled);
        assert_eq!(state.text, "rao");
    }

    #[test]
    fn escape_cancels_and_clears() {
        let mut input = SearchInput::default();
        input.reset("rao");
        let state = press(&mut input, KeyCode::Esc);
        assert!(state.finished);
        assert!(state.canceled);
        assert_eq!(state.text, "");
    }

    #[test]
    fn backspace_removes_before_the_cursor() {
        let mut input = SearchInput::default();
        input.reset("abc");
        press(&mut input, KeyCode::Left);
        let state = press(&mut input, KeyCode::Backspace);
        assert_eq!(state.text, "ac");
        assert_eq!(state.cursor, 1);
    }

    #[test]
    fn multibyte_names_edit_cleanly() {
        let mut input = SearchInput::default();
        input.reset("Ren\u{e9}e");
        let state = press(&mut input, KeyCode::Backspace);
        assert_eq!(state.text, "Ren\u{e9}");
        press(&mut input, KeyCode::Left);
        let state = press(&mut input, KeyCode::Char('é'));
        assert_eq!(state.text, "Renéé");
        assert_eq!(state.cursor, 4);
    }
}
