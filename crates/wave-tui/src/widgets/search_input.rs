//! SearchInput — wraps tui-input for the search box.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_INPUT_BG, C_INPUT_FG, C_MUTED};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Changed(String),
    Submitted(String),
    /// Focus left the box.
    Blurred,
    None,
}

pub struct SearchInput {
    input: Input,
    active: bool,
    placeholder: String,
}

impl SearchInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            active: false,
            placeholder: placeholder.into(),
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_value(&mut self, value: &str) {
        self.input = Input::new(value.to_string());
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc clears the text first, then leaves the box.  Enter submits and
    /// leaves.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        match key.code {
            KeyCode::Esc => {
                if self.input.value().is_empty() {
                    self.deactivate();
                    InputAction::Blurred
                } else {
                    self.input = Input::default();
                    InputAction::Changed(String::new())
                }
            }
            KeyCode::Enter => {
                self.deactivate();
                InputAction::Submitted(self.input.value().to_string())
            }
            KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
                self.deactivate();
                InputAction::Blurred
            }
            _ => {
                let before = self.input.value().to_string();
                self.input.handle_event(&Event::Key(key));
                if self.input.value() == before {
                    InputAction::None
                } else {
                    InputAction::Changed(self.input.value().to_string())
                }
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if area.width < 5 {
            return;
        }
        let scroll = self.input.visual_scroll(area.width.saturating_sub(4) as usize);
        let value = self.input.value();
        let display = if value.is_empty() {
            Span::styled(format!("🔍 {}", self.placeholder), Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!("🔍 {}", visible), Style::default().fg(C_INPUT_FG))
        };

        frame.render_widget(
            Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_INPUT_BG)),
            area,
        );

        if self.active {
            let cursor_x = area.x + 3 + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width - 1), area.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_and_submit() {
        let mut input = SearchInput::new("Search");
        input.activate();
        assert_eq!(input.handle_key(key(KeyCode::Char('a'))), InputAction::Changed("a".into()));
        assert_eq!(input.handle_key(key(KeyCode::Char('b'))), InputAction::Changed("ab".into()));
        assert_eq!(input.handle_key(key(KeyCode::Enter)), InputAction::Submitted("ab".into()));
        assert!(!input.is_active());
    }

    #[test]
    fn test_escape_clears_then_blurs() {
        let mut input = SearchInput::new("Search");
        input.activate();
        input.set_value("rock");
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::Changed(String::new()));
        assert!(input.is_active());
        assert_eq!(input.handle_key(key(KeyCode::Esc)), InputAction::Blurred);
        assert!(!input.is_active());
    }
}
