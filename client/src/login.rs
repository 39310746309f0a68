//! Name prompt shown before joining the field

use macroquad::prelude::*;
use shared::{validate_name, NAME_MAX_LEN};

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    name: String,
    error: Option<String>,
    busy: bool,
}

impl LoginForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: &str) -> Self {
        let mut form = Self::new();
        for c in name.chars() {
            form.type_char(c);
        }
        form
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn can_submit(&self) -> bool {
        !self.busy && !self.name.trim().is_empty()
    }

    pub fn type_char(&mut self, c: char) {
        if self.busy || c.is_control() || self.name.chars().count() >= NAME_MAX_LEN {
            return;
        }
        self.name.push(c);
        self.error = None;
    }

    pub fn backspace(&mut self) {
        if self.busy {
            return;
        }
        self.name.pop();
        self.error = None;
    }

    /// Validates the entered name; on success the form locks until
    /// [`fail`](Self::fail) or [`reset`](Self::reset).
    pub fn submit(&mut self) -> Option<String> {
        if self.busy {
            return None;
        }

        match validate_name(&self.name) {
            Ok(name) => {
                self.busy = true;
                self.error = None;
                Some(name)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Unlocks the form after a failed join and shows why.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.busy = false;
        self.error = Some(message.into());
    }

    /// Unlocks the form, keeping the last name for the next join.
    pub fn reset(&mut self) {
        self.busy = false;
        self.error = None;
    }

    /// Feeds this frame's typed characters into the form; returns a name when
    /// Enter submits a valid one.
    pub fn update(&mut self) -> Option<String> {
        while let Some(c) = get_char_pressed() {
            self.type_char(c);
        }

        if is_key_pressed(KeyCode::Backspace) {
            self.backspace();
        }

        if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
            return self.submit();
        }
        None
    }
}
