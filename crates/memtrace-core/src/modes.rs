//! Keyboard-driven presentation modes.
//!
//! Debug and showcase are mutually exclusive: engaging one always clears the
//! other. Toggles return the fullscreen change the surface should apply.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationModes {
    debug: bool,
    showcase: bool,
}

/// A key the installation reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKey {
    Debug,
    Showcase,
}

impl ModeKey {
    /// `D`/`d` toggles debug, `S`/`s` toggles showcase.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'd' => Some(ModeKey::Debug),
            's' => Some(ModeKey::Showcase),
            _ => None,
        }
    }
}

impl PresentationModes {
    /// Modes for a surface that starts out fullscreen.
    pub fn in_showcase() -> Self {
        Self {
            debug: false,
            showcase: true,
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn showcase(&self) -> bool {
        self.showcase
    }

    /// Flip debug mode. Entering debug asks to leave fullscreen.
    pub fn toggle_debug(&mut self) -> Option<bool> {
        self.debug = !self.debug;
        self.showcase = false;
        if self.debug {
            Some(false)
        } else {
            None
        }
    }

    /// Flip showcase mode; the result is the fullscreen state to apply.
    pub fn toggle_showcase(&mut self) -> Option<bool> {
        self.showcase = !self.showcase;
        self.debug = false;
        Some(self.showcase)
    }

    pub fn press(&mut self, key: ModeKey) -> Option<bool> {
        match key {
            ModeKey::Debug => self.toggle_debug(),
            ModeKey::Showcase => self.toggle_showcase(),
        }
    }
}
