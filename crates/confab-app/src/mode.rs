//! Grid/spotlight preference tracking.
//!
//! The user's explicit choice is honored until the natural (context-
//! driven) mode converges back to the same choice; from then on the
//! machine silently follows natural again. This keeps an auto-switch
//! (e.g. screen-share forcing spotlight) from fighting the user.

/// Video arrangement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMode {
    /// Equal tiles.
    Grid,
    /// One enlarged tile plus thumbnails.
    Spotlight,
}

/// The preference machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModePreference {
    explicit: Option<VideoMode>,
}

impl ModePreference {
    /// Fresh machine following the natural mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicit user selection.
    pub fn select(&mut self, mode: VideoMode) {
        self.explicit = Some(mode);
    }

    /// The mode to use, given the current natural mode.
    ///
    /// Clears the explicit selection once natural catches up with it.
    pub fn current(&mut self, natural: VideoMode) -> VideoMode {
        match self.explicit {
            Some(explicit) if explicit == natural => {
                self.explicit = None;
                natural
            },
            Some(explicit) => explicit,
            None => natural,
        }
    }

    /// True while an explicit selection is overriding natural.
    pub fn is_overridden(&self) -> bool {
        self.explicit.is_some()
    }
}
