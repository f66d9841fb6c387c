//! Window-mode classification from viewport dimensions.

/// Presentation mode derived from the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Regular window.
    Normal,
    /// Width-constrained window (portrait phone, narrow split).
    Narrow,
    /// Height-constrained window (landscape phone, docked strip).
    Flat,
    /// Tiny picture-in-picture window.
    Pip,
}

/// Classify a viewport. Breakpoints are in CSS pixels.
pub fn classify(width: u32, height: u32) -> WindowMode {
    if height <= 400 && width <= 340 {
        WindowMode::Pip
    } else if height <= 600 {
        WindowMode::Flat
    } else if width <= 600 {
        WindowMode::Narrow
    } else {
        WindowMode::Normal
    }
}
