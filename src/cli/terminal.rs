//! Terminal colour and width detection.

use owo_colors::{OwoColorize, colors::css};

/// Columns below which tables drop their less important columns.
const NARROW_WIDTH: u16 = 72;

fn colour_enabled() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Whether stdout is a terminal narrower than [`NARROW_WIDTH`].
pub fn is_narrow() -> bool {
    terminal_size::terminal_size().is_some_and(|(width, _)| width.0 < NARROW_WIDTH)
}

/// Colours a message by what it reports.
///
/// Falls back to plain text when stdout does not support colour.
pub trait Colorize {
    /// A completed change (green).
    fn success(&self) -> String;
    /// Something that needs attention (orange).
    fn warning(&self) -> String;
    /// A rejected operation or broken invariant (red).
    fn failure(&self) -> String;
    /// Secondary detail.
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Green>().to_string())
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Orange>().to_string())
    }

    fn failure(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Red>().to_string())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), |s| s.dimmed().to_string())
    }
}

fn paint(text: &str, style: impl FnOnce(&str) -> String) -> String {
    if colour_enabled() {
        style(text)
    } else {
        text.to_string()
    }
}
