//! Color references usable inside templates.
//!
//! - `:{color(red)}` / `:{bgcolor(red)}` set the foreground / background color
//! - `:{color:red}` / `:{color:bgRed}` / `:{bgcolor:red}` are the named equivalents
//! - `:{color:close}` / `:{bgcolor:close}` (also `:{color:bgClose}`) reset them

use std::fmt;

use owo_colors::{AnsiColors, DynColor};

struct Fg(AnsiColors);

impl fmt::Display for Fg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_ansi_fg(f)
    }
}

struct Bg(AnsiColors);

impl fmt::Display for Bg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_ansi_bg(f)
    }
}

pub fn fg(color: AnsiColors) -> String {
    Fg(color).to_string()
}

pub fn bg(color: AnsiColors) -> String {
    Bg(color).to_string()
}

/// Parses names like `red`, `brightRed`, `bright_red` or `redBright`
pub fn parse(name: &str) -> Option<AnsiColors> {
    let name = name
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .to_lowercase();
    let (base, bright) = match name.strip_prefix("bright") {
        Some(base) => (base, true),
        None => match name.strip_suffix("bright") {
            Some(base) => (base, true),
            None => (name.as_str(), false),
        },
    };

    let color = match (base, bright) {
        ("black", false) => AnsiColors::Black,
        ("red", false) => AnsiColors::Red,
        ("green", false) => AnsiColors::Green,
        ("yellow", false) => AnsiColors::Yellow,
        ("blue", false) => AnsiColors::Blue,
        ("magenta", false) => AnsiColors::Magenta,
        ("cyan", false) => AnsiColors::Cyan,
        ("white", false) => AnsiColors::White,
        ("default", false) => AnsiColors::Default,
        ("black", true) | ("gray", false) | ("grey", false) => AnsiColors::BrightBlack,
        ("red", true) => AnsiColors::BrightRed,
        ("green", true) => AnsiColors::BrightGreen,
        ("yellow", true) => AnsiColors::BrightYellow,
        ("blue", true) => AnsiColors::BrightBlue,
        ("magenta", true) => AnsiColors::BrightMagenta,
        ("cyan", true) => AnsiColors::BrightCyan,
        ("white", true) => AnsiColors::BrightWhite,
        _ => return None,
    };

    Some(color)
}

/// Expands a color reference, `None` if `name` isn't one
pub fn lookup(name: &str, args: &[&str]) -> Option<String> {
    match (name, args) {
        ("color", [color, ..]) => parse(color).map(fg),
        ("bgcolor", [color, ..]) => parse(color).map(bg),
        ("color:close", _) => Some(fg(AnsiColors::Default)),
        ("bgcolor:close" | "color:bgClose", _) => Some(bg(AnsiColors::Default)),
        _ => named(name),
    }
}

fn named(name: &str) -> Option<String> {
    if let Some(color) = name.strip_prefix("bgcolor:") {
        return parse(color).map(bg);
    }

    let color = name.strip_prefix("color:")?;
    match color.strip_prefix("bg") {
        Some(background) if !background.is_empty() && background.starts_with(char::is_uppercase) => {
            parse(background).map(bg)
        }
        _ => parse(color).map(fg),
    }
}
