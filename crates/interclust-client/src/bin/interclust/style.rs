//! Console colors. Output stays plain when the stream is not a terminal.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy)]
pub enum Tone {
    Ok,
    Warn,
    Fail,
    Accent,
    Muted,
}

/// Paints text bound for stdout.
pub fn out(tone: Tone, text: impl AsRef<str>) -> String {
    paint(tone, text.as_ref(), std::io::stdout().is_terminal())
}

/// Paints text bound for stderr.
pub fn err(tone: Tone, text: impl AsRef<str>) -> String {
    paint(tone, text.as_ref(), std::io::stderr().is_terminal())
}

fn paint(tone: Tone, text: &str, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    match tone {
        Tone::Ok => text.green().to_string(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Fail => text.red().to_string(),
        Tone::Accent => text.cyan().to_string(),
        Tone::Muted => text.dimmed().to_string(),
    }
}
