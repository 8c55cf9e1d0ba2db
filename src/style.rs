//! Terminal styling capability and the status-line reporter.

use console::Style;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
    Heading,
    Muted,
    Accent,
}

/// Decorates text for the terminal. Implementations must never change the
/// visible characters, only how they render.
pub trait TerminalStyle: Send + Sync {
    fn paint(&self, tone: Tone, text: &str) -> String;
}

/// ANSI colours via `console`.
pub struct ConsoleStyle;

impl TerminalStyle for ConsoleStyle {
    fn paint(&self, tone: Tone, text: &str) -> String {
        let style = match tone {
            Tone::Info => Style::new().cyan(),
            Tone::Success => Style::new().green(),
            Tone::Warning => Style::new().yellow(),
            Tone::Error => Style::new().red().bold(),
            Tone::Heading => Style::new().cyan().bold(),
            Tone::Muted => Style::new().dim(),
            Tone::Accent => Style::new().magenta(),
        };
        style.force_styling(true).apply_to(text).to_string()
    }
}

/// Plain text for pipes, dumb terminals and `NO_COLOR`.
pub struct PlainStyle;

impl TerminalStyle for PlainStyle {
    fn paint(&self, _tone: Tone, text: &str) -> String {
        text.to_string()
    }
}

/// Pick once at startup.
pub fn detect() -> Arc<dyn TerminalStyle> {
    if console::colors_enabled() {
        Arc::new(ConsoleStyle)
    } else {
        Arc::new(PlainStyle)
    }
}

/// Prints the one-line outcome every action reports.
#[derive(Clone)]
pub struct Reporter {
    style: Arc<dyn TerminalStyle>,
}

impl Reporter {
    pub fn new(style: Arc<dyn TerminalStyle>) -> Self {
        Self { style }
    }

    pub fn plain() -> Self {
        Self::new(Arc::new(PlainStyle))
    }

    pub fn paint(&self, tone: Tone, text: &str) -> String {
        self.style.paint(tone, text)
    }

    pub fn line(&self, tone: Tone, message: &str) -> String {
        let tag = match tone {
            Tone::Success => "[OK]",
            Tone::Warning => "[WARNING]",
            Tone::Error => "[ERROR]",
            _ => "[INFO]",
        };
        format!("{} {}", self.style.paint(tone, tag), message)
    }

    pub fn info(&self, message: impl AsRef<str>) {
        println!("{}", self.line(Tone::Info, message.as_ref()));
    }

    pub fn success(&self, message: impl AsRef<str>) {
        println!("{}", self.line(Tone::Success, message.as_ref()));
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        println!("{}", self.line(Tone::Warning, message.as_ref()));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        println!("{}", self.line(Tone::Error, message.as_ref()));
    }

    pub fn heading(&self, title: &str) {
        let rule = "=".repeat(60);
        println!();
        println!("{}", self.style.paint(Tone::Heading, title));
        println!("{}", self.style.paint(Tone::Muted, &rule));
    }
}
