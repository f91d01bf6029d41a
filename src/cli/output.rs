//! Event sink for the terminal
//!
//! Renders bus events either as styled console lines or as one JSON object
//! per line. Findings, errors and fatal events are always printed; info is
//! hidden by `--quiet`, debug needs `-v` and trace needs `-vv`.

use crate::config::OutputFormat;
use crate::events::{Event, FileResult, ShareResult};
use crate::rules::Triage;
use console::{StyledObject, style};
use std::fmt::Display;
use std::io::{self, Write};

/// Output handler for crawl events
pub struct Output {
    format: OutputFormat,
    verbose: u8,
    quiet: bool,
    color: bool,
    fatal_seen: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: u8, quiet: bool) -> Self {
        Self {
            format,
            verbose,
            quiet,
            color: atty::is(atty::Stream::Stdout),
            fatal_seen: false,
        }
    }

    /// Disable or force ANSI styling regardless of the terminal
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Whether a `Fatal` event has been handled
    pub fn saw_fatal(&self) -> bool {
        self.fatal_seen
    }

    /// Print one event; write failures (closed pipe) are ignored
    pub fn handle(&mut self, event: &Event) {
        if matches!(event, Event::Fatal(_)) {
            self.fatal_seen = true;
        }

        let Some(line) = self.render(event) else {
            return;
        };
        let to_stderr = self.format == OutputFormat::Plain
            && matches!(event, Event::Error(_) | Event::Fatal(_));
        if to_stderr {
            let _ = writeln!(io::stderr().lock(), "{line}");
        } else {
            let _ = writeln!(io::stdout().lock(), "{line}");
        }
    }

    /// Render an event, or `None` when the current verbosity hides it
    pub fn render(&self, event: &Event) -> Option<String> {
        if !self.is_visible(event) {
            return None;
        }

        match self.format {
            OutputFormat::Json => match serde_json::to_string(event) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::warn!("Couldn't serialize event: {e}");
                    None
                }
            },
            OutputFormat::Plain => Some(self.render_plain(event)),
        }
    }

    fn is_visible(&self, event: &Event) -> bool {
        match event {
            Event::Trace(_) => self.verbose >= 2,
            Event::Debug(_) => self.verbose >= 1,
            Event::Info(_) => !self.quiet,
            Event::Finish => !self.quiet && self.format == OutputFormat::Json,
            Event::ShareResult(_) | Event::FileResult(_) | Event::Error(_) | Event::Fatal(_) => {
                true
            }
        }
    }

    fn render_plain(&self, event: &Event) -> String {
        match event {
            Event::Trace(message) => format!("{} {}", self.paint("[Trace]").dim(), message),
            Event::Debug(message) => format!("{} {}", self.paint("[Debug]").dim(), message),
            Event::Info(message) => format!("{} {}", self.paint("[Info]").blue(), message),
            Event::Error(message) => format!("{} {}", self.paint("[Error]").red(), message),
            Event::Fatal(message) => format!(
                "{} {}",
                self.paint("[Fatal]").red().bold(),
                self.paint(message).red().bold()
            ),
            Event::ShareResult(share) => self.render_share(share),
            Event::FileResult(file) => self.render_file(file),
            Event::Finish => "[Finish]".to_string(),
        }
    }

    fn render_share(&self, share: &ShareResult) -> String {
        let mut line = format!(
            "{} {} {}",
            self.paint("[Share]").cyan().bold(),
            self.triage(share.triage),
            self.paint(&share.path).underlined()
        );
        if let Some(description) = &share.description {
            line.push_str(&format!(" ({description})"));
        }
        if let Some(rule) = &share.rule {
            line.push_str(&format!(" {}", self.paint(format!("<{rule}>")).dim()));
        }
        line
    }

    fn render_file(&self, file: &FileResult) -> String {
        let mut line = format!(
            "{} {} {} {} {} {}",
            self.paint("[File]").green().bold(),
            self.triage(file.triage),
            self.paint(format!("<{}>", file.rule.name)).dim(),
            file.rw,
            self.paint(format_size(file.size)).yellow(),
            self.paint(file.path.display()).underlined()
        );
        if let Some(context) = &file.context {
            line.push_str(&format!(" {}", self.paint(context).dim()));
        }
        line
    }

    fn triage(&self, triage: Triage) -> StyledObject<String> {
        let label = self.paint(format!("{{{}}}", triage.as_str().to_uppercase()));
        match triage {
            Triage::Black => label.magenta().bold(),
            Triage::Red => label.red().bold(),
            Triage::Yellow => label.yellow(),
            Triage::Green => label.green(),
        }
    }

    fn paint<D: Display>(&self, value: D) -> StyledObject<D> {
        style(value).force_styling(self.color)
    }
}

/// Human-readable byte count with one decimal above a kilobyte
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1}{}", UNITS[unit])
}
