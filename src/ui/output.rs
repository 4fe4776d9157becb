//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Diagnostics go to stderr and respect the quiet flag. The primary
//! stdout stream carries only the machine-readable result markers, so
//! batch tooling driving the binary can branch on the outcome without
//! parsing prose.

use std::fmt::Display;

/// Prefix for machine-readable result markers on stdout.
const MARKER_PREFIX: &str = "::slipway::";

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Handle threaded through the pipeline for diagnostics and markers.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    verbosity: Verbosity,
}

impl Output {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Progress message (respects quiet mode).
    pub fn info(&self, message: impl Display) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("{}", message);
        }
    }

    /// Debug message (only in debug mode).
    pub fn debug(&self, message: impl Display) {
        if self.verbosity == Verbosity::Debug {
            eprintln!("[debug] {}", message);
        }
    }

    /// Warning (respects quiet mode).
    pub fn warn(&self, message: impl Display) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("warning: {}", message);
        }
    }

    /// Error (always shown).
    pub fn error(&self, message: impl Display) {
        eprintln!("error: {}", message);
    }

    /// Machine-readable result marker on stdout. Always emitted, even in
    /// quiet mode.
    pub fn marker(&self, fields: &[(&str, &str)]) {
        println!("{}", format_marker(fields));
    }
}

/// Render a marker line: `::slipway:: key=value key="quoted value"`.
fn format_marker(fields: &[(&str, &str)]) -> String {
    let mut line = MARKER_PREFIX.to_string();
    for (key, value) in fields {
        if value.chars().any(|c| c.is_whitespace()) {
            line.push_str(&format!(" {}=\"{}\"", key, value.replace('"', "'")));
        } else {
            line.push_str(&format!(" {}={}", key, value));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        // Quiet wins when both are set.
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
    }

    #[test]
    fn marker_formatting() {
        assert_eq!(
            format_marker(&[("result", "released"), ("version", "1.2.0")]),
            "::slipway:: result=released version=1.2.0"
        );
        assert_eq!(
            format_marker(&[("result", "skipped"), ("reason", "nothing to publish")]),
            "::slipway:: result=skipped reason=\"nothing to publish\""
        );
    }

    #[test]
    fn marker_escapes_quotes() {
        assert_eq!(
            format_marker(&[("reason", "a \"b\" c")]),
            "::slipway:: reason=\"a 'b' c\""
        );
    }
}
