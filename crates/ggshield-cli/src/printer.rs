//! Themed output to a pair of writers.
//!
//! Commands write through a [`Printer`] so their output can be captured in
//! tests. Write failures (a closed pipe) are ignored.

use std::io::{self, Write};

use crate::theme::Theme;

/// Stdout/stderr pair used by commands.
pub(crate) struct Printer<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
}

impl<'a> Printer<'a> {
    pub(crate) fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }

    /// Plain line on stdout.
    pub(crate) fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    /// Empty line on stdout.
    pub(crate) fn blank(&mut self) {
        let _ = writeln!(self.out);
    }

    /// Section heading followed by a separator.
    pub(crate) fn heading(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", Theme::header(text));
        let _ = writeln!(self.out, "{}", Theme::separator());
    }

    pub(crate) fn info(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", Theme::info(text));
    }

    pub(crate) fn success(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", Theme::success(text));
    }

    pub(crate) fn dimmed(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", Theme::dimmed(text));
    }

    pub(crate) fn warning(&mut self, text: &str) {
        let _ = writeln!(self.err, "{}", Theme::warning(text));
    }

    pub(crate) fn error(&mut self, text: &str) {
        let _ = writeln!(self.err, "{}", Theme::error(text));
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}
