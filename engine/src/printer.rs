//! Same-line status reporting (§4.D.1): "Status lines use in-place carriage-return overwrite
//! when stdout is a TTY and the task is non-verbose; verbose/non-TTY uses plain lines." Grounded
//! on `ninja-build::Printer`, itself wrapping `console::Term`.

use std::cell::Cell;
use std::io::Write;

pub struct Printer {
    console: console::Term,
    line_dirty: Cell<bool>,
    quiet: bool,
}

impl Printer {
    pub fn new(quiet: bool) -> Self {
        Printer {
            console: console::Term::stdout(),
            line_dirty: Cell::new(false),
            quiet,
        }
    }

    /// Prints a status line, overwriting the previous one when `sameline` is requested and stdout
    /// is a TTY. "The log component guarantees a newline is emitted before any non-overwrite
    /// output when the previous line was an overwrite."
    pub fn status(&self, message: &str, sameline: bool) {
        if self.quiet {
            return;
        }
        let sameline = sameline && self.console.is_term();
        if sameline {
            let _ = self.console.clear_line();
            let _ = write!(&self.console, "{message}");
            let _ = self.console.flush();
            self.line_dirty.set(true);
        } else {
            self.ensure_fresh_line();
            let _ = self.console.write_line(message);
            self.line_dirty.set(false);
        }
    }

    pub fn line(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.ensure_fresh_line();
        let _ = self.console.write_line(message);
    }

    fn ensure_fresh_line(&self) {
        if self.line_dirty.get() {
            let _ = self.console.write_line("");
            self.line_dirty.set(false);
        }
    }
}

impl Drop for Printer {
    fn drop(&mut self) {
        // Final newline since the status printer itself doesn't end on one.
        if self.line_dirty.get() {
            let _ = self.console.write_line("");
        }
    }
}
