//! Terminal output and the redraw protocol.
//!
//! A frame is the rendered bar, possibly spanning several lines. Every new frame replaces the
//! previous one: the cursor goes back to the first line of the old frame and the screen is
//! cleared from there. Interrupting messages are written above the frame, which is then drawn
//! again beneath them.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use console::Term;
use tracing::debug;

use crate::errors::{Error, Result};

const FALLBACK_COLUMNS: usize = 80;

/// Where frames are written to
pub trait Sink: Send {
    /// Redraws only make sense on an interactive terminal
    fn is_term(&self) -> bool;
    fn columns(&self) -> usize;
    fn write_str(&mut self, text: &str) -> io::Result<()>;
    fn move_up(&mut self, lines: usize) -> io::Result<()>;
    /// Back to the first column, then clear everything below the cursor
    fn clear_down(&mut self) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct TermSink(Term);

impl TermSink {
    pub fn new(term: Term) -> Self {
        Self(term)
    }

    /// The process wide output, see [`persistent_stdout`]
    pub fn persistent() -> Self {
        Self(persistent_stdout())
    }
}

impl Sink for TermSink {
    fn is_term(&self) -> bool {
        self.0.is_term()
    }

    fn columns(&self) -> usize {
        match self.0.size().1 as usize {
            0 => FALLBACK_COLUMNS,
            columns => columns,
        }
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.0.write_str(text)
    }

    fn move_up(&mut self, lines: usize) -> io::Result<()> {
        if lines > 0 {
            self.0.move_cursor_up(lines)?;
        }
        Ok(())
    }

    fn clear_down(&mut self) -> io::Result<()> {
        self.0.clear_line()?;
        self.0.clear_to_end_of_screen()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// In-memory sink recording every escape sequence literally
#[derive(Debug, Clone)]
pub struct Capture {
    buffer: Arc<Mutex<String>>,
    columns: usize,
    interactive: bool,
}

impl Default for Capture {
    fn default() -> Self {
        Self::new(FALLBACK_COLUMNS)
    }
}

impl Capture {
    pub fn new(columns: usize) -> Self {
        Self {
            buffer: Arc::default(),
            columns,
            interactive: true,
        }
    }

    /// Behaves like redirected output
    pub fn piped() -> Self {
        Self {
            interactive: false,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}

impl Sink for Capture {
    fn is_term(&self) -> bool {
        self.interactive
    }

    fn columns(&self) -> usize {
        self.columns
    }

    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.push(text);
        Ok(())
    }

    fn move_up(&mut self, lines: usize) -> io::Result<()> {
        if lines > 0 {
            self.push(&format!("\x1b[{lines}A"));
        }
        Ok(())
    }

    fn clear_down(&mut self) -> io::Result<()> {
        self.push("\r\x1b[2K\x1b[0J");
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

static STDOUT: OnceLock<Term> = OnceLock::new();

/// Terminal every bar draws to unless given another sink.
///
/// Picked once per process: stdout if it is a terminal, else stderr, else the controlling
/// terminal. It is never acquired again, even if the chosen stream stops being a terminal.
pub fn persistent_stdout() -> Term {
    STDOUT.get_or_init(acquire).clone()
}

fn acquire() -> Term {
    let stdout = Term::stdout();
    if stdout.is_term() {
        debug!("drawing bars to stdout");
        return stdout;
    }

    let stderr = Term::stderr();
    if stderr.is_term() {
        debug!("stdout is not a terminal, drawing bars to stderr");
        return stderr;
    }

    match open_tty() {
        Some(tty) => {
            debug!("drawing bars to /dev/tty");
            tty
        }
        None => {
            debug!("no terminal available, falling back to stdout");
            stdout
        }
    }
}

#[cfg(unix)]
fn open_tty() -> Option<Term> {
    let read = File::open("/dev/tty").ok()?;
    let write = OpenOptions::new().write(true).open("/dev/tty").ok()?;
    let term = Term::read_write_pair(read, write);

    term.is_term().then_some(term)
}

#[cfg(not(unix))]
fn open_tty() -> Option<Term> {
    None
}

pub struct Printer {
    sink: Box<dyn Sink>,
    last: Option<Vec<String>>,
    just_logged: bool,
}

impl fmt::Debug for Printer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Printer")
            .field("last", &self.last)
            .field("just_logged", &self.just_logged)
            .finish_non_exhaustive()
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(TermSink::persistent())
    }
}

impl Printer {
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            last: None,
            just_logged: false,
        }
    }

    pub fn columns(&self) -> usize {
        self.sink.columns()
    }

    /// Whether a frame has been drawn yet
    pub fn has_drawn(&self) -> bool {
        self.last.is_some()
    }

    /// Replaces the previous frame with `lines`
    pub fn frame(&mut self, lines: Vec<String>, colorize: bool) -> Result<()> {
        self.ensure_term()?;
        self.clear()?;
        self.write(&lines.join("\n"), colorize)?;
        self.sink.flush()?;

        self.last = Some(lines);
        self.just_logged = false;
        Ok(())
    }

    /// Writes `message` above the current frame and draws the frame again
    pub fn interrupt(&mut self, message: &str, colorize: bool) -> Result<()> {
        self.ensure_term()?;
        self.clear()?;
        self.write(message, colorize)?;
        self.sink.write_str("\n")?;

        match &self.last {
            Some(lines) => {
                let frame = lines.join("\n");
                self.write(&frame, colorize)?;
                self.just_logged = false;
            }
            None => self.just_logged = true,
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Leaves the last frame on screen, or clears it when `clean`, then writes `message`
    pub fn finish(&mut self, message: Option<&str>, clean: bool, colorize: bool) -> Result<()> {
        self.ensure_term()?;
        if clean {
            self.clear()?;
            self.last = None;
        } else if self.last.is_some() && !self.just_logged {
            self.sink.write_str("\n")?;
        }

        if let Some(message) = message {
            self.write(message, colorize)?;
            if !message.ends_with('\n') {
                self.sink.write_str("\n")?;
            }
        }
        self.sink.flush()?;

        self.just_logged = true;
        Ok(())
    }

    fn ensure_term(&self) -> Result<()> {
        if !self.sink.is_term() {
            bail!(Error::NotATerminal)
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if let Some(lines) = &self.last
            && !self.just_logged
        {
            self.sink.move_up(lines.len().saturating_sub(1))?;
            self.sink.clear_down()?;
        }
        Ok(())
    }

    fn write(&mut self, text: &str, colorize: bool) -> Result<()> {
        match colorize {
            true => self.sink.write_str(text)?,
            false => self.sink.write_str(&console::strip_ansi_codes(text))?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: &str = "\r\x1b[2K\x1b[0J";

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(String::from).collect()
    }

    #[test]
    fn test_frames_overwrite() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("[##--]\n 50%"), true).unwrap();
        printer.frame(lines("[####]\n100%"), true).unwrap();

        assert_eq!(
            capture.contents(),
            format!("[##--]\n 50%\x1b[1A{CLEAR}[####]\n100%")
        );
    }

    #[test]
    fn test_single_line_no_move() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("a"), true).unwrap();
        printer.frame(lines("b"), true).unwrap();

        assert_eq!(capture.contents(), format!("a{CLEAR}b"));
    }

    #[test]
    fn test_interrupt_redraws() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("bar"), true).unwrap();
        printer.interrupt("hello", true).unwrap();
        printer.frame(lines("bar2"), true).unwrap();

        assert_eq!(
            capture.contents(),
            format!("bar{CLEAR}hello\nbar{CLEAR}bar2")
        );
    }

    #[test]
    fn test_interrupt_before_frame() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.interrupt("first", true).unwrap();
        printer.frame(lines("bar"), true).unwrap();

        assert_eq!(capture.contents(), "first\nbar");
    }

    #[test]
    fn test_finish() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("bar"), true).unwrap();
        printer.finish(Some("done"), false, true).unwrap();

        assert_eq!(capture.contents(), "bar\ndone\n");
    }

    #[test]
    fn test_finish_clean() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("bar"), true).unwrap();
        printer.finish(Some("done\n"), true, true).unwrap();

        assert_eq!(capture.contents(), format!("bar{CLEAR}done\n"));
        assert!(!printer.has_drawn());
    }

    #[test]
    fn test_strip_colors() {
        let capture = Capture::default();
        let mut printer = Printer::new(capture.clone());

        printer.frame(lines("\x1b[32mgreen\x1b[39m"), false).unwrap();

        assert_eq!(capture.contents(), "green");
    }

    #[test]
    fn test_not_a_terminal() {
        let mut printer = Printer::new(Capture::piped());

        assert!(matches!(
            printer.frame(lines("bar"), true),
            Err(Error::NotATerminal)
        ));
        assert!(matches!(
            printer.interrupt("msg", true),
            Err(Error::NotATerminal)
        ));
    }
}
