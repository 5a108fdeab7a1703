use std::fmt;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, warn};

use super::{Core, lock};
use super::progress::Progress;
use crate::errors::{Error, Result};
use crate::speed::Speedometer;
use crate::template::{Value, Variables};

const ERROR_MESSAGE: &str = ":{color(red)}[Bar Error]:{color:close} An Error occurred";

/// Template variables scoped to a single stage
#[derive(Clone, Debug, Default)]
pub struct StageOptions {
    pub variables: Variables,
}

impl StageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.set(key, value);
        self
    }
}

impl From<Variables> for StageOptions {
    fn from(variables: Variables) -> Self {
        Self { variables }
    }
}

/// Counts the bytes of one transfer into its slot.
///
/// Usually driven through [`Stage::wrap`], which counts whatever passes through a reader or
/// writer.
pub struct Stage {
    core: Arc<Mutex<Core>>,
    index: usize,
    length: Option<u64>,
    transferred: u64,
    pending: u64,
    speed: Speedometer,
    started: Instant,
    last_tick: Option<Instant>,
    interval: Duration,
    variables: Variables,
    finished: bool,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("index", &self.index)
            .field("length", &self.length)
            .field("transferred", &self.transferred)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Stage {
    pub(super) fn new(
        core: Arc<Mutex<Core>>,
        index: usize,
        length: Option<u64>,
        interval: Duration,
        window: Duration,
        options: StageOptions,
    ) -> Self {
        Self {
            core,
            index,
            length,
            transferred: 0,
            pending: 0,
            speed: Speedometer::new(window),
            started: Instant::now(),
            last_tick: None,
            interval,
            variables: options.variables,
            finished: false,
        }
    }

    /// Slot this stage fills
    pub fn index(&self) -> usize {
        self.index
    }

    /// Expected number of bytes, unknown for unbounded stages
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Counts `bytes`, ticking the bar once the interval has passed
    pub fn advance(&mut self, bytes: u64) -> Result<()> {
        self.transferred += bytes;
        self.pending += bytes;

        let now = Instant::now();
        if self.last_tick.is_none_or(|at| now.duration_since(at) >= self.interval) {
            self.tick(now)?;
        }
        Ok(())
    }

    /// Emits the final tick and the completion events. Only the first call has any effect.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if self.pending > 0 || self.last_tick.is_none() {
            self.tick(Instant::now())?;
        }
        debug!(index = self.index, transferred = self.transferred, "stage finished");

        lock(&self.core).finish();
        Ok(())
    }

    /// Counts the bytes read from or written to `inner`
    pub fn wrap<T>(self, inner: T) -> Tracked<T> {
        Tracked { inner, stage: self }
    }

    fn tick(&mut self, now: Instant) -> Result<()> {
        let delta = std::mem::take(&mut self.pending);
        let speed = self.speed.push_at(now, delta);
        let runtime = now.saturating_duration_since(self.started);
        let progress = Progress::new(self.transferred, self.length, delta, runtime, speed);
        self.last_tick = Some(now);

        let mut core = lock(&self.core);
        match core.tick(self.index, &progress, &self.variables) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(index = self.index, "stage failed: {err}");
                if let Err(end) = core.bar.end(Some(&format!("{ERROR_MESSAGE}\n{err}"))) {
                    debug!("couldn't report the stage error: {end}");
                }
                Err(err)
            }
        }
    }

    fn is_full(&self) -> bool {
        self.length.is_some_and(|length| self.transferred >= length)
    }
}

/// A reader or writer whose traffic is counted by a [`Stage`].
///
/// Reading to the end, shutting down, or flushing once the expected length has been written
/// finishes the stage.
#[derive(Debug)]
pub struct Tracked<T> {
    inner: T,
    stage: Stage,
}

impl<T> Tracked<T> {
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Finishes the stage for writers that are never shut down
    pub fn finish(&mut self) -> io::Result<()> {
        self.stage.finish().map_err(Error::into_io)
    }

    fn count(&mut self, bytes: usize, eof: bool) -> io::Result<()> {
        let counted = match eof {
            true => self.stage.finish(),
            false => self.stage.advance(bytes as u64),
        };
        counted.map_err(Error::into_io)
    }

    fn flushed(&mut self) -> io::Result<()> {
        match self.stage.is_full() {
            true => self.stage.finish().map_err(Error::into_io),
            false => Ok(()),
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Tracked<T> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let (before, capacity) = (buf.filled().len(), buf.remaining());
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let read = buf.filled().len() - before;
        Poll::Ready(this.count(read, read == 0 && capacity > 0))
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Tracked<T> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        this.count(written, false)?;

        Poll::Ready(Ok(written))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.inner).poll_flush(cx))?;

        Poll::Ready(this.flushed())
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.inner).poll_shutdown(cx))?;

        Poll::Ready(this.count(0, true))
    }
}

impl<T: Read> Read for Tracked<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count(read, read == 0 && !buf.is_empty())?;

        Ok(read)
    }
}

impl<T: Write> Write for Tracked<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count(written, false)?;

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.flushed()
    }
}
