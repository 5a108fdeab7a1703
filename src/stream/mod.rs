//! Byte streams tracked by a bar.
//!
//! A [`BarStream`] hands out one [`Stage`] per slot, in order. A stage counts the bytes of one
//! transfer into its slot and redraws the bar with speed and ETA variables on every tick.

mod progress;
mod stage;

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

pub use progress::Progress;
pub use stage::{Stage, StageOptions, Tracked};

use crate::bar::options::{BarOptions, Glyphs, Template};
use crate::bar::render::Pulse;
use crate::bar::{Bar, Levels};
use crate::errors::{Error, Result};
use crate::format::{self, INFINITY};
use crate::printer::{Printer, Sink};
use crate::ratio::SlotSpec;
use crate::speed::{DEFAULT_WINDOW, Speedometer};
use crate::template::Variables;

pub const STREAM_TEMPLATE: [&str; 3] = [
    ":{tag}:{label}",
    " |:{slot:bar}| [:3{slot:percentage}%] (:{slot:eta}) [:{speed}] [:{slot:size}/:{slot:size:total}]",
    " [:{bar}] [:3{percentage}%] (:{eta}) [:{size}/:{size:total}]",
];

pub const UNBOUNDED_TEMPLATE: &str = ":{tag}[:{bar}] [:{flipper}] :{label} (:{slot:runtime}) :{slot:size}";

type TickListener = Box<dyn FnMut(&Progress, &mut Bar) + Send>;
type BarListener = Box<dyn FnMut(&mut Bar) + Send>;

/// Replaces the default update and redraw of every tick
pub type Actor = Box<dyn FnMut(&mut Bar, Update, &Variables) -> Result<()> + Send>;

/// Change a tick makes to the bar
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Update {
    /// Sets a slot to the bytes its stage has transferred
    Slot { index: usize, value: f64 },
    /// Sets the whole bar's completed amount, growing the total first when one is given
    Aggregate { completed: f64, total: Option<u64> },
}

impl Update {
    pub fn apply(self, bar: &mut Bar, template: Option<&Variables>) -> Result<()> {
        match self {
            Update::Slot { index, value } => {
                bar.value_at(index, value, template)?;
            }
            Update::Aggregate { completed, total } => {
                if let Some(total) = total
                    && total > bar.total()
                {
                    bar.set_total(total, None)?;
                }
                bar.value(Levels::Each(vec![completed]), template)?;
            }
        }
        Ok(())
    }

    /// Completed amount and total the bar will have once the update is applied
    fn forecast(&self, bar: &Bar) -> (f64, u64) {
        let completed = bar.average(None).completed;
        match *self {
            Update::Slot { index, value } => {
                let done = bar.slots().get(index).map_or(0.0, |slot| slot.done);
                (completed - done + value, bar.total())
            }
            Update::Aggregate { completed, total } => {
                (completed, total.map_or(bar.total(), |total| total.max(bar.total())))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamOptions {
    pub bar: BarOptions,
    /// Minimum time between two ticks of a stage
    pub interval: Duration,
    /// Unlimited stages adding up into a single slot
    pub infinite: bool,
    /// Pulsate `slot:bar` instead of showing the stage's percentage
    pub pulsate: bool,
    /// Glyphs for `slot:bar`, the bar's own when unset
    pub slot_glyphs: Option<Glyphs>,
    /// IEC units (`KiB`, `MiB`) for sizes and speeds
    pub binary: bool,
    pub speed_window: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            bar: BarOptions::default().template(STREAM_TEMPLATE.to_vec()),
            interval: Duration::from_millis(100),
            infinite: false,
            pulsate: false,
            slot_glyphs: None,
            binary: false,
            speed_window: DEFAULT_WINDOW,
        }
    }
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bar(mut self, bar: BarOptions) -> Self {
        self.bar = bar;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn infinite(mut self, infinite: bool) -> Self {
        self.infinite = infinite;
        self
    }
}

#[derive(Default)]
struct Listeners {
    tick: Vec<TickListener>,
    complete: Vec<BarListener>,
    end: Vec<BarListener>,
}

struct Core {
    bar: Bar,
    speed: Speedometer,
    slot_pulse: Pulse,
    slot_glyphs: Option<Glyphs>,
    listeners: Listeners,
    actor: Option<Actor>,
    aggregate: bool,
    unbounded: bool,
    pulsate: bool,
    binary: bool,
}

impl Core {
    fn tick(&mut self, index: usize, progress: &Progress, stage: &Variables) -> Result<()> {
        let speed = self.speed.push(progress.delta);
        if self.bar.is_ended() {
            bail!(Error::BarEnded)
        }

        let update = self.update(index, progress);
        let (completed, total) = update.forecast(&self.bar);
        let vars = self.variables(progress, speed, completed, total).merged(stage);
        match &mut self.actor {
            Some(actor) => actor(&mut self.bar, update, &vars)?,
            None => update.apply(&mut self.bar, Some(&vars))?,
        }

        for listener in &mut self.listeners.tick {
            listener(progress, &mut self.bar);
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.bar.is_complete() {
            for listener in &mut self.listeners.complete {
                listener(&mut self.bar);
            }
        }
        for listener in &mut self.listeners.end {
            listener(&mut self.bar);
        }
    }

    fn update(&self, index: usize, progress: &Progress) -> Update {
        if !self.aggregate {
            return Update::Slot {
                index,
                value: progress.transferred as f64,
            };
        }

        let completed = self.bar.average(None).completed + progress.delta as f64;
        Update::Aggregate {
            completed,
            total: self.unbounded.then(|| (completed.ceil() as u64).max(1)),
        }
    }

    fn variables(&mut self, progress: &Progress, speed: f64, completed: f64, total: u64) -> Variables {
        let binary = self.binary;
        let eta = format::eta(total as f64 - completed, speed);
        let runtime = progress.runtime.as_secs_f64();
        let percentage = match (self.pulsate, progress.length) {
            (false, Some(_)) => Some(progress.percentage),
            _ => None,
        };
        let slot_bar = self
            .bar
            .render_segment(self.slot_glyphs.as_ref(), percentage, &mut self.slot_pulse);
        let length = progress.length;

        Variables::new()
            .with("eta", format::duration(eta))
            .with("eta:raw", format::number(eta.round()))
            .with("size", format::bytes(completed.round() as u64, binary))
            .with("size:total", format::bytes(total, binary))
            .with("speed", format::speed(speed, binary))
            .with("speed:raw", format::number(speed))
            .with("slot:bar", slot_bar)
            .with("slot:eta", format::duration(progress.eta))
            .with("slot:eta:raw", format::number(progress.eta))
            .with("slot:speed", format::speed(progress.speed, binary))
            .with("slot:speed:raw", format::number(progress.speed))
            .with("slot:size", format::bytes(progress.transferred, binary))
            .with("slot:size:raw", progress.transferred)
            .with(
                "slot:size:total",
                length.map_or(INFINITY.to_string(), |length| format::bytes(length, binary)),
            )
            .with(
                "slot:size:total:raw",
                length.map_or(INFINITY.to_string(), |length| length.to_string()),
            )
            .with("slot:runtime", format::duration(runtime))
            .with("slot:runtime:raw", format::number(runtime))
            .with("slot:percentage", format!("{:.0}", progress.percentage))
    }
}

fn lock(core: &Mutex<Core>) -> MutexGuard<'_, Core> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out stages over the slots of a shared bar
pub struct BarStream {
    core: Arc<Mutex<Core>>,
    cursor: usize,
    aggregate: bool,
    interval: Duration,
    window: Duration,
}

impl BarStream {
    pub fn new(total: u64, slots: impl Into<SlotSpec>, opts: StreamOptions) -> Result<Self> {
        Self::build(Some(total), slots.into(), opts, Printer::default())
    }

    /// A stream of unknown size: the bar pulsates and its total grows with the data
    pub fn unbounded(opts: StreamOptions) -> Result<Self> {
        Self::build(None, SlotSpec::Single, opts, Printer::default())
    }

    /// Like [`BarStream::new`], unbounded without a total, drawing to `sink`
    pub fn with_sink(
        total: Option<u64>,
        slots: impl Into<SlotSpec>,
        opts: StreamOptions,
        sink: impl Sink + 'static,
    ) -> Result<Self> {
        Self::build(total, slots.into(), opts, Printer::new(sink))
    }

    /// Streams into an existing bar, keeping its options
    pub fn from_bar(bar: Bar, opts: StreamOptions) -> Self {
        Self::assemble(bar, opts, false)
    }

    fn build(total: Option<u64>, slots: SlotSpec, mut opts: StreamOptions, printer: Printer) -> Result<Self> {
        let unbounded = total.is_none();
        let slots = match opts.infinite || unbounded {
            true => SlotSpec::Single,
            false => slots,
        };
        if unbounded {
            opts.bar.pulsate = true;
            if opts.bar.template == Template::from(STREAM_TEMPLATE.to_vec()) {
                opts.bar.template = UNBOUNDED_TEMPLATE.into();
            }
        }

        let bar = Bar::with_printer(total.unwrap_or(1), slots, opts.bar.clone(), printer)?;
        Ok(Self::assemble(bar, opts, unbounded))
    }

    fn assemble(bar: Bar, opts: StreamOptions, unbounded: bool) -> Self {
        let aggregate = opts.infinite || unbounded;
        let core = Core {
            slot_pulse: Pulse::new(bar.options().glyphs.pulsate_length),
            bar,
            speed: Speedometer::new(opts.speed_window),
            slot_glyphs: opts.slot_glyphs,
            listeners: Listeners::default(),
            actor: None,
            aggregate,
            unbounded,
            pulsate: opts.pulsate,
            binary: opts.binary,
        };

        Self {
            core: Arc::new(Mutex::new(core)),
            cursor: 0,
            aggregate,
            interval: opts.interval,
            window: opts.speed_window,
        }
    }

    /// Runs `f` with the bar locked
    pub fn with_bar<R>(&self, f: impl FnOnce(&mut Bar) -> R) -> R {
        f(&mut lock(&self.core).bar)
    }

    /// The stage for the next slot. `size` defaults to the slot's remaining capacity and may
    /// not exceed it, unless the stream is infinite or unbounded.
    pub fn next(&mut self, size: Option<u64>, options: StageOptions) -> Result<Stage> {
        let (index, length) = {
            let core = lock(&self.core);
            match self.aggregate {
                true => (0, size),
                false => {
                    let index = self.cursor;
                    let slot = core.bar.slots().get(index).ok_or(Error::StreamExhausted)?;
                    let max = slot.remaining().floor() as u64;
                    match size {
                        Some(size) if size > max => bail!(Error::SizeExceedsCapacity { size, max }),
                        size => (index, Some(size.unwrap_or(max))),
                    }
                }
            }
        };
        if !self.aggregate {
            self.cursor += 1;
        }

        debug!(index, ?length, "stage started");
        Ok(Stage::new(
            self.core.clone(),
            index,
            length,
            self.interval,
            self.window,
            options,
        ))
    }

    pub fn end(&self, message: Option<&str>) -> Result<()> {
        lock(&self.core).bar.end(message)?;
        Ok(())
    }

    pub fn print(&self, message: &str) -> Result<()> {
        lock(&self.core).bar.print(message)?;
        Ok(())
    }

    pub fn binary_units(self, binary: bool) -> Self {
        lock(&self.core).binary = binary;
        self
    }

    pub fn on_tick(self, listener: impl FnMut(&Progress, &mut Bar) + Send + 'static) -> Self {
        lock(&self.core).listeners.tick.push(Box::new(listener));
        self
    }

    /// Called when a stage ends with the bar complete
    pub fn on_complete(self, listener: impl FnMut(&mut Bar) + Send + 'static) -> Self {
        lock(&self.core).listeners.complete.push(Box::new(listener));
        self
    }

    /// Called whenever a stage ends
    pub fn on_end(self, listener: impl FnMut(&mut Bar) + Send + 'static) -> Self {
        lock(&self.core).listeners.end.push(Box::new(listener));
        self
    }

    pub fn actor(self, actor: impl FnMut(&mut Bar, Update, &Variables) -> Result<()> + Send + 'static) -> Self {
        lock(&self.core).actor = Some(Box::new(actor));
        self
    }
}

pub fn is_bar(value: &dyn Any) -> bool {
    value.is::<Bar>()
}

/// A stage handed out by a [`BarStream`]
pub fn is_bar_stream(value: &dyn Any) -> bool {
    value.is::<Stage>()
}

/// A [`BarStream`] itself
pub fn is_bar_gen(value: &dyn Any) -> bool {
    value.is::<BarStream>()
}

pub fn is_bar_related(value: &dyn Any) -> bool {
    is_bar(value) || is_bar_stream(value) || is_bar_gen(value)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt, copy};

    use super::*;
    use crate::bar::options::BarLength;
    use crate::printer::Capture;

    fn options() -> StreamOptions {
        let bar = StreamOptions::default().bar.length(BarLength::Fixed(10));
        StreamOptions::default().bar(bar).interval(Duration::ZERO)
    }

    fn stream(total: u64, slots: impl Into<SlotSpec>) -> (BarStream, Capture) {
        let capture = Capture::default();
        let stream = BarStream::with_sink(Some(total), slots, options(), capture.clone()).unwrap();
        (stream, capture)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(&mut Bar) + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &mut Bar| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_stages_fill_slots() {
        let (completes, on_complete) = counter();
        let (ends, on_end) = counter();
        let (stream, capture) = stream(10, SlotSpec::Count(2));
        let mut stream = stream.on_complete(on_complete).on_end(on_end);

        for chunk in [b"hello", b"world"] {
            let stage = stream.next(None, StageOptions::new()).unwrap();
            let mut reader = stage.wrap(&chunk[..]);
            let mut out = vec![];
            copy(&mut reader, &mut out).await.unwrap();

            assert_eq!(out, chunk);
            assert!(reader.stage().is_finished());
        }

        assert_eq!(completes.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 2);
        stream.with_bar(|bar| {
            assert!(bar.is_complete());
            assert_eq!(bar.slots().iter().map(|s| s.done).collect::<Vec<_>>(), vec![5.0, 5.0]);
        });
        assert!(capture.contents().contains("[100%]"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stages() {
        let (mut stream, _) = stream(400_000, SlotSpec::Count(4));

        let tasks = (0..4)
            .map(|_| {
                let stage = stream.next(None, StageOptions::new()).unwrap();
                tokio::spawn(async move {
                    let mut reader = stage.wrap(tokio::io::repeat(b'x').take(100_000));
                    copy(&mut reader, &mut tokio::io::sink()).await
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 100_000);
        }

        stream.with_bar(|bar| {
            assert!(bar.is_complete());
            assert_eq!(bar.average(None).completed, 400_000.0);
            assert!(bar.slots().iter().all(|slot| slot.done == 100_000.0));
        });
    }

    #[tokio::test]
    async fn test_from_bar_keeps_options() {
        let capture = Capture::default();
        let opts = BarOptions::default()
            .label("Saving")
            .length(BarLength::Fixed(10))
            .template(":{label} :{slot:size}");
        let bar = Bar::with_sink(8, SlotSpec::Count(2), opts, capture.clone()).unwrap();
        let mut stream = BarStream::from_bar(bar, StreamOptions::default().interval(Duration::ZERO));

        let stage = stream.next(None, StageOptions::new()).unwrap();
        assert_eq!(stage.length(), Some(4));
        copy(&mut stage.wrap(&b"abcd"[..]), &mut tokio::io::sink())
            .await
            .unwrap();

        stream.with_bar(|bar| {
            assert_eq!(bar.options().template, Template::from(":{label} :{slot:size}"));
            assert_eq!(bar.slots()[0].done, 4.0);
            assert_eq!(bar.slots()[1].done, 0.0);
        });
        assert!(capture.contents().contains("Saving 4 B"));
    }

    #[tokio::test]
    async fn test_stage_variables() {
        let (mut stream, capture) = stream(4, SlotSpec::Single);
        let stage = stream
            .next(None, StageOptions::new().variable("tag", "copying a"))
            .unwrap();
        copy(&mut stage.wrap(&b"abcd"[..]), &mut tokio::io::sink())
            .await
            .unwrap();

        let contents = capture.contents();
        assert!(contents.contains("copying a\nLoading"));
        assert!(contents.contains("4 B/4 B"));
    }

    #[test]
    fn test_oversized_stage() {
        let (mut stream, _) = stream(100, SlotSpec::Count(2));

        assert!(matches!(
            stream.next(Some(60), StageOptions::new()),
            Err(Error::SizeExceedsCapacity { size: 60, max: 50 })
        ));
        assert_eq!(stream.next(Some(20), StageOptions::new()).unwrap().length(), Some(20));
        assert_eq!(stream.next(None, StageOptions::new()).unwrap().length(), Some(50));
        assert!(matches!(
            stream.next(None, StageOptions::new()),
            Err(Error::StreamExhausted)
        ));
    }

    #[tokio::test]
    async fn test_ended_bar_fails_stage() {
        let (mut stream, _) = stream(10, SlotSpec::Single);
        let stage = stream.next(None, StageOptions::new()).unwrap();
        stream.end(None).unwrap();

        let err = copy(&mut stage.wrap(&b"data"[..]), &mut tokio::io::sink())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("has been ended"));
    }

    #[tokio::test]
    async fn test_stage_error_ends_bar() {
        let (mut stream, capture) = stream(4, SlotSpec::Single);
        let stage = stream.next(None, StageOptions::new()).unwrap();

        let err = copy(&mut stage.wrap(&b"too long"[..]), &mut tokio::io::sink())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("more than it can hold"));
        assert!(stream.with_bar(|bar| bar.is_ended()));
        assert!(capture.contents().contains("[Bar Error]"));
    }

    #[tokio::test]
    async fn test_unbounded_grows() {
        let capture = Capture::default();
        let (completes, on_complete) = counter();
        let mut stream = BarStream::with_sink(None, SlotSpec::Single, options(), capture.clone())
            .unwrap()
            .on_complete(on_complete);

        let stage = stream.next(None, StageOptions::new()).unwrap();
        let mut writer = stage.wrap(Vec::new());
        for chunk in [&b"abc"[..], b"defgh", b"ij"] {
            writer.write_all(chunk).await.unwrap();
        }
        writer.shutdown().await.unwrap();

        assert_eq!(writer.get_ref().len(), 10);
        assert_eq!(stream.with_bar(|bar| bar.total()), 10);
        assert_eq!(completes.load(Ordering::SeqCst), 1);
        assert!(stream.with_bar(|bar| bar.options().pulsate));
        assert!(capture.contents().contains("10 B"));
    }

    #[test]
    fn test_infinite_stages() {
        let capture = Capture::default();
        let opts = options().infinite(true);
        let mut stream = BarStream::with_sink(Some(9), SlotSpec::Count(3), opts, capture).unwrap();

        for _ in 0..3 {
            let mut writer = stream.next(None, StageOptions::new()).unwrap().wrap(std::io::sink());
            std::io::Write::write_all(&mut writer, b"abc").unwrap();
            std::io::Write::flush(&mut writer).unwrap();
            assert!(!writer.stage().is_finished());
            assert_eq!(writer.stage().index(), 0);
            assert_eq!(writer.stage().length(), None);
            writer.finish().unwrap();
        }

        stream.with_bar(|bar| {
            assert_eq!(bar.slots().len(), 1);
            assert!(bar.is_complete());
        });
    }

    #[test]
    fn test_std_read_and_flush() {
        let (mut stream, _) = stream(6, SlotSpec::Count(2));

        let mut reader = stream.next(None, StageOptions::new()).unwrap().wrap(&b"abc"[..]);
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        assert!(reader.stage().is_finished());

        let mut writer = stream.next(None, StageOptions::new()).unwrap().wrap(Vec::new());
        std::io::Write::write_all(&mut writer, b"def").unwrap();
        assert!(!writer.stage().is_finished());
        std::io::Write::flush(&mut writer).unwrap();
        assert!(writer.stage().is_finished());

        assert!(stream.with_bar(|bar| bar.is_complete()));
    }

    #[tokio::test]
    async fn test_actor_replaces_update() {
        let capture = Capture::default();
        let seen = Arc::new(Mutex::new(vec![]));
        let recorded = seen.clone();
        let mut stream = BarStream::with_sink(Some(8), SlotSpec::Single, options(), capture.clone())
            .unwrap()
            .actor(move |bar, update, vars| {
                recorded.lock().unwrap().push(update);
                assert!(vars.contains("slot:eta"));
                update.apply(bar, None)
            });

        let stage = stream.next(None, StageOptions::new()).unwrap();
        copy(&mut stage.wrap(&b"12345678"[..]), &mut tokio::io::sink())
            .await
            .unwrap();

        assert_eq!(
            seen.lock().unwrap().last(),
            Some(&Update::Slot { index: 0, value: 8.0 })
        );
        assert!(capture.contents().is_empty());
    }

    #[tokio::test]
    async fn test_on_tick() {
        let ticks = Arc::new(Mutex::new(vec![]));
        let recorded = ticks.clone();
        let (stream, _) = stream(3, SlotSpec::Single);
        let mut stream = stream.on_tick(move |progress, _| recorded.lock().unwrap().push(progress.transferred));

        let stage = stream.next(None, StageOptions::new()).unwrap();
        copy(&mut stage.wrap(&b"xyz"[..]), &mut tokio::io::sink())
            .await
            .unwrap();

        assert_eq!(ticks.lock().unwrap().last(), Some(&3));
    }

    #[test]
    fn test_predicates() {
        let (mut stream, _) = stream(10, SlotSpec::Single);
        let stage = stream.next(None, StageOptions::new()).unwrap();
        let bar = Bar::with_sink(1, SlotSpec::Single, BarOptions::default(), Capture::default()).unwrap();

        assert!(is_bar(&bar));
        assert!(is_bar_stream(&stage));
        assert!(is_bar_gen(&stream));
        assert!(is_bar_related(&bar) && is_bar_related(&stage) && is_bar_related(&stream));
        assert!(!is_bar_related(&"bar"));
        assert!(!is_bar_stream(&bar));
    }
}
