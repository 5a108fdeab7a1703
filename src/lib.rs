//! Multi-slot progress bars for the terminal.
//!
//! A [`Bar`] splits its total into slots that progress independently. Every mutation given a
//! template redraws the bar in place, and messages printed through the bar stay above it.
//! A [`BarStream`] ties the slots to byte streams and reports speed and ETA.
//!
//! ```no_run
//! use slotbar::{Bar, BarOptions, SlotSpec, Variables};
//!
//! let mut bar = Bar::new(100, SlotSpec::Count(2), BarOptions::default().label("Copying"))?;
//! bar.tick(50.0, Some(&Variables::new()))?;
//! bar.end(Some(":{color(green)}done:{color:close}"))?;
//! # Ok::<(), slotbar::Error>(())
//! ```

#[macro_use]
mod macros;

pub mod bar;
pub mod colors;
pub mod errors;
pub mod format;
pub mod printer;
pub mod ratio;
pub mod speed;
pub mod stream;
pub mod template;

pub use bar::options::{BarLength, BarOptions, Glyphs, Template};
pub use bar::{Average, Bar, Levels};
pub use errors::{Error, Result};
pub use printer::{Capture, Sink, TermSink};
pub use ratio::{SlotSpec, slots_by_count, slots_by_percentage};
pub use stream::{
    BarStream, Progress, Stage, StageOptions, StreamOptions, Tracked, Update, is_bar, is_bar_gen,
    is_bar_related, is_bar_stream,
};
pub use template::{Value, Variables};
