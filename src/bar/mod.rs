//! The bar controller: slot state, mutations and drawing.

pub mod options;
pub mod render;
pub mod slot;

use tracing::debug;

use crate::errors::{Error, Result};
use crate::printer::{Printer, Sink};
use crate::ratio::{self, SlotSpec};
use crate::template::{self, Variables};

use options::{BarLength, BarOptions, default_variables};
use render::Pulse;
use slot::Slot;

/// Per-slot inputs to a mutation: one value for every slot, or a value per leading slot
#[derive(Clone, Debug, PartialEq)]
pub enum Levels {
    All(f64),
    Each(Vec<f64>),
}

impl Levels {
    fn expand(self, count: usize) -> Result<Vec<f64>> {
        match self {
            Levels::All(value) => Ok(vec![value; count]),
            Levels::Each(values) if values.len() > count => bail!(Error::NoSlot(count)),
            Levels::Each(values) => Ok(values),
        }
    }
}

impl From<f64> for Levels {
    fn from(value: f64) -> Self {
        Levels::All(value)
    }
}

impl From<Vec<f64>> for Levels {
    fn from(values: Vec<f64>) -> Self {
        Levels::Each(values)
    }
}

impl<const N: usize> From<[f64; N]> for Levels {
    fn from(values: [f64; N]) -> Self {
        Levels::Each(values.to_vec())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Average {
    pub completed: f64,
    pub remaining: f64,
    pub percentage: f64,
}

#[derive(Debug)]
struct Appended {
    bar: Bar,
    inherit: bool,
}

#[derive(Debug)]
pub struct Bar {
    total: u64,
    slots: Vec<Slot>,
    label: String,
    opts: BarOptions,
    children: Vec<Appended>,
    pub(crate) ended: bool,
    is_child: bool,
    flipper_count: usize,
    pulse: Pulse,
    printer: Printer,
}

impl Bar {
    /// A bar drawing to the process wide terminal
    pub fn new(total: u64, slots: impl Into<SlotSpec>, opts: BarOptions) -> Result<Self> {
        Self::with_printer(total, slots.into(), opts, Printer::default())
    }

    /// A bar drawing to `sink`
    pub fn with_sink(
        total: u64,
        slots: impl Into<SlotSpec>,
        opts: BarOptions,
        sink: impl Sink + 'static,
    ) -> Result<Self> {
        Self::with_printer(total, slots.into(), opts, Printer::new(sink))
    }

    pub(crate) fn with_printer(total: u64, slots: SlotSpec, opts: BarOptions, printer: Printer) -> Result<Self> {
        if total == 0 {
            bail!(Error::InvalidTotal(total))
        }

        let slots = slots.allocate(total).into_iter().map(Slot::new).collect();
        Ok(Self {
            total,
            slots,
            label: opts.label.clone(),
            pulse: Pulse::new(opts.glyphs.pulsate_length),
            opts,
            children: vec![],
            ended: false,
            is_child: false,
            flipper_count: 0,
            printer,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = label.into();
        self
    }

    /// Width of the bar in columns for the current terminal
    pub fn length(&self) -> usize {
        self.opts.length.resolve(self.printer.columns())
    }

    pub fn set_length(&mut self, length: BarLength) -> &mut Self {
        self.opts.length = length;
        self
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Changes the total, resizing every slot in proportion and keeping their percentages
    pub fn set_total(&mut self, total: u64, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        if total == 0 {
            bail!(Error::InvalidTotal(total))
        }
        let completed = self.average(None).completed;
        if (total as f64) < completed {
            bail!(Error::TotalBelowCompleted { total, completed })
        }

        let weights = self.slots.iter().map(|s| s.max as f64).collect::<Vec<_>>();
        for (slot, max) in self.slots.iter_mut().zip(ratio::pad_ratio(&weights, total)) {
            slot.done = match slot.max {
                0 => 0.0,
                old => (slot.done * max as f64 / old as f64).min(max as f64),
            };
            slot.max = max;
        }
        self.total = total;

        self.render_if(template)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn options(&self) -> &BarOptions {
        &self.opts
    }

    /// Adds percentage points to the slots, stopping at 100
    pub fn tick(&mut self, levels: impl Into<Levels>, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        let deltas = levels.into().expand(self.slots.len())?;
        let levels = deltas
            .into_iter()
            .zip(&self.slots)
            .map(|(delta, slot)| {
                let delta = delta.floor();
                if delta.is_nan() || delta < 0.0 {
                    bail!(Error::PercentageOutOfRange(delta))
                }
                Ok((slot.percentage() + delta).min(100.0))
            })
            .collect::<Result<Vec<_>>>()?;

        self.percentage(levels, template)
    }

    /// Adds raw amounts to the slots
    pub fn tick_value(&mut self, values: impl Into<Levels>, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        let deltas = values.into().expand(self.slots.len())?;
        let values = deltas
            .into_iter()
            .zip(&self.slots)
            .enumerate()
            .map(|(index, (delta, slot))| {
                let delta = delta.floor();
                if delta.is_nan() || delta < 0.0 {
                    bail!(Error::NegativeValue { index, value: delta })
                }
                Ok(slot.done + delta)
            })
            .collect::<Result<Vec<_>>>()?;

        self.value(values, template)
    }

    /// Sets the completion of the slots, in percent
    pub fn percentage(&mut self, levels: impl Into<Levels>, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        let levels = levels.into().expand(self.slots.len())?;
        for level in &levels {
            check_percentage(*level)?;
        }

        for (slot, level) in self.slots.iter_mut().zip(levels) {
            slot.done = level / 100.0 * slot.max as f64;
        }
        self.render_if(template)
    }

    pub fn percentage_at(&mut self, index: usize, level: f64, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        check_percentage(level)?;
        let slot = self.slots.get_mut(index).ok_or(Error::NoSlot(index))?;

        slot.done = level / 100.0 * slot.max as f64;
        self.render_if(template)
    }

    /// Sets the completed amount of the slots
    pub fn value(&mut self, values: impl Into<Levels>, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        let values = values.into().expand(self.slots.len())?;
        for (index, (value, slot)) in values.iter().zip(&self.slots).enumerate() {
            check_value(index, *value, slot)?;
        }

        for (slot, value) in self.slots.iter_mut().zip(values) {
            slot.done = value;
        }
        self.render_if(template)
    }

    pub fn value_at(&mut self, index: usize, value: f64, template: Option<&Variables>) -> Result<&mut Self> {
        ensure_active!(self);
        let slot = self.slots.get_mut(index).ok_or(Error::NoSlot(index))?;
        check_value(index, value, slot)?;

        slot.done = value;
        self.render_if(template)
    }

    /// Completed, remaining and percentage over all slots, rounded to `fixed_point` digits
    pub fn average(&self, fixed_point: Option<u32>) -> Average {
        let completed = self.slots.iter().map(|s| s.done).sum::<f64>();
        let average = Average {
            completed,
            remaining: self.total as f64 - completed,
            percentage: completed / self.total as f64 * 100.0,
        };

        match fixed_point {
            Some(digits) => Average {
                completed: round_to!(average.completed, digits),
                remaining: round_to!(average.remaining, digits),
                percentage: round_to!(average.percentage, digits),
            },
            None => average,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Slot::is_complete)
    }

    pub fn is_slot_complete(&self, index: usize) -> Result<bool> {
        let slot = self.slots.get(index).ok_or(Error::NoSlot(index))?;
        Ok(slot.is_complete())
    }

    pub fn is_active(&self) -> bool {
        !self.is_complete()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_active() && self.average(None).completed == 0.0
    }

    pub fn is_child(&self) -> bool {
        self.is_child
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Draws `child` beneath this bar from now on. An inheriting child is rendered with the
    /// same overrides this bar is drawn with.
    pub fn append(&mut self, mut child: Bar, inherit: bool) -> &mut Self {
        child.is_child = true;
        self.children.push(Appended { bar: child, inherit });
        self
    }

    pub fn children(&self) -> impl Iterator<Item = &Bar> {
        self.children.iter().map(|appended| &appended.bar)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Bar> {
        self.children.get_mut(index).map(|appended| &mut appended.bar)
    }

    /// Makes the bar immutable, printing `message` once
    pub fn end(&mut self, message: Option<&str>) -> Result<&mut Self> {
        if self.ended {
            return Ok(self);
        }
        self.ended = true;
        debug!(label = %self.label, completed = self.average(None).completed, "bar ended");

        if message.is_some() || self.printer.has_drawn() {
            let message = message.map(|message| self.parse_string(message, None));
            let (clean, colorize) = (self.opts.clean, self.opts.glyphs.colorize);
            self.printer.finish(message.as_deref(), clean, colorize)?;
        }
        Ok(self)
    }

    /// Empties one slot, or all of them
    pub fn drain(&mut self, index: Option<usize>) -> Result<&mut Self> {
        ensure_active!(self);
        match index {
            Some(index) => self.slots.get_mut(index).ok_or(Error::NoSlot(index))?.done = 0.0,
            None => self.slots.iter_mut().for_each(|slot| slot.done = 0.0),
        }
        Ok(self)
    }

    /// Draws the bar and its children, replacing the previous frame
    pub fn draw(&mut self, template: Option<&Variables>) -> Result<&mut Self> {
        let lines = self.frame(template);
        self.printer.frame(lines, self.opts.glyphs.colorize)?;
        Ok(self)
    }

    /// Prints `message` above the bar
    pub fn print(&mut self, message: &str) -> Result<&mut Self> {
        let message = self.parse_string(message, None);
        self.printer.interrupt(&message, self.opts.glyphs.colorize)?;
        Ok(self)
    }

    /// Renders `text` with the bar's variables
    pub fn parse_string(&self, text: &str, template: Option<&Variables>) -> String {
        match template {
            Some(template) => template::render(text, &self.variables(), template),
            None => template::render(text, &self.variables(), &Variables::new()),
        }
    }

    fn variables(&self) -> Variables {
        default_variables().merged(&self.opts.variables)
    }

    fn frame(&mut self, template: Option<&Variables>) -> Vec<String> {
        let mut lines = self
            .construct_bar(template)
            .split('\n')
            .map(String::from)
            .collect::<Vec<_>>();
        for child in &mut self.children {
            let overrides = if child.inherit { template } else { None };
            lines.extend(child.bar.frame(overrides));
        }

        lines
    }

    fn render_if(&mut self, template: Option<&Variables>) -> Result<&mut Self> {
        match template {
            Some(template) => self.draw(Some(template)),
            None => Ok(self),
        }
    }
}

fn check_percentage(level: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&level) {
        bail!(Error::PercentageOutOfRange(level))
    }
    Ok(())
}

fn check_value(index: usize, value: f64, slot: &Slot) -> Result<()> {
    if value.is_nan() || value < 0.0 {
        bail!(Error::NegativeValue { index, value })
    }
    if value > slot.max as f64 {
        bail!(Error::ValueOutOfRange {
            index,
            value,
            max: slot.max,
        })
    }
    Ok(())
}
