use clap::Parser;

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use slotbar::{Bar, BarOptions, Glyphs, SlotSpec, Variables, slots_by_count};
use tokio::time;

use crate::config;

/// Show a bar filling up at random
#[derive(Parser, Debug)]
pub struct Args {
    /// Total of the bar
    #[arg(default_value = "1024", short, long)]
    pub total: u64,

    /// Number of slots
    #[arg(default_value = "1", short, long)]
    pub slots: usize,

    /// Two colored slots with a header and a separator
    #[arg(short, long)]
    pub colors: bool,

    /// Milliseconds between two ticks
    #[arg(default_value = "800", short, long, env = "SLOTBAR_INTERVAL")]
    pub interval: u64,
}

fn colored(glyphs: Glyphs) -> BarOptions {
    BarOptions::default()
        .glyphs(Glyphs {
            header: "\u{e0b0}".into(),
            separator: "|".into(),
            ..glyphs
        })
        .variable("color:bar:empty", ":{color(yellow)}")
        .variable("color:bar:filled", ":{bgcolor(white)}:{color(red)}")
        .variable("color:bar:header", ":{color(green)}")
        .variable("color:bar:separator", ":{color(red)}")
}

pub async fn execute(cmd: Args) -> Result<()> {
    let glyphs = config::glyphs();

    let (opts, slots, intro) = match cmd.colors {
        true => (
            colored(glyphs),
            SlotSpec::Count(2),
            "Constructing a bar with two slots, a separator, and a header...",
        ),
        false => (
            BarOptions::default().glyphs(glyphs),
            slots_by_count(cmd.slots.max(1)),
            "Constructing a simple bar...",
        ),
    };

    let mut bar = Bar::new(cmd.total, slots, opts)?;
    bar.print(intro)?;

    let mut rng = rand::rng();
    let mut interval = time::interval(Duration::from_millis(cmd.interval.max(1)));
    while !bar.is_complete() {
        interval.tick().await;

        let update = rng.random_range(0.0..20.0_f64).floor();
        let tag = Variables::new().with("tag", format!("Updating with {update} "));
        bar.tick(update, Some(&tag))?;
    }

    bar.end(Some("The bar completed"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbar::{BarLength, Capture};

    #[test]
    fn test_colored() {
        let opts = colored(Glyphs {
            colorize: false,
            ..Glyphs::default()
        })
        .length(BarLength::Fixed(11))
        .template(":{bar}");
        let mut bar = Bar::with_sink(100, SlotSpec::Count(2), opts, Capture::default()).unwrap();
        bar.tick(vec![100.0, 0.0], None).unwrap();

        let line = console::strip_ansi_codes(&bar.construct_bar(None)).into_owned();
        assert!(line.contains('|'));
        assert!(line.contains('\u{e0b0}'));
        assert!(line.starts_with('#'));
    }
}
