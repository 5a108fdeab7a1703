use clap::Parser;

use anyhow::{Context, Result};
use slotbar::{BarOptions, BarStream, SlotSpec, StageOptions, StreamOptions, Update};
use tokio::io::{self, AsyncWriteExt};

use super::touch::parse_size;
use crate::config;

/// Copy stdin to stdout, tracking the bytes passing through
#[derive(Parser, Debug)]
pub struct Args {
    /// Expected size of the input, the bar pulsates when unknown
    #[arg(short, long, value_parser = parse_size)]
    pub size: Option<u64>,

    /// Text shown next to the bar
    #[arg(short, long, default_value = "Piping")]
    pub label: String,

    /// Show sizes in KiB, MiB...
    #[arg(short, long)]
    pub binary: bool,
}

/// Stops at the declared size when the input turns out to be longer
fn clamp(bar: &mut slotbar::Bar, update: Update, vars: &slotbar::Variables) -> slotbar::Result<()> {
    let update = match update {
        Update::Slot { index, value } => Update::Slot {
            index,
            value: value.min(bar.total() as f64),
        },
        other => other,
    };

    update.apply(bar, Some(vars))
}

pub async fn execute(cmd: Args) -> Result<()> {
    let glyphs = config::glyphs();

    let mut bars = match cmd.size {
        Some(size) => {
            let bar = BarOptions::default()
                .label(&cmd.label)
                .glyphs(glyphs)
                .template(slotbar::stream::STREAM_TEMPLATE.to_vec());

            BarStream::new(size.max(1), SlotSpec::Single, StreamOptions::new().bar(bar))?.actor(clamp)
        }
        None => {
            let bar = BarOptions::default()
                .label(&cmd.label)
                .glyphs(glyphs)
                .template(slotbar::stream::UNBOUNDED_TEMPLATE);

            BarStream::unbounded(StreamOptions::new().bar(bar))?
        }
    }
    .binary_units(cmd.binary);

    let stage = bars.next(None, StageOptions::new())?;
    let mut reader = stage.wrap(io::stdin());
    let mut stdout = io::stdout();

    io::copy(&mut reader, &mut stdout)
        .await
        .context("Unable to pipe stdin")?;
    stdout.flush().await?;

    let piped = reader.stage().transferred();
    bars.end(Some(&format!("Piped {piped} bytes")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotbar::{Bar, BarLength, Capture};

    #[test]
    fn test_clamp() {
        let opts = BarOptions::default().length(BarLength::Fixed(10));
        let mut bar = Bar::with_sink(100, SlotSpec::Single, opts, Capture::default()).unwrap();
        let vars = slotbar::Variables::new();

        clamp(&mut bar, Update::Slot { index: 0, value: 250.0 }, &vars).unwrap();
        assert!(bar.is_complete());
        assert_eq!(bar.average(None).completed, 100.0);
    }
}
