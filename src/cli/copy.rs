use clap::Parser;

use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use futures::stream::StreamExt;
use slotbar::stream::STREAM_TEMPLATE;
use slotbar::{BarOptions, BarStream, Glyphs, StageOptions, StreamOptions, slots_by_count};
use tokio::fs;
use tokio::io::{self, AsyncWriteExt};
use tokio_stream as stream;

use crate::config;

/// Copy a file to one or more destinations
#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct Args {
    /// File to copy
    pub source: PathBuf,

    /// Destination files, or how many `output<N>` copies to make [default: 2]
    pub targets: Vec<String>,

    /// Maximum number of simultaneous copies
    #[arg(default_value = "8", short = 'm', long = "max-concurrent", name = "MAX")]
    pub dim_buff: usize,

    /// Show sizes in KiB, MiB...
    #[arg(short, long)]
    pub binary: bool,
}

/// Expands a lone number into that many `output<N>` names
fn destinations(targets: Vec<String>) -> Vec<String> {
    match targets.as_slice() {
        [] => destinations(vec!["2".into()]),
        [single] => match single.parse::<usize>() {
            Ok(count) => (0..count).map(|i| format!("output{i}")).collect(),
            Err(_) => targets,
        },
        _ => targets,
    }
}

pub async fn execute(cmd: Args) -> Result<()> {
    let files = destinations(cmd.targets);
    ensure!(!files.is_empty(), "Nothing to copy to");

    let size = fs::metadata(&cmd.source)
        .await
        .with_context(|| format!("Unable to read {}", cmd.source.display()))?
        .len();
    ensure!(size > 0, "{} is empty", cmd.source.display());

    let bar = BarOptions::default()
        .label("Copying")
        .template(STREAM_TEMPLATE.to_vec())
        .glyphs(Glyphs {
            separator: "|".into(),
            ..config::glyphs()
        })
        .force_first(files.len() > 20);
    let total = size
        .checked_mul(files.len() as u64)
        .context("Total size overflows")?;

    let mut bars = BarStream::new(total, slots_by_count(files.len()), StreamOptions::new().bar(bar))?
        .binary_units(cmd.binary)
        .on_complete(|bar| super::end_logged(bar, "Bar ended"));

    let source = &cmd.source;
    let results = stream::iter(files)
        .map(|output| {
            let tag = format!("[{} -> {output}] ", source.display());
            let stage = bars.next(None, StageOptions::new().variable("tag", tag));

            async move {
                let mut reader = stage?.wrap(fs::File::open(source).await?);
                let mut dest = fs::File::create(&output).await?;

                io::copy(&mut reader, &mut dest)
                    .await
                    .with_context(|| format!("Unable to copy to {output}"))?;
                dest.flush().await?;

                Ok::<_, anyhow::Error>(())
            }
        })
        .buffer_unordered(cmd.dim_buff.max(1))
        .collect::<Vec<_>>()
        .await;

    bars.end(Some("Process complete"))?;
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_destinations_count() {
        assert_eq!(destinations(strings(&["3"])), strings(&["output0", "output1", "output2"]));
        assert_eq!(destinations(vec![]), strings(&["output0", "output1"]));
    }

    #[test]
    fn test_destinations_names() {
        assert_eq!(destinations(strings(&["a.txt"])), strings(&["a.txt"]));
        assert_eq!(destinations(strings(&["1", "2"])), strings(&["1", "2"]));
        assert!(destinations(strings(&["0"])).is_empty());
    }
}
