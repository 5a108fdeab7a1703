use clap::Parser;

use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use futures::stream::StreamExt;
use slotbar::stream::STREAM_TEMPLATE;
use slotbar::{BarOptions, BarStream, Glyphs, StageOptions, StreamOptions, slots_by_count};
use tokio::fs;
use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tokio_stream as stream;

use crate::config;

/// Create files of the given size
#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct Args {
    /// Size of every file (es. `512`, `10MB` or `1GiB`)
    #[arg(value_parser = parse_size)]
    pub size: u64,

    /// Files to create
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Maximum number of files written at once
    #[arg(default_value = "8", short = 'm', long = "max-concurrent", name = "MAX")]
    pub dim_buff: usize,

    /// Show sizes in KiB, MiB...
    #[arg(short, long)]
    pub binary: bool,
}

/// Parses a size with an optional decimal (`KB`) or binary (`KiB`) unit
pub fn parse_size(input: &str) -> Result<u64> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let number = number
        .parse::<f64>()
        .with_context(|| format!("Invalid size `{input}`"))?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1u64,
        "k" | "kb" => 1_000,
        "m" | "mb" => 1_000_000,
        "g" | "gb" => 1_000_000_000,
        "t" | "tb" => 1_000_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        unit => bail!("Unknown unit `{unit}`"),
    };

    Ok((number * multiplier as f64).round() as u64)
}

/// Combined size of `count` files of `size` bytes
fn total_size(size: u64, count: usize) -> Result<u64> {
    size.checked_mul(count as u64).context("Total size overflows")
}

pub async fn execute(cmd: Args) -> Result<()> {
    ensure!(cmd.size > 0, "Files must not be empty");
    let count = cmd.files.len();
    let total = total_size(cmd.size, count)?;

    let bar = BarOptions::default()
        .label("Touching")
        .template(STREAM_TEMPLATE.to_vec())
        .glyphs(Glyphs {
            separator: "|".into(),
            ..config::glyphs()
        })
        .force_first(count > 20);

    let mut bars = BarStream::new(total, slots_by_count(count), StreamOptions::new().bar(bar))?
        .binary_units(cmd.binary)
        .on_complete(|bar| super::end_logged(bar, "Bar ended"));

    let size = cmd.size;
    let results = stream::iter(cmd.files.into_iter().enumerate())
        .map(|(index, output)| {
            let tag = format!("[{}] ", output.display());
            let stage = bars.next(Some(size), StageOptions::new().variable("tag", tag));
            let content = b'0' + (index % 10) as u8;

            async move {
                let mut reader = stage?.wrap(io::repeat(content).take(size));
                let mut dest = fs::File::create(&output).await?;

                io::copy(&mut reader, &mut dest)
                    .await
                    .with_context(|| format!("Unable to write {}", output.display()))?;
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

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
        assert_eq!(parse_size("1 GB").unwrap(), 1_000_000_000);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
        assert_eq!(parse_size("1.5kib").unwrap(), 1536);
        assert_eq!(parse_size("2k").unwrap(), 2000);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("10 parsecs").is_err());
    }

    #[test]
    fn test_total_size() {
        assert_eq!(total_size(10_000_000, 3).unwrap(), 30_000_000);
        assert!(total_size(parse_size("16000000TB").unwrap(), 2).is_err());
        assert!(total_size(u64::MAX, 2).is_err());
    }
}
