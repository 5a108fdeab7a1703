use clap::Parser;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use futures::stream::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Url};
use slotbar::stream::STREAM_TEMPLATE;
use slotbar::{BarOptions, BarStream, Glyphs, SlotSpec, StageOptions, StreamOptions};
use tokio::{fs, io::AsyncWriteExt};
use tokio_stream as stream;

use crate::config;

/// Download files over HTTP
#[derive(Parser, Debug)]
#[command(arg_required_else_help(true))]
pub struct Args {
    /// Urls to download
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Root path where store files
    #[arg(default_value = ".", short, long)]
    pub dir: PathBuf,

    /// Maximum number of simultaneous downloads allowed
    #[arg(default_value = "8", short = 'm', long = "max-concurrent", name = "MAX")]
    pub dim_buff: usize,

    /// Show sizes in KiB, MiB...
    #[arg(short, long)]
    pub binary: bool,
}

/// Last path segment of the url, `index.html` for bare hosts
fn parse_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| "index.html".into())
}

async fn content_length(client: &Client, url: &Url) -> Result<u64> {
    let size = client
        .head(url.clone())
        .send()
        .await?
        .error_for_status()?
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|ct_len| ct_len.to_str().ok())
        .and_then(|ct_len| ct_len.parse().ok())
        .unwrap_or_default();

    ensure!(size > 0, "Unknown size for {url}");
    Ok(size)
}

pub async fn execute(cmd: Args) -> Result<()> {
    let client = Client::new();
    let urls = cmd
        .urls
        .iter()
        .map(|url| Url::parse(url).with_context(|| format!("Invalid url `{url}`")))
        .collect::<Result<Vec<_>>>()?;

    let sizes = stream::iter(&urls)
        .map(|url| content_length(&client, url))
        .buffered(cmd.dim_buff.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<u64>>>()?;

    if !cmd.dir.exists() {
        fs::create_dir_all(&cmd.dir).await?;
    }

    let total = sizes.iter().sum();
    let slots = {
        let sizes = sizes.clone();
        SlotSpec::Custom(Arc::new(move |_| sizes.clone()))
    };
    let bar = BarOptions::default()
        .label("Downloading")
        .template(STREAM_TEMPLATE.to_vec())
        .glyphs(Glyphs {
            separator: "|".into(),
            ..config::glyphs()
        })
        .force_first(urls.len() > 20);

    let mut bars = BarStream::new(total, slots, StreamOptions::new().bar(bar))?.binary_units(cmd.binary);

    let (client, dir) = (&client, cmd.dir.as_path());
    let results = stream::iter(urls.into_iter().zip(sizes))
        .map(|(url, size)| {
            let filename = parse_filename(&url);
            let tag = format!("[{filename}] ");
            let stage = bars.next(Some(size), StageOptions::new().variable("tag", tag));

            async move {
                let mut stage = stage?;
                let mut source = client.get(url).send().await?.error_for_status()?;
                let mut dest = fs::File::create(dir.join(&filename)).await?;

                while let Some(chunk) = source.chunk().await? {
                    dest.write_all(&chunk).await?;
                    stage.advance(chunk.len() as u64)?;
                }
                dest.flush().await?;
                stage.finish()?;

                Ok::<_, anyhow::Error>(())
            }
        })
        .buffer_unordered(cmd.dim_buff.max(1))
        .collect::<Vec<_>>()
        .await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    let saved = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    bars.end(Some(&format!("Saved in {}", saved.display())))?;

    results
        .into_iter()
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("{failed} downloads failed"))?;

    Ok(())
}
