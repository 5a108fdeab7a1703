use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use slotbar::Glyphs;
use toml_edit::DocumentMut;

const TABLE_NAME: &str = "bar";

/// Keys of the `[bar]` table, each overriding the glyph of the same name
const KEYS: [&str; 7] = [
    "blank",
    "filler",
    "header",
    "separator",
    "colorize",
    "pulsate_skip",
    "pulsate_length",
];

/// Default glyphs with the configured overrides applied
pub fn glyphs() -> Glyphs {
    match load_toml(&config_path()) {
        Ok(toml) => apply(&toml, Glyphs::default()),
        Err(_) => Glyphs::default(),
    }
}

/// Saves a glyph override to the configuration
pub fn save(key: &str, value: &str) -> Result<()> {
    save_to(&config_path(), key, value)
}

/// Deletes the configuration file
pub fn clean() -> Result<()> {
    clean_at(&config_path())
}

fn clean_at(path: &Path) -> Result<()> {
    fs::remove_file(path).context("Unable to delete configuration")
}

fn save_to(path: &Path, key: &str, value: &str) -> Result<()> {
    ensure!(KEYS.contains(&key), "Unknown key `{key}`, expected one of {}", KEYS.join(", "));

    let mut doc = match load_toml(path) {
        Ok(t) => t,
        Err(_) => {
            if let Some(p) = path.parent() {
                fs::create_dir_all(p)?;
            }

            DocumentMut::new()
        }
    };

    if !doc.contains_table(TABLE_NAME) {
        doc[TABLE_NAME] = toml_edit::table();
    }
    doc[TABLE_NAME][key] = toml_edit::value(value);
    doc.fmt();

    safe_save(&doc.to_string(), path)
}

fn load(doc: &DocumentMut, key: &str) -> Option<String> {
    let item = doc.get(TABLE_NAME)?.get(key)?;

    match item.as_str() {
        Some(s) => Some(s.to_string()),
        None => item.as_value().map(|v| v.to_string().trim().to_string()),
    }
}

fn apply(doc: &DocumentMut, mut glyphs: Glyphs) -> Glyphs {
    let text = |key: &str, slot: &mut String| {
        if let Some(value) = load(doc, key) {
            *slot = value;
        }
    };
    text("blank", &mut glyphs.blank);
    text("filler", &mut glyphs.filler);
    text("header", &mut glyphs.header);
    text("separator", &mut glyphs.separator);

    if let Some(colorize) = load(doc, "colorize").and_then(|v| v.parse().ok()) {
        glyphs.colorize = colorize;
    }
    if let Some(skip) = load(doc, "pulsate_skip").and_then(|v| v.parse().ok()) {
        glyphs.pulsate_skip = skip;
    }
    if let Some(length) = load(doc, "pulsate_length").and_then(|v| v.parse().ok()) {
        glyphs.pulsate_length = length;
    }

    glyphs
}

/// Loads and parses the TOML configuration file
fn load_toml(path: &Path) -> Result<DocumentMut> {
    let content = fs::read_to_string(path)?;
    let toml = content.parse::<DocumentMut>()?;

    Ok(toml)
}

/// Saves content using a temporary file to avoid corruption
fn safe_save(content: &str, path: &Path) -> Result<()> {
    let tmp_path = path.with_extension("toml.tmp");

    fs::write(&tmp_path, content)?;
    fs::rename(tmp_path, path)?;

    Ok(())
}

#[cfg(not(windows))]
const CONFIG_PATH: &str = ".config/slotbar/config.toml";

#[cfg(windows)]
const CONFIG_PATH: &str = r"AppData\Roaming\slotbar\config.toml";

/// Returns the configuration file path for the current OS
fn config_path() -> PathBuf {
    #[cfg(windows)]
    let root = std::env::var("HOMEPATH").ok();

    #[cfg(not(windows))]
    let root = std::env::var("HOME").ok();

    let mut path = PathBuf::new();
    if let Some(r) = root {
        path.push(PathBuf::from(r));
    }
    path.push(CONFIG_PATH);

    path
}
