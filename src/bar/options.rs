use std::fmt;
use std::sync::Arc;

use crate::template::{Value, Variables};

/// Default single line template
pub const DEFAULT_TEMPLATE: &str =
    ":{tag}[:{bar}] :{flipper} :{label} :3{percentage}% [:{completed}/:{total}]";

/// Characters the bar is drawn with
#[derive(Clone, Debug, PartialEq)]
pub struct Glyphs {
    pub blank: String,
    pub filler: String,
    /// Drawn right after the filled part of every slot
    pub header: String,
    /// Drawn between slots
    pub separator: String,
    /// When off every color sequence is stripped from the output
    pub colorize: bool,
    /// Percentage of the bar the pulse moves forward on every frame
    pub pulsate_skip: f64,
    /// Percentage of the bar the pulse covers
    pub pulsate_length: f64,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            blank: "-".into(),
            filler: "#".into(),
            header: "".into(),
            separator: "".into(),
            colorize: true,
            pulsate_skip: 15.0,
            pulsate_length: 15.0,
        }
    }
}

/// Width of the bar in columns
#[derive(Clone)]
pub enum BarLength {
    Fixed(usize),
    /// Positive values are a percentage of the terminal width (capped at 100), negative ones
    /// are subtracted from it
    Relative(i64),
    /// Computed from the terminal width
    Custom(Arc<dyn Fn(usize) -> usize + Send + Sync>),
}

impl BarLength {
    pub fn resolve(&self, columns: usize) -> usize {
        match self {
            BarLength::Fixed(length) => *length,
            BarLength::Relative(offset) if *offset < 0 => {
                columns.saturating_sub(offset.unsigned_abs() as usize)
            }
            BarLength::Relative(percent) => {
                ((*percent).min(100) as f64 / 100.0 * columns as f64).floor() as usize
            }
            BarLength::Custom(compute) => compute(columns),
        }
    }
}

impl Default for BarLength {
    fn default() -> Self {
        BarLength::Relative(40)
    }
}

impl fmt::Debug for BarLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarLength::Fixed(length) => f.debug_tuple("Fixed").field(length).finish(),
            BarLength::Relative(value) => f.debug_tuple("Relative").field(value).finish(),
            BarLength::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A single line or several lines rendered together
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Template {
    Line(String),
    Lines(Vec<String>),
}

impl Template {
    pub fn text(&self) -> String {
        match self {
            Template::Line(line) => line.clone(),
            Template::Lines(lines) => lines.join("\n"),
        }
    }
}

impl Default for Template {
    fn default() -> Self {
        Template::Line(DEFAULT_TEMPLATE.into())
    }
}

impl From<&str> for Template {
    fn from(line: &str) -> Self {
        Template::Line(line.into())
    }
}

impl From<String> for Template {
    fn from(line: String) -> Self {
        Template::Line(line)
    }
}

impl From<Vec<&str>> for Template {
    fn from(lines: Vec<&str>) -> Self {
        Template::Lines(lines.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for Template {
    fn from(lines: Vec<String>) -> Self {
        Template::Lines(lines)
    }
}

#[derive(Clone, Debug)]
pub struct BarOptions {
    pub glyphs: Glyphs,
    pub label: String,
    pub length: BarLength,
    /// Spinner frames, one per render
    pub flipper: Vec<String>,
    /// Indeterminate animation instead of slot progress
    pub pulsate: bool,
    pub template: Template,
    /// Merged over the default variables on every render
    pub variables: Variables,
    /// Draw the whole bar as one aggregate segment
    pub force_first: bool,
    /// Clear the last frame when the bar ends
    pub clean: bool,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            glyphs: Glyphs::default(),
            label: "Loading".into(),
            length: BarLength::default(),
            flipper: ["|", "/", "-", "\\"].map(String::from).to_vec(),
            pulsate: false,
            template: Template::default(),
            variables: Variables::new(),
            force_first: false,
            clean: false,
        }
    }
}

impl BarOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn glyphs(mut self, glyphs: Glyphs) -> Self {
        self.glyphs = glyphs;
        self
    }

    pub fn length(mut self, length: BarLength) -> Self {
        self.length = length;
        self
    }

    pub fn template(mut self, template: impl Into<Template>) -> Self {
        self.template = template.into();
        self
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.set(key, value);
        self
    }

    pub fn pulsate(mut self, pulsate: bool) -> Self {
        self.pulsate = pulsate;
        self
    }

    pub fn force_first(mut self, force_first: bool) -> Self {
        self.force_first = force_first;
        self
    }

    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }
}

/// Variables every bar starts from
pub fn default_variables() -> Variables {
    Variables::new()
        .with(
            "tag",
            Value::computed(|vars| match vars.get("tag") {
                Some(tag) if !tag.is_empty() => format!("{tag}\n"),
                _ => String::new(),
            }),
        )
        .with("color:bar:empty", ":{color:close}")
        .with("color:bar:header", ":{color(green)}")
        .with("color:bar:filled", ":{bgcolor(green)}:{color(black)}")
        .with("color:bar:separator", "")
}
