use console::measure_text_width;

use super::Bar;
use super::options::Glyphs;
use super::slot::Slot;
use crate::format;
use crate::template::{self, Variables};

const CLOSE: &str = ":{color:close}:{bgcolor:close}";

/// One bar segment `fillable` columns wide, `percentage` of it filled
pub fn parse_bar(
    glyphs: &Glyphs,
    vars: &Variables,
    fillable: f64,
    percentage: f64,
    headers: bool,
) -> String {
    let fillable = fillable.round().max(0.0) as usize;
    let filled = (percentage.clamp(0.0, 100.0) / 100.0 * fillable as f64).round() as usize;
    let filled = filled.min(fillable);
    let header = if headers { glyphs.header.as_str() } else { "" };

    let text = [
        format!(":{{color:bar:filled}}{}", glyphs.filler.repeat(filled)),
        format!(":{{color:bar:header}}{header}"),
        format!(":{{color:bar:empty}}{}", glyphs.blank.repeat(fillable - filled)),
        String::new(),
    ]
    .join(CLOSE);

    template::render(&text, vars, &Variables::new())
}

/// State of the indeterminate animation: a pulse sliding across the bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    lead: f64,
    length: f64,
}

impl Pulse {
    /// `length` is the share of the bar covered by the pulse, in percent
    pub fn new(length: f64) -> Self {
        Self {
            lead: 0.0,
            length: length.clamp(0.0, 100.0),
        }
    }

    /// Widths of the lead, pulse and remainder segments for the next frame, each paired with
    /// its fill percentage. Moves the pulse forward by `skip` percent.
    pub fn advance(&mut self, width: usize, skip: f64) -> [(usize, f64); 3] {
        if self.lead + self.length >= 100.0 {
            self.lead = 100.0 - self.length;
        }

        let lead = ((self.lead / 100.0 * width as f64).round() as usize).min(width);
        let pulse = ((self.length / 100.0 * width as f64).round() as usize).min(width - lead);
        let rest = width - lead - pulse;

        if self.lead + self.length >= 100.0 {
            self.lead = 0.0;
        } else {
            self.lead += skip.max(0.0);
        }

        [(lead, 0.0), (pulse, 100.0), (rest, 0.0)]
    }
}

/// Segments of a pulsating bar, headers are never drawn
pub fn pulsate_bar(glyphs: &Glyphs, vars: &Variables, pulse: &mut Pulse, length: usize) -> Vec<String> {
    let width = length.saturating_sub(measure_text_width(&glyphs.separator) * 2);

    pulse
        .advance(width, glyphs.pulsate_skip)
        .iter()
        .map(|(fillable, percentage)| parse_bar(glyphs, vars, *fillable as f64, *percentage, false))
        .collect()
}

/// One segment per slot, sized by the slot's share of `total`
pub fn slot_bars(
    glyphs: &Glyphs,
    vars: &Variables,
    slots: &[Slot],
    total: u64,
    length: usize,
) -> Vec<String> {
    let count = slots.len();
    let header = measure_text_width(&glyphs.header) * count;
    let separator = measure_text_width(&glyphs.separator) * count.saturating_sub(1);
    let width = length.saturating_sub(header + separator);

    let mut portions = slots
        .iter()
        .map(|slot| (slot.level(total) / 100.0 * width as f64).floor() as usize)
        .collect::<Vec<_>>();
    let allotted = portions.iter().sum::<usize>();
    if let Some(last) = portions.last_mut() {
        *last += width.saturating_sub(allotted);
    }

    slots
        .iter()
        .zip(portions)
        .map(|(slot, portion)| parse_bar(glyphs, vars, portion as f64, slot.percentage(), true))
        .collect()
}

impl Bar {
    /// Renders the bar's template without printing it.
    ///
    /// Builtin variables are `bar`, `bar:complete`, `label`, `total`, `flipper`, `completed`,
    /// `remaining` and `percentage`; `template` overrides any of them.
    pub fn construct_bar(&mut self, template: Option<&Variables>) -> String {
        let vars = self.variables();
        let length = self.length();
        let average = self.average(None);
        let glyphs = &self.opts.glyphs;

        let complete = parse_bar(
            glyphs,
            &vars,
            length.saturating_sub(measure_text_width(&glyphs.header)) as f64,
            average.percentage,
            true,
        );
        let segments = if self.opts.pulsate {
            pulsate_bar(glyphs, &vars, &mut self.pulse, length)
        } else if self.opts.force_first {
            vec![complete.clone()]
        } else {
            slot_bars(glyphs, &vars, &self.slots, self.total, length)
        };
        let separator = template::render(
            &format!(":{{color:bar:separator}}{}{CLOSE}", glyphs.separator),
            &vars,
            &Variables::new(),
        );

        self.flipper_count += 1;
        let flipper = match self.opts.flipper.len() {
            0 => String::new(),
            frames => self.opts.flipper[self.flipper_count % frames].clone(),
        };

        let mut overrides = Variables::new()
            .with("bar", segments.join(&separator))
            .with("bar:complete", complete)
            .with("label", &self.label)
            .with("total", self.total)
            .with("flipper", flipper)
            .with("completed", format::number(average.completed))
            .with("remaining", format::number(average.remaining))
            .with("percentage", format!("{:.0}", average.percentage));
        if let Some(template) = template {
            overrides.merge(template);
        }

        template::render(&self.opts.template.text(), &vars, &overrides)
    }

    /// A single segment spanning the bar's length, drawn with `glyphs` when given. Without a
    /// percentage the segment pulsates.
    pub fn render_segment(&self, glyphs: Option<&Glyphs>, percentage: Option<f64>, pulse: &mut Pulse) -> String {
        let vars = self.variables();
        let length = self.length();
        let glyphs = glyphs.unwrap_or(&self.opts.glyphs);

        match percentage {
            Some(percentage) => parse_bar(
                glyphs,
                &vars,
                length.saturating_sub(measure_text_width(&glyphs.header)) as f64,
                percentage,
                true,
            ),
            None => pulsate_bar(glyphs, &vars, pulse, length).concat(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::options::{BarLength, BarOptions, default_variables};
    use crate::printer::Capture;
    use crate::ratio::SlotSpec;

    fn plain() -> Glyphs {
        Glyphs {
            colorize: false,
            ..Glyphs::default()
        }
    }

    fn strip(text: &str) -> String {
        console::strip_ansi_codes(text).into_owned()
    }

    #[test]
    fn test_parse_bar() {
        let vars = default_variables();
        assert_eq!(strip(&parse_bar(&plain(), &vars, 10.0, 50.0, true)), "#####-----");
        assert_eq!(strip(&parse_bar(&plain(), &vars, 10.0, 150.0, true)), "##########");
        assert_eq!(strip(&parse_bar(&plain(), &vars, 4.4, 0.0, true)), "----");
    }

    #[test]
    fn test_parse_bar_header() {
        let glyphs = Glyphs {
            header: ">".into(),
            ..plain()
        };
        let segment = parse_bar(&glyphs, &default_variables(), 4.0, 50.0, true);
        assert_eq!(strip(&segment), "##>--");

        let segment = parse_bar(&glyphs, &default_variables(), 4.0, 50.0, false);
        assert_eq!(strip(&segment), "##--");
    }

    #[test]
    fn test_parse_bar_colors() {
        let vars = default_variables().with("color:bar:filled", ":{color(green)}");
        let segment = parse_bar(&plain(), &vars, 2.0, 100.0, false);

        assert!(segment.starts_with("\x1b[32m##"));
        assert!(segment.contains("\x1b[39m\x1b[49m"));
    }

    #[test]
    fn test_slot_bars() {
        let slots = [Slot { max: 50, done: 50.0 }, Slot { max: 50, done: 0.0 }];
        let segments = slot_bars(&plain(), &default_variables(), &slots, 100, 11);
        let segments = segments.iter().map(|s| strip(s)).collect::<Vec<_>>();

        assert_eq!(segments, vec!["#####", "------"]);
    }

    #[test]
    fn test_slot_bars_overhead() {
        let glyphs = Glyphs {
            header: ">".into(),
            separator: "|".into(),
            ..plain()
        };
        let slots = [Slot { max: 50, done: 0.0 }, Slot { max: 50, done: 0.0 }];
        let segments = slot_bars(&glyphs, &default_variables(), &slots, 100, 13);
        let width = segments.iter().map(|s| measure_text_width(s)).sum::<usize>();

        // 13 columns minus two headers and one separator, plus the headers drawn back
        assert_eq!(width, 12);
    }

    #[test]
    fn test_pulse_sweeps() {
        let mut pulse = Pulse::new(20.0);

        assert_eq!(pulse.advance(100, 50.0), [(0, 0.0), (20, 100.0), (80, 0.0)]);
        assert_eq!(pulse.advance(100, 50.0), [(50, 0.0), (20, 100.0), (30, 0.0)]);
        // clamped against the end, then wraps around
        assert_eq!(pulse.advance(100, 50.0), [(80, 0.0), (20, 100.0), (0, 0.0)]);
        assert_eq!(pulse.advance(100, 50.0), [(0, 0.0), (20, 100.0), (80, 0.0)]);
    }

    #[test]
    fn test_pulse_fills_width() {
        let mut pulse = Pulse::new(15.0);
        for _ in 0..20 {
            let segments = pulse.advance(37, 15.0);
            assert_eq!(segments.iter().map(|(w, _)| w).sum::<usize>(), 37);
        }
    }

    #[test]
    fn test_construct_bar() {
        let opts = BarOptions::default()
            .glyphs(plain())
            .length(BarLength::Fixed(10))
            .template(":{bar} :{percentage}% :{completed}/:{total} :{label}");
        let mut bar = Bar::with_sink(100, SlotSpec::Single, opts, Capture::default()).unwrap();
        bar.percentage(30.0, None).unwrap();

        assert_eq!(strip(&bar.construct_bar(None)), "###------- 30% 30/100 Loading");
    }

    #[test]
    fn test_construct_bar_overrides() {
        let opts = BarOptions::default()
            .length(BarLength::Fixed(4))
            .template(":{label} :{extra}");
        let mut bar = Bar::with_sink(10, SlotSpec::Single, opts, Capture::default()).unwrap();
        let overrides = Variables::new().with("label", "Copying").with("extra", "x");

        assert_eq!(bar.construct_bar(Some(&overrides)), "Copying x");
    }

    #[test]
    fn test_construct_bar_forced() {
        let opts = BarOptions::default()
            .glyphs(plain())
            .length(BarLength::Fixed(10))
            .force_first(true)
            .template(":{bar}");
        let mut bar = Bar::with_sink(100, SlotSpec::Count(4), opts, Capture::default()).unwrap();
        bar.value_at(0, 25.0, None).unwrap();

        assert_eq!(strip(&bar.construct_bar(None)), "###-------");
    }

    #[test]
    fn test_construct_bar_pulsating() {
        let glyphs = Glyphs {
            separator: "|".into(),
            ..plain()
        };
        let opts = BarOptions::default()
            .glyphs(glyphs)
            .length(BarLength::Fixed(22))
            .pulsate(true)
            .template(":{bar}");
        let mut bar = Bar::with_sink(10, SlotSpec::Single, opts, Capture::default()).unwrap();
        let frames = (0..3).map(|_| strip(&bar.construct_bar(None))).collect::<Vec<_>>();

        assert_eq!(frames[0], format!("|###|{}", "-".repeat(17)));
        assert!(frames.iter().all(|frame| measure_text_width(frame) == 22));

        // 15% of the 20 fillable columns per frame
        let leads = frames
            .iter()
            .map(|frame| frame.split('|').next().map_or(0, str::len))
            .collect::<Vec<_>>();
        assert_eq!(leads, vec![0, 3, 6]);
    }

    #[test]
    fn test_render_segment() {
        let opts = BarOptions::default().length(BarLength::Fixed(8));
        let bar = Bar::with_sink(10, SlotSpec::Single, opts, Capture::default()).unwrap();
        let mut pulse = Pulse::new(25.0);

        assert_eq!(strip(&bar.render_segment(None, Some(50.0), &mut pulse)), "####----");

        let slot = Glyphs {
            filler: "=".into(),
            ..Glyphs::default()
        };
        assert_eq!(strip(&bar.render_segment(Some(&slot), Some(25.0), &mut pulse)), "==------");
        assert_eq!(strip(&bar.render_segment(None, None, &mut pulse)), "##------");
        assert_eq!(strip(&bar.render_segment(None, None, &mut pulse)), "-##-----");
    }

    #[test]
    fn test_flipper_rotates() {
        let opts = BarOptions::default().template(":{flipper}");
        let mut bar = Bar::with_sink(10, SlotSpec::Single, opts, Capture::default()).unwrap();
        let frames = (0..5).map(|_| bar.construct_bar(None)).collect::<Vec<_>>();

        assert_eq!(frames, vec!["/", "-", "\\", "|", "/"]);
    }
}
