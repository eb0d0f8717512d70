//! Chart annotations for selected levels and confluence candidates.
//!
//! The engine never draws anything itself. Callers turn a [`Selection`] or a
//! [`PairConfluence`] into [`Annotation`] values and hand them to an
//! [`AnnotationSink`].

use crate::domain::{Decimal, TimeMs, Timeframe};
use crate::engine::SrLevel;
use crate::orchestration::{PairConfluence, Selection};
use serde::Serialize;
use thiserror::Error;

mod sink;

pub use sink::{JsonLinesSink, RecordingSink};

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("annotation I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("annotation encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// A point on the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub time: TimeMs,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    TrendLine {
        name: String,
        start: Anchor,
        end: Anchor,
        color: String,
        thickness: u32,
        style: LineStyle,
    },
    Label {
        name: String,
        text: String,
        bar_index: usize,
        price: Decimal,
        color: String,
    },
}

impl Annotation {
    pub fn name(&self) -> &str {
        match self {
            Annotation::TrendLine { name, .. } | Annotation::Label { name, .. } => name,
        }
    }
}

/// Where annotations end up.
pub trait AnnotationSink {
    /// Draw `annotation`, replacing any existing one with the same name.
    fn draw(&mut self, annotation: Annotation) -> Result<(), AnnotationError>;

    /// Remove every annotation whose name starts with `prefix`.
    fn remove_with_prefix(&mut self, prefix: &str) -> Result<(), AnnotationError>;
}

/// Colors and line width for one timeframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Styling {
    pub support_color: String,
    pub resistance_color: String,
    pub thickness: u32,
}

impl Styling {
    pub fn new(support_color: &str, resistance_color: &str, thickness: u32) -> Self {
        Self {
            support_color: support_color.to_string(),
            resistance_color: resistance_color.to_string(),
            thickness,
        }
    }
}

/// Levels of `timeframe` are only drawn on charts that are not coarser.
pub fn visible_on(chart: Timeframe, timeframe: Timeframe) -> bool {
    chart <= timeframe
}

/// Redraw the dominant levels of one timeframe.
///
/// Clears `<TF>_*`, then draws `<TF>_R` / `<TF>_S` from the level's creation
/// to the rejection that made it dominant, with a label two bars right of
/// `chart_index`. Returns how many annotations were drawn.
pub fn annotate_dominant(
    sink: &mut dyn AnnotationSink,
    selection: &Selection,
    chart: Timeframe,
    chart_index: usize,
    styling: &Styling,
) -> Result<usize, AnnotationError> {
    if !visible_on(chart, selection.timeframe) {
        return Ok(0);
    }
    let prefix = selection.timeframe.label();
    sink.remove_with_prefix(&format!("{}_", prefix))?;

    let dominant = &selection.dominant;
    let sides = [
        (
            dominant.resistance.as_ref(),
            dominant.resistance_rejection_time(),
            "R",
            &styling.resistance_color,
        ),
        (
            dominant.support.as_ref(),
            dominant.support_rejection_time(),
            "S",
            &styling.support_color,
        ),
    ];

    let mut drawn = 0;
    for (level, rejection_time, suffix, color) in sides {
        let (Some(level), Some(end_time)) = (level, rejection_time) else {
            continue;
        };
        let name = format!("{}_{}", prefix, suffix);
        sink.draw(level_line(&name, level, end_time, color, styling.thickness, LineStyle::Solid))?;
        sink.draw(Annotation::Label {
            name: format!("{}_Label", name),
            text: name,
            bar_index: chart_index + 2,
            price: level.price(),
            color: color.clone(),
        })?;
        drawn += 2;
    }
    Ok(drawn)
}

/// Redraw the confluence candidates of one timeframe pair.
///
/// Clears `<HIGHER><LOWER>_*`, then draws `_LR` and `_HS` from each candidate's
/// creation to its breakout. Candidates without a breakout are not drawn.
pub fn annotate_confluence(
    sink: &mut dyn AnnotationSink,
    pair: &PairConfluence,
    chart: Timeframe,
    styling: &Styling,
) -> Result<usize, AnnotationError> {
    if !visible_on(chart, pair.lower) {
        return Ok(0);
    }
    let prefix = format!("{}{}", pair.higher.label(), pair.lower.label());
    sink.remove_with_prefix(&format!("{}_", prefix))?;

    let confluence = &pair.confluence;
    let sides = [
        (
            confluence.resistance.as_ref(),
            confluence.time_bor,
            "LR",
            &styling.resistance_color,
        ),
        (
            confluence.support.as_ref(),
            confluence.time_bos,
            "HS",
            &styling.support_color,
        ),
    ];

    let mut drawn = 0;
    for (level, breakout_time, suffix, color) in sides {
        let (Some(level), Some(end_time)) = (level, breakout_time) else {
            continue;
        };
        let name = format!("{}_{}", prefix, suffix);
        sink.draw(level_line(&name, level, end_time, color, styling.thickness, LineStyle::Dashed))?;
        drawn += 1;
    }
    Ok(drawn)
}

fn level_line(
    name: &str,
    level: &SrLevel,
    end_time: TimeMs,
    color: &str,
    thickness: u32,
    style: LineStyle,
) -> Annotation {
    Annotation::TrendLine {
        name: name.to_string(),
        start: Anchor {
            time: level.creation_time(),
            price: level.price(),
        },
        end: Anchor {
            time: end_time,
            price: level.price(),
        },
        color: color.to_string(),
        thickness,
        style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::engine::{Confluence, DominantLevels, Signal};

    fn bar(index: usize, open: i64, high: i64, low: i64, close: i64) -> Bar {
        Bar::new(
            index,
            TimeMs::new(index as i64 * 1000),
            Decimal::from(open),
            Decimal::from(high),
            Decimal::from(low),
            Decimal::from(close),
        )
    }

    fn dominant_with_resistance() -> DominantLevels {
        // Resistance at 120 created at bar 3, up-wick rejection at bar 6.
        let mut level = SrLevel::create(&bar(3, 118, 121, 117, 120), &bar(4, 120, 120, 115, 116));
        level.check_rejection(&bar(6, 117, 121, 116, 118));
        DominantLevels {
            resistance: Some(level),
            support: None,
            main_index: 6,
        }
    }

    fn styling() -> Styling {
        Styling::new("Green", "Red", 2)
    }

    #[test]
    fn test_visibility() {
        assert!(visible_on(Timeframe::H4, Timeframe::D1));
        assert!(visible_on(Timeframe::D1, Timeframe::D1));
        assert!(!visible_on(Timeframe::D1, Timeframe::H4));
    }

    #[test]
    fn test_dominant_lines_and_labels() {
        let selection = Selection {
            timeframe: Timeframe::D1,
            bar_index: 8,
            dominant: dominant_with_resistance(),
        };
        let mut sink = RecordingSink::new();
        sink.draw(Annotation::Label {
            name: "D1_S_Label".to_string(),
            text: "stale".to_string(),
            bar_index: 0,
            price: Decimal::from(1),
            color: "Green".to_string(),
        })
        .unwrap();

        let drawn = annotate_dominant(&mut sink, &selection, Timeframe::H4, 40, &styling()).unwrap();
        assert_eq!(drawn, 2);
        assert!(sink.get("D1_S_Label").is_none());

        match sink.get("D1_R").unwrap() {
            Annotation::TrendLine {
                start, end, color, thickness, style, ..
            } => {
                assert_eq!(start.time, TimeMs::new(3000));
                assert_eq!(end.time, TimeMs::new(6000));
                assert_eq!(start.price, Decimal::from(120));
                assert_eq!(color, "Red");
                assert_eq!(*thickness, 2);
                assert_eq!(*style, LineStyle::Solid);
            }
            other => panic!("expected trend line, got {:?}", other),
        }
        match sink.get("D1_R_Label").unwrap() {
            Annotation::Label { text, bar_index, .. } => {
                assert_eq!(text, "D1_R");
                assert_eq!(*bar_index, 42);
            }
            other => panic!("expected label, got {:?}", other),
        }
    }

    #[test]
    fn test_coarser_chart_draws_nothing() {
        let selection = Selection {
            timeframe: Timeframe::H4,
            bar_index: 8,
            dominant: dominant_with_resistance(),
        };
        let mut sink = RecordingSink::new();
        let drawn = annotate_dominant(&mut sink, &selection, Timeframe::D1, 40, &styling()).unwrap();
        assert_eq!(drawn, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_confluence_line_needs_breakout() {
        let level = SrLevel::create(&bar(2, 108, 111, 107, 110), &bar(3, 110, 110, 105, 106));
        let pair = PairConfluence {
            higher: Timeframe::D1,
            lower: Timeframe::H4,
            confluence: Confluence {
                signal: Signal::Bullish,
                resistance: Some(level.clone()),
                time_bor: Some(TimeMs::new(12_000)),
                ..Confluence::default()
            },
        };
        let mut sink = RecordingSink::new();
        assert_eq!(annotate_confluence(&mut sink, &pair, Timeframe::H4, &styling()).unwrap(), 1);
        assert!(sink.get("D1H4_LR").is_some());
        assert!(sink.get("D1H4_HS").is_none());

        let pending = PairConfluence {
            confluence: Confluence {
                resistance: Some(level),
                ..Confluence::default()
            },
            ..pair
        };
        assert_eq!(annotate_confluence(&mut sink, &pending, Timeframe::H4, &styling()).unwrap(), 0);
        assert!(sink.is_empty());
    }
}

