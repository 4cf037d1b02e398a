//! Secondary display constraints for the text console.
//!
//! Tokens `m4`..`m9` keep events of at least that magnitude and `a0`..`a20`
//! keep events at most that many whole days old. These only narrow what is
//! printed; the published list is never touched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

use crate::event::Event;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ConstraintKind {
    #[default]
    None,
    Equal,
    AtLeast,
    AtMost,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub threshold: f64,
}

impl Constraint {
    pub const fn new(kind: ConstraintKind, threshold: f64) -> Self {
        Self { kind, threshold }
    }

    pub fn matches(&self, value: f64) -> bool {
        match self.kind {
            ConstraintKind::None => true,
            ConstraintKind::Equal => value == self.threshold,
            ConstraintKind::AtLeast => value >= self.threshold,
            ConstraintKind::AtMost => value <= self.threshold,
        }
    }
}

/// Magnitude and age constraints parsed from console tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ShowConstraints {
    pub magnitude: Constraint,
    pub age_days: Constraint,
}

impl ShowConstraints {
    /// Parses tokens case-insensitively. Unknown tokens are ignored and a
    /// later token of the same kind replaces an earlier one.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut constraints = ShowConstraints::default();
        for token in tokens {
            let token = token.as_ref().trim().to_lowercase();
            if let Some(level) = token.strip_prefix('m').and_then(|n| n.parse::<u8>().ok()) {
                if (4..=9).contains(&level) {
                    constraints.magnitude = Constraint::new(ConstraintKind::AtLeast, f64::from(level));
                }
            } else if let Some(days) = token.strip_prefix('a').and_then(|n| n.parse::<u8>().ok()) {
                if days <= 20 {
                    constraints.age_days = Constraint::new(ConstraintKind::AtMost, f64::from(days));
                }
            }
        }
        constraints
    }

    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        let whole_days = event.age(now).num_seconds() / SECONDS_PER_DAY;
        self.age_days.matches(whole_days as f64) && self.magnitude.matches(event.magnitude)
    }
}

fn hemisphere(value: f64, positive: char, negative: char) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded < 0.0 {
        format!("{}{}", rounded.abs(), negative)
    } else {
        format!("{}{}", rounded, positive)
    }
}

/// One console line: `M6.2, 35N, 139E, 2024-06-15 11:00:00, "title"`,
/// prefixed with `* ` for injected events.
pub fn format_event(event: &Event) -> String {
    let mut line = String::new();
    if event.debug {
        line.push_str("* ");
    }
    let title = event.title.as_deref().unwrap_or(&event.place);
    let _ = write!(
        line,
        "M{}, {}, {}, {}, \"{}\"",
        event.magnitude,
        hemisphere(event.latitude, 'N', 'S'),
        hemisphere(event.longitude, 'E', 'W'),
        event.time.format("%Y-%m-%d %H:%M:%S"),
        title
    );
    line
}

/// Formats every event passing `constraints`, in order.
pub fn show<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    constraints: &ShowConstraints,
    now: DateTime<Utc>,
) -> Vec<String> {
    events
        .into_iter()
        .filter(|event| constraints.matches(event, now))
        .map(format_event)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::{now, quake, quake_aged};

    #[test]
    fn test_parse_tokens() {
        let constraints = ShowConstraints::parse(&["M6", "a3", "bogus", "m12"]);
        assert_eq!(constraints.magnitude, Constraint::new(ConstraintKind::AtLeast, 6.0));
        assert_eq!(constraints.age_days, Constraint::new(ConstraintKind::AtMost, 3.0));
    }

    #[test]
    fn test_no_tokens_match_everything() {
        let constraints = ShowConstraints::parse::<&str>(&[]);
        assert_eq!(constraints, ShowConstraints::default());
        assert!(constraints.matches(&quake_aged("a", 0.0, 0.0, 1.0, 400), now()));
    }

    #[test]
    fn test_later_token_wins() {
        let constraints = ShowConstraints::parse(&["a20", "a0", "m9", "m4"]);
        assert_eq!(constraints.age_days.threshold, 0.0);
        assert_eq!(constraints.magnitude.threshold, 4.0);
    }

    #[test]
    fn test_constraint_kinds() {
        assert!(Constraint::new(ConstraintKind::Equal, 5.0).matches(5.0));
        assert!(!Constraint::new(ConstraintKind::Equal, 5.0).matches(5.1));
        assert!(Constraint::new(ConstraintKind::AtLeast, 5.0).matches(5.0));
        assert!(!Constraint::new(ConstraintKind::AtMost, 5.0).matches(5.1));
        assert!(Constraint::default().matches(-1.0));
    }

    #[test]
    fn test_matches_whole_days() {
        let constraints = ShowConstraints::parse(&["a2", "m5"]);
        assert!(constraints.matches(&quake_aged("a", 0.0, 0.0, 5.0, 2), now()));
        assert!(!constraints.matches(&quake_aged("b", 0.0, 0.0, 5.0, 3), now()));
        assert!(!constraints.matches(&quake_aged("c", 0.0, 0.0, 4.9, 0), now()));
    }

    #[test]
    fn test_format_event() {
        let mut event = quake("q", 35.12345, -139.5, 6.2);
        event.title = Some("M 6.2 - Somewhere".to_string());
        assert_eq!(
            format_event(&event),
            "M6.2, 35.123N, 139.5W, 2024-06-15 11:00:00, \"M 6.2 - Somewhere\""
        );
        event.debug = true;
        event.latitude = -10.0;
        assert!(format_event(&event).starts_with("* M6.2, 10S, "));
    }

    #[test]
    fn test_show_filters() {
        let events = vec![quake("big", 0.0, 0.0, 7.0), quake("small", 0.0, 0.0, 4.2)];
        let lines = show(&events, &ShowConstraints::parse(&["m6"]), now());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("M7, "));
    }
}
