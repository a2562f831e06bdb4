//! Clock times and activity durations with lenient parsing
//!
//! Both types serialize to the compact text forms used by the API
//! (`"09:30"`, `"1.5h"`) and store plain minutes internally.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Last representable minute of a day
const LAST_MINUTE: u16 = 24 * 60 - 1;

/// Time of day in minutes since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Build from minutes since midnight, clamped to the last minute of the day
    #[must_use]
    pub const fn from_minutes(minutes: u16) -> Self {
        if minutes > LAST_MINUTE {
            Self(LAST_MINUTE)
        } else {
            Self(minutes)
        }
    }

    #[must_use]
    pub const fn hm(hours: u16, minutes: u16) -> Self {
        Self::from_minutes(hours * 60 + minutes)
    }

    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Round to the nearest multiple of `step` minutes
    #[must_use]
    pub fn rounded(self, step: u16) -> Self {
        Self::from_minutes(round_to(self.0, step))
    }

    /// Parse `"08:00"`, `"8:00"`, `"8 pm"`, `"8:30 PM"` or `"20:00:00"`
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim().to_lowercase().replace('.', "");
        let (clock, meridiem) = if let Some(rest) = text.strip_suffix("pm") {
            (rest.trim(), Some(true))
        } else if let Some(rest) = text.strip_suffix("am") {
            (rest.trim(), Some(false))
        } else {
            (text.as_str(), None)
        };

        let mut parts = clock.split(':');
        let hours: u16 = parts.next()?.trim().parse().ok()?;
        let minutes: u16 = match parts.next() {
            Some(m) => m.trim().parse().ok()?,
            None => 0,
        };
        if let Some(seconds) = parts.next() {
            seconds.trim().parse::<u16>().ok()?;
        }

        let hours = match meridiem {
            Some(true) if hours < 12 => hours + 12,
            Some(false) if hours == 12 => 0,
            Some(_) if hours > 12 => return None,
            _ => hours,
        };

        if hours > 23 || minutes > 59 {
            return None;
        }
        Some(Self::hm(hours, minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{text}'")))
    }
}

/// Length of an activity in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityDuration(u16);

impl ActivityDuration {
    pub const DEFAULT: Self = Self(60);

    #[must_use]
    pub const fn minutes(m: u16) -> Self {
        Self(m)
    }

    #[must_use]
    pub const fn hours(h: u16) -> Self {
        Self(h * 60)
    }

    #[must_use]
    pub const fn as_minutes(self) -> u16 {
        self.0
    }

    /// Parse durations such as `"1.5h"`, `"90min"`, `"2 hours"`, `"1h15m"`
    /// or a bare number of hours. Returns `None` when nothing numeric is found.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim().to_lowercase();
        let mut total = 0.0_f64;
        let mut matched = false;
        let mut chars = text.chars().peekable();

        while chars.peek().is_some() {
            while chars.peek().is_some_and(|c| !c.is_ascii_digit() && *c != '.') {
                chars.next();
            }
            let mut number = String::new();
            while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_digit() || *c == '.') {
                number.push(c);
                chars.next();
            }
            if number.is_empty() {
                break;
            }
            let Ok(value) = number.parse::<f64>() else {
                continue;
            };
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            let unit = chars.peek().copied();
            total += match unit {
                Some('m') => value,
                _ => value * 60.0,
            };
            matched = true;
        }

        if !matched || total <= 0.0 || total > f64::from(LAST_MINUTE) {
            return None;
        }
        Some(Self(total.round() as u16))
    }

    /// Like [`ActivityDuration::parse`] but falls back to one hour
    #[must_use]
    pub fn parse_or_default(input: &str) -> Self {
        Self::parse(input).unwrap_or(Self::DEFAULT)
    }

    #[must_use]
    pub fn clamp(self, min: u16, max: u16) -> Self {
        Self(self.0.clamp(min, max.max(min)))
    }
}

impl fmt::Display for ActivityDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes) = (self.0 / 60, self.0 % 60);
        match (hours, minutes) {
            (0, m) => write!(f, "{m}m"),
            (h, 0) => write!(f, "{h}h"),
            (h, 30) => write!(f, "{h}.5h"),
            (h, m) => write!(f, "{h}h{m}m"),
        }
    }
}

impl Serialize for ActivityDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ActivityDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Hours(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self::parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid duration '{text}'"))),
            Raw::Hours(hours) if hours > 0.0 && hours < 24.0 => {
                Ok(Self((hours * 60.0).round() as u16))
            }
            Raw::Hours(hours) => Err(serde::de::Error::custom(format!(
                "duration out of range: {hours}"
            ))),
        }
    }
}

/// Round `minutes` to the nearest multiple of `step`
#[must_use]
pub fn round_to(minutes: u16, step: u16) -> u16 {
    if step == 0 {
        return minutes;
    }
    ((minutes + step / 2) / step) * step
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("08:00", 8 * 60)]
    #[case("8:05", 8 * 60 + 5)]
    #[case("8:00 PM", 20 * 60)]
    #[case("12:30 am", 30)]
    #[case("12 pm", 12 * 60)]
    #[case("7 p.m.", 19 * 60)]
    #[case("20:15:00", 20 * 60 + 15)]
    fn test_time_parsing(#[case] input: &str, #[case] expected: u16) {
        assert_eq!(TimeOfDay::parse(input).map(TimeOfDay::minutes), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("25:00")]
    #[case("10:75")]
    #[case("13 pm")]
    #[case("noon")]
    fn test_time_rejects_garbage(#[case] input: &str) {
        assert!(TimeOfDay::parse(input).is_none());
    }

    #[test]
    fn test_time_display_is_zero_padded() {
        assert_eq!(TimeOfDay::hm(9, 5).to_string(), "09:05");
        assert_eq!(TimeOfDay::from_minutes(5000).to_string(), "23:59");
    }

    #[rstest]
    #[case("1.5h", 90)]
    #[case("90min", 90)]
    #[case("2 hours", 120)]
    #[case("45 minutes", 45)]
    #[case("1h15m", 75)]
    #[case("1 hr 30 min", 90)]
    #[case("3", 180)]
    #[case("8h", 480)]
    fn test_duration_parsing(#[case] input: &str, #[case] expected: u16) {
        assert_eq!(ActivityDuration::parse(input).map(ActivityDuration::as_minutes), Some(expected));
    }

    #[test]
    fn test_duration_defaults_to_one_hour() {
        assert_eq!(ActivityDuration::parse_or_default("a while"), ActivityDuration::DEFAULT);
    }

    #[rstest]
    #[case(480, "8h")]
    #[case(90, "1.5h")]
    #[case(45, "45m")]
    #[case(75, "1h15m")]
    fn test_duration_display(#[case] minutes: u16, #[case] expected: &str) {
        assert_eq!(ActivityDuration::minutes(minutes).to_string(), expected);
    }

    #[test]
    fn test_serde_uses_text_forms() {
        let json = serde_json::to_string(&(TimeOfDay::hm(12, 30), ActivityDuration::hours(8))).unwrap();
        assert_eq!(json, r#"["12:30","8h"]"#);

        let duration: ActivityDuration = serde_json::from_str("2.5").unwrap();
        assert_eq!(duration.as_minutes(), 150);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(542, 5), 540);
        assert_eq!(round_to(543, 5), 545);
        assert_eq!(TimeOfDay::from_minutes(712).rounded(15).minutes(), 705);
    }
}
