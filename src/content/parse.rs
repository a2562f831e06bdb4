//! Tolerant parsing of free-form completion output

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::{ContentGenerationError, LandmarkCandidate};
use crate::models::{ActivityDuration, Coordinates, TimeOfDay};

const ACTIVITY_LIST_KEYS: &[&str] = &["activities", "landmarks", "items", "attractions"];
const MEAL_TYPES: &[&str] = &["restaurant", "meal", "dining", "food", "breakfast", "lunch", "dinner"];

/// Outermost `{ ... }` span, ignoring prose or code fences around it
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// `day_3`, `Day 3`, `day3` or `3`
fn parse_day_key(key: &str) -> Option<u32> {
    let lowered = key.trim().to_lowercase();
    let digits = lowered
        .strip_prefix("day")
        .unwrap_or(&lowered)
        .trim_start_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
    digits.parse().ok()
}

fn string_field(item: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_duration(value: Option<&Value>) -> ActivityDuration {
    match value {
        Some(Value::String(text)) => ActivityDuration::parse(text).unwrap_or(ActivityDuration::hours(2)),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|h| *h > 0.0 && *h < 24.0)
            .map_or(ActivityDuration::hours(2), |h| {
                ActivityDuration::minutes((h * 60.0).round() as u16)
            }),
        _ => ActivityDuration::hours(2),
    }
}

fn parse_location(value: Option<&Value>) -> Option<Coordinates> {
    let point: Coordinates = serde_json::from_value(value?.clone()).ok()?;
    point.is_valid().then_some(point)
}

fn parse_item(value: &Value) -> Option<LandmarkCandidate> {
    let item = value.as_object()?;
    let name = string_field(item, &["name", "title"])?;

    let kind = string_field(item, &["type", "category"]).unwrap_or_default().to_lowercase();
    if MEAL_TYPES.iter().any(|m| kind.contains(m)) || item.contains_key("mealtime") {
        debug!(name, "skipping meal entry in landmark output");
        return None;
    }

    Some(LandmarkCandidate {
        name,
        description: string_field(item, &["description", "details"]),
        start_time: string_field(item, &["start_time", "time"])
            .and_then(|t| TimeOfDay::parse(&t))
            .unwrap_or(TimeOfDay::hm(9, 0)),
        duration: parse_duration(item.get("duration")),
        location: parse_location(item.get("location")),
    })
}

fn activity_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => ACTIVITY_LIST_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    }
}

/// Candidates for days `1..=days`; unknown days are dropped and missing
/// days get an empty list.
pub fn parse_candidates(
    raw: &str,
    days: u32,
) -> Result<BTreeMap<u32, Vec<LandmarkCandidate>>, ContentGenerationError> {
    if raw.trim().is_empty() {
        return Err(ContentGenerationError::EmptyResponse);
    }
    let object = extract_object(raw)
        .ok_or_else(|| ContentGenerationError::Unparseable("no JSON object found".to_string()))?;
    let root: Value = serde_json::from_str(object)
        .map_err(|e| ContentGenerationError::Unparseable(e.to_string()))?;
    let Value::Object(root) = root else {
        return Err(ContentGenerationError::Unparseable("expected a JSON object".to_string()));
    };

    let mut entries: Vec<(u32, &Value)> = Vec::new();
    if let Some(Value::Array(list)) = root.get("days") {
        for (index, entry) in list.iter().enumerate() {
            let day = entry
                .get("day")
                .and_then(Value::as_u64)
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(u32::try_from(index + 1).unwrap_or(u32::MAX));
            entries.push((day, entry));
        }
    } else {
        for (key, value) in &root {
            if let Some(day) = parse_day_key(key) {
                entries.push((day, value));
            }
        }
    }

    let mut by_day: BTreeMap<u32, Vec<LandmarkCandidate>> =
        (1..=days).map(|d| (d, Vec::new())).collect();
    let mut recognized = false;
    for (day, value) in entries {
        let Some(items) = activity_list(value) else {
            continue;
        };
        recognized = true;
        if let Some(slot) = by_day.get_mut(&day) {
            slot.extend(items.iter().filter_map(parse_item));
        }
    }

    if !recognized {
        return Err(ContentGenerationError::Unparseable(
            "no day entries in completion".to_string(),
        ));
    }
    Ok(by_day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("day_1", Some(1))]
    #[case("Day 2", Some(2))]
    #[case("day3", Some(3))]
    #[case("4", Some(4))]
    #[case("notes", None)]
    fn test_day_keys(#[case] key: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_day_key(key), expected);
    }

    #[test]
    fn test_parses_fenced_output_and_skips_restaurants() {
        let raw = r#"```json
        {
          "day_1": [
            {"name": "Griffith Observatory", "type": "landmark", "start_time": "10:00",
             "duration": "2h", "location": {"lat": 34.118, "lng": -118.300}},
            {"name": "Grand Central Market", "type": "restaurant"},
            {"description": "no name"}
          ],
          "day_2": {"activities": [{"title": "The Getty", "duration": 3}]},
          "day_9": [{"name": "Out of range"}]
        }
        ```"#;

        let parsed = parse_candidates(raw, 2).unwrap();

        assert_eq!(parsed[&1].len(), 1);
        let observatory = &parsed[&1][0];
        assert_eq!(observatory.start_time, TimeOfDay::hm(10, 0));
        assert_eq!(observatory.location, Some(Coordinates::new(34.118, -118.300)));
        assert_eq!(parsed[&2][0].name, "The Getty");
        assert_eq!(parsed[&2][0].duration, ActivityDuration::hours(3));
        assert!(!parsed.contains_key(&9));
    }

    #[test]
    fn test_defaults_for_missing_time_and_duration() {
        let parsed = parse_candidates(r#"{"day_1": [{"name": "Pike Place"}]}"#, 1).unwrap();
        let candidate = &parsed[&1][0];
        assert_eq!(candidate.start_time, TimeOfDay::hm(9, 0));
        assert_eq!(candidate.duration, ActivityDuration::hours(2));
    }

    #[test]
    fn test_days_array_shape() {
        let raw = r#"{"days": [{"day": 1, "landmarks": [{"name": "A"}]}, {"landmarks": [{"name": "B"}]}]}"#;
        let parsed = parse_candidates(raw, 2).unwrap();
        assert_eq!(parsed[&1][0].name, "A");
        assert_eq!(parsed[&2][0].name, "B");
    }

    #[test]
    fn test_missing_days_get_empty_lists() {
        let parsed = parse_candidates(r#"{"day_2": [{"name": "B"}]}"#, 3).unwrap();
        assert!(parsed[&1].is_empty());
        assert!(parsed[&3].is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("I cannot help with that.")]
    #[case("{not json}")]
    #[case(r#"{"summary": "lovely trip"}"#)]
    fn test_garbage_is_rejected(#[case] raw: &str) {
        assert!(parse_candidates(raw, 2).is_err());
    }
}
