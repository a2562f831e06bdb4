//! Prompt text for the unified landmark request

use std::fmt::Write;

use crate::classify;
use crate::models::TripRequest;

/// Days whose mandatory attractions include an all-day park
#[must_use]
pub fn theme_park_days(request: &TripRequest) -> Vec<u32> {
    request
        .days()
        .filter(|day| {
            request
                .mandatory_for(*day)
                .iter()
                .any(|a| classify::is_theme_park(&a.name, a.description.as_deref(), &[]))
        })
        .collect()
}

#[must_use]
pub fn build_prompt(request: &TripRequest) -> String {
    let mut prompt = String::new();
    let days = request.travel_days;

    let _ = writeln!(
        prompt,
        "Plan sightseeing for a {days}-day trip to {}.",
        request.destination
    );

    let traveler = &request.traveler;
    let mut party = Vec::new();
    if traveler.with_kids {
        if traveler.kids_age.is_empty() {
            party.push("children".to_string());
        } else {
            let ages: Vec<String> = traveler.kids_age.iter().map(u8::to_string).collect();
            party.push(format!("children aged {}", ages.join(", ")));
        }
    }
    if traveler.with_elders {
        party.push("elderly travelers".to_string());
    }
    if !party.is_empty() {
        let _ = writeln!(prompt, "The group includes {}.", party.join(" and "));
    }
    if let Some(requests) = &request.special_requests {
        let _ = writeln!(prompt, "Special requests: {requests}");
    }
    if !request.wishlist.is_empty() {
        let _ = writeln!(prompt, "Places the travelers hope to see: {}.", request.wishlist.join(", "));
    }

    for day in request.days() {
        let mandatory = request.mandatory_for(day);
        if !mandatory.is_empty() {
            let names: Vec<&str> = mandatory.iter().map(|a| a.name.as_str()).collect();
            let _ = writeln!(prompt, "Day {day} must include: {}.", names.join(", "));
        }
    }

    let parks = theme_park_days(request);
    if !parks.is_empty() {
        let listed: Vec<String> = parks.iter().map(u32::to_string).collect();
        let _ = writeln!(
            prompt,
            "Days {} are full theme park days: list only the park for those days.",
            listed.join(", ")
        );
    }

    let _ = writeln!(
        prompt,
        "\nRules:\n\
         - Suggest 2 or 3 landmarks per day, never the same place on two days.\n\
         - Do not include restaurants, cafes or meals.\n\
         - Group each day's landmarks geographically.\n\
         - Times are 24h \"HH:MM\", durations like \"2h\" or \"1.5h\"."
    );

    let _ = writeln!(
        prompt,
        "\nRespond with JSON only, shaped as:\n\
         {{\"day_1\": [{{\"name\": \"...\", \"type\": \"landmark\", \"description\": \"...\", \
         \"start_time\": \"09:00\", \"duration\": \"2h\", \"location\": {{\"lat\": 0.0, \"lng\": 0.0}}}}], \
         ... \"day_{days}\": [...]}}"
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MandatoryAttraction;

    #[test]
    fn test_prompt_mentions_every_input() {
        let mut request = TripRequest::new("Orlando, FL", 2)
            .with_attraction(1, MandatoryAttraction::named("Magic Kingdom"))
            .with_attraction(2, MandatoryAttraction::named("Lake Eola Park"));
        request.traveler.with_kids = true;
        request.traveler.kids_age = vec![6, 9];
        request.wishlist = vec!["Kennedy Space Center".to_string()];
        request.special_requests = Some("avoid long walks".to_string());

        let prompt = build_prompt(&request);

        assert!(prompt.contains("2-day trip to Orlando, FL"));
        assert!(prompt.contains("children aged 6, 9"));
        assert!(prompt.contains("Day 1 must include: Magic Kingdom."));
        assert!(prompt.contains("Kennedy Space Center"));
        assert!(prompt.contains("avoid long walks"));
        assert!(prompt.contains("Days 1 are full theme park days"));
        assert!(prompt.contains("\"day_2\""));
    }

    #[test]
    fn test_theme_park_days() {
        let request = TripRequest::new("Orlando", 3)
            .with_attraction(2, MandatoryAttraction::named("Universal Studios Florida"))
            .with_attraction(3, MandatoryAttraction::named("Orlando Museum of Art"));
        assert_eq!(theme_park_days(&request), vec![2]);
    }
}
