//! Keyword classification of place names and provider categories
//!
//! All name-based heuristics (theme parks, hotels, breakfast spots) go
//! through the tables below so they can be tested and extended in one place.

use std::collections::BTreeSet;

/// Activity length at which a landmark is treated as an all-day park
pub const THEME_PARK_MIN_MINUTES: u16 = 360;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    ThemePark,
    Lodging,
    BreakfastVenue,
    /// Dessert and snack shops that cannot host a full meal
    NonMealVenue,
}

/// Normalized phrases matched on word boundaries
static KEYWORDS: &[(&str, Category)] = &[
    ("universal studios", Category::ThemePark),
    ("disney world", Category::ThemePark),
    ("disneyland", Category::ThemePark),
    ("disneysea", Category::ThemePark),
    ("magic kingdom", Category::ThemePark),
    ("epcot", Category::ThemePark),
    ("hollywood studios", Category::ThemePark),
    ("animal kingdom", Category::ThemePark),
    ("islands of adventure", Category::ThemePark),
    ("volcano bay", Category::ThemePark),
    ("epic universe", Category::ThemePark),
    ("theme park", Category::ThemePark),
    ("amusement park", Category::ThemePark),
    ("six flags", Category::ThemePark),
    ("busch gardens", Category::ThemePark),
    ("seaworld", Category::ThemePark),
    ("legoland", Category::ThemePark),
    ("hotel", Category::Lodging),
    ("motel", Category::Lodging),
    ("hostel", Category::Lodging),
    ("inn", Category::Lodging),
    ("resort", Category::Lodging),
    ("suites", Category::Lodging),
    ("lodge", Category::Lodging),
    ("bed and breakfast", Category::Lodging),
    ("breakfast", Category::BreakfastVenue),
    ("brunch", Category::BreakfastVenue),
    ("cafe", Category::BreakfastVenue),
    ("café", Category::BreakfastVenue),
    ("coffee", Category::BreakfastVenue),
    ("bakery", Category::BreakfastVenue),
    ("pancake", Category::BreakfastVenue),
    ("pancakes", Category::BreakfastVenue),
    ("waffle", Category::BreakfastVenue),
    ("bagel", Category::BreakfastVenue),
    ("bagels", Category::BreakfastVenue),
    ("diner", Category::BreakfastVenue),
    ("ice cream", Category::NonMealVenue),
    ("gelato", Category::NonMealVenue),
    ("dessert", Category::NonMealVenue),
    ("desserts", Category::NonMealVenue),
    ("frozen yogurt", Category::NonMealVenue),
    ("candy", Category::NonMealVenue),
    ("juice bar", Category::NonMealVenue),
];

/// Provider category identifiers
static PLACE_TYPES: &[(&str, Category)] = &[
    ("amusement_park", Category::ThemePark),
    ("lodging", Category::Lodging),
    ("hotel", Category::Lodging),
    ("motel", Category::Lodging),
    ("resort_hotel", Category::Lodging),
    ("bed_and_breakfast", Category::Lodging),
    ("bakery", Category::BreakfastVenue),
    ("cafe", Category::BreakfastVenue),
    ("coffee_shop", Category::BreakfastVenue),
    ("breakfast_restaurant", Category::BreakfastVenue),
    ("brunch_restaurant", Category::BreakfastVenue),
    ("ice_cream_shop", Category::NonMealVenue),
    ("dessert_shop", Category::NonMealVenue),
    ("candy_store", Category::NonMealVenue),
];

/// Lowercase, replace punctuation with spaces and collapse whitespace
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .filter(|c| *c != '\'')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Categories whose keywords occur in `text`
#[must_use]
pub fn classify(text: &str) -> BTreeSet<Category> {
    let padded = format!(" {} ", normalize_text(text));
    KEYWORDS
        .iter()
        .filter(|(keyword, _)| padded.contains(&format!(" {keyword} ")))
        .map(|(_, category)| *category)
        .collect()
}

/// Categories implied by provider types
#[must_use]
pub fn classify_types(types: &[String]) -> BTreeSet<Category> {
    PLACE_TYPES
        .iter()
        .filter(|(place_type, _)| types.iter().any(|t| t == place_type))
        .map(|(_, category)| *category)
        .collect()
}

fn matches(name: &str, description: Option<&str>, types: &[String], category: Category) -> bool {
    classify(name).contains(&category)
        || description.is_some_and(|d| classify(d).contains(&category))
        || classify_types(types).contains(&category)
}

/// Name, description or provider types identify an all-day park
#[must_use]
pub fn is_theme_park(name: &str, description: Option<&str>, types: &[String]) -> bool {
    matches(name, description, types, Category::ThemePark)
}

#[must_use]
pub fn is_lodging(name: &str, types: &[String]) -> bool {
    matches(name, None, types, Category::Lodging)
}

#[must_use]
pub fn is_breakfast_venue(name: &str, types: &[String]) -> bool {
    matches(name, None, types, Category::BreakfastVenue)
}

#[must_use]
pub fn is_non_meal_venue(name: &str, types: &[String]) -> bool {
    matches(name, None, types, Category::NonMealVenue)
}
