//! Low-purine dish recommendations
//!
//! A small catalog the chat assistant can draw on. Recommendations are
//! filtered by taste and mood, capped by purine content and rendered as
//! text that can be placed in a system prompt.

use serde::{Deserialize, Serialize};

/// Dishes at or above this purine content (mg/100g) are never recommended
pub const PURINE_LIMIT: f64 = 300.0;

/// Maximum number of dishes in a formatted recommendation
pub const MAX_FORMATTED_DISHES: usize = 5;

const NO_MATCH_MESSAGE: &str = "Sorry, no dishes match your preferences.";

/// One dish in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub name: String,
    /// Purine content in mg per 100g
    pub purine_content: f64,
    /// Taste tags, e.g. "light" or "sweet and sour"
    pub tastes: Vec<String>,
    /// Moods the dish suits, e.g. "tired"
    pub moods: Vec<String>,
    /// Kind of dish, e.g. "stir-fry" or "soup"
    pub category: String,
}

impl Dish {
    pub fn new(
        name: impl Into<String>,
        purine_content: f64,
        tastes: &[&str],
        moods: &[&str],
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            purine_content,
            tastes: tastes.iter().map(|t| t.to_string()).collect(),
            moods: moods.iter().map(|m| m.to_string()).collect(),
            category: category.into(),
        }
    }
}

/// What the user asked for. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    #[serde(default)]
    pub tastes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

impl Preference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taste(mut self, taste: impl Into<String>) -> Self {
        self.tastes.push(taste.into());
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }
}

/// Collection of dishes to recommend from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DishCatalog {
    dishes: Vec<Dish>,
}

impl DishCatalog {
    pub fn new(dishes: Vec<Dish>) -> Self {
        Self { dishes }
    }

    /// The built-in starter catalog
    pub fn with_defaults() -> Self {
        Self::new(vec![
            Dish::new(
                "Scrambled eggs with tomato",
                38.5,
                &["light", "sweet and sour"],
                &["tired", "calm"],
                "stir-fry",
            ),
            Dish::new(
                "Shredded potato with green pepper",
                25.0,
                &["light", "mildly spicy"],
                &["calm", "everyday"],
                "stir-fry",
            ),
        ])
    }

    pub fn add(&mut self, dish: Dish) {
        self.dishes.push(dish);
    }

    pub fn dishes(&self) -> &[Dish] {
        &self.dishes
    }

    pub fn len(&self) -> usize {
        self.dishes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dishes.is_empty()
    }

    /// Dishes matching `preference`, lowest purine content first.
    ///
    /// A dish matches when it is below [`PURINE_LIMIT`], shares at least one
    /// taste with the preference (if any are given) and lists the mood (if
    /// one is given).
    pub fn recommend(&self, preference: &Preference) -> Vec<&Dish> {
        let mood = preference.mood.as_deref().filter(|m| !m.is_empty());

        let mut matches: Vec<&Dish> = self
            .dishes
            .iter()
            .filter(|dish| dish.purine_content < PURINE_LIMIT)
            .filter(|dish| {
                preference.tastes.is_empty()
                    || preference.tastes.iter().any(|t| dish.tastes.contains(t))
            })
            .filter(|dish| mood.map_or(true, |m| dish.moods.iter().any(|d| d == m)))
            .collect();

        matches.sort_by(|a, b| a.purine_content.total_cmp(&b.purine_content));
        matches
    }

    /// Recommendation text for `preference`, ready for a system prompt
    pub fn context_prompt(&self, preference: &Preference) -> String {
        format_recommendations(&self.recommend(preference))
    }
}

/// Render up to [`MAX_FORMATTED_DISHES`] dishes as a numbered list
pub fn format_recommendations(dishes: &[&Dish]) -> String {
    if dishes.is_empty() {
        return NO_MATCH_MESSAGE.to_string();
    }

    let entries: Vec<String> = dishes
        .iter()
        .take(MAX_FORMATTED_DISHES)
        .enumerate()
        .map(|(index, dish)| {
            format!(
                "{}. {}\n   Taste: {}\n   Purine: {:.1}mg/100g\n",
                index + 1,
                dish.name,
                dish.tastes.join(", "),
                dish.purine_content
            )
        })
        .collect();

    format!("Recommended dishes:\n\n{}", entries.join("\n"))
}
