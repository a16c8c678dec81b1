use serde::{Deserialize, Serialize};

use crate::model::ids::SportId;

//
// ─── DIFFICULTY / CATEGORY ─────────────────────────────────────────────────────
//

/// Difficulty tier of a sport curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SportCategory {
    #[default]
    TeamSport,
    IndividualSport,
    RacketSport,
    Motorsport,
}

impl SportCategory {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            SportCategory::TeamSport => "Team Sport",
            SportCategory::IndividualSport => "Individual Sport",
            SportCategory::RacketSport => "Racket Sport",
            SportCategory::Motorsport => "Motorsport",
        }
    }
}

//
// ─── SPORT ─────────────────────────────────────────────────────────────────────
//

/// A sport offered by the curriculum, with its display metadata.
///
/// `total_modules` and `total_lessons` are the counts declared by the content
/// source; the catalog derives the real counts from the module graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sport {
    pub id: SportId,
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub total_modules: u32,
    #[serde(default)]
    pub total_lessons: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub category: SportCategory,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}
