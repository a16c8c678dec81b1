use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ids::{LessonId, ModuleId, SportId};

//
// ─── SECTIONS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonSectionType {
    Text,
    Image,
    Video,
    Diagram,
    Quiz,
}

/// One block of lesson content, rendered in `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LessonSectionType,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<Url>,
    #[serde(default, rename = "videoURL")]
    pub video_url: Option<Url>,
    pub order: u32,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single lesson and the prerequisite lessons that gate it.
///
/// `is_locked` is the content source's static hint and is never consulted for
/// unlock decisions; use `CurriculumCatalog::is_unlocked` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: LessonId,
    pub sport_id: SportId,
    pub module_id: ModuleId,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: Vec<LessonSection>,
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,
    #[serde(default = "default_xp_reward")]
    pub xp_reward: u32,
    #[serde(default)]
    pub prerequisites: Vec<LessonId>,
    #[serde(default)]
    pub is_locked: bool,
}

fn default_estimated_minutes() -> u32 {
    5
}

fn default_xp_reward() -> u32 {
    10
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// An ordered group of lessons inside a sport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: ModuleId,
    pub sport_id: SportId,
    pub order: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Module {
    /// Sum of the XP rewards of every lesson in the module.
    #[must_use]
    pub fn total_xp(&self) -> u64 {
        self.lessons.iter().map(|l| u64::from(l.xp_reward)).sum()
    }

    /// Fraction (0.0..=1.0) of this module's lessons found in `completed`.
    ///
    /// Returns 0 for a module without lessons.
    #[must_use]
    pub fn progress_percentage(&self, completed: &[LessonId]) -> f64 {
        if self.lessons.is_empty() {
            return 0.0;
        }
        let done = self
            .lessons
            .iter()
            .filter(|lesson| completed.contains(&lesson.id))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let ratio = done as f64 / self.lessons.len() as f64;
        ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, xp: u32) -> Lesson {
        Lesson {
            id: LessonId::new(id),
            sport_id: SportId::new("basketball"),
            module_id: ModuleId::new("fundamentals"),
            order: 0,
            title: id.to_uppercase(),
            description: String::new(),
            content: Vec::new(),
            estimated_minutes: 5,
            xp_reward: xp,
            prerequisites: Vec::new(),
            is_locked: false,
        }
    }

    fn module(lessons: Vec<Lesson>) -> Module {
        Module {
            id: ModuleId::new("fundamentals"),
            sport_id: SportId::new("basketball"),
            order: 0,
            title: "Fundamentals".into(),
            description: String::new(),
            lessons,
        }
    }

    #[test]
    fn total_xp_sums_lessons() {
        let m = module(vec![lesson("a", 10), lesson("b", 25)]);
        assert_eq!(m.total_xp(), 35);
    }

    #[test]
    fn progress_percentage_counts_completed_lessons() {
        let lessons = ["a", "b", "c", "d"].map(|id| lesson(id, 10));
        let m = module(Vec::from(lessons));
        let completed = vec![LessonId::new("a"), LessonId::new("c"), LessonId::new("other")];
        let fraction = m.progress_percentage(&completed);
        assert!((fraction - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_module_has_zero_progress() {
        let m = module(Vec::new());
        assert_eq!(m.progress_percentage(&[LessonId::new("a")]), 0.0);
    }

    #[test]
    fn lesson_json_uses_content_field_names() {
        let raw = r#"{
            "id": "bb-2",
            "sportId": "basketball",
            "moduleId": "fundamentals",
            "order": 2,
            "title": "Dribbling",
            "xpReward": 30,
            "prerequisites": ["bb-1"],
            "isLocked": true,
            "content": [
                {"id": "s1", "type": "video", "content": "Watch", "videoURL": "https://example.com/v.mp4", "order": 0}
            ]
        }"#;
        let lesson: Lesson = serde_json::from_str(raw).unwrap();
        assert_eq!(lesson.xp_reward, 30);
        assert_eq!(lesson.estimated_minutes, 5);
        assert_eq!(lesson.prerequisites, vec![LessonId::new("bb-1")]);
        assert_eq!(lesson.content[0].kind, LessonSectionType::Video);
        assert_eq!(
            lesson.content[0].video_url.as_ref().map(Url::as_str),
            Some("https://example.com/v.mp4")
        );
    }

    #[test]
    fn negative_xp_reward_is_rejected_at_parse_time() {
        let raw = r#"{"id":"x","sportId":"s","moduleId":"m","order":0,"title":"X","xpReward":-5}"#;
        assert!(serde_json::from_str::<Lesson>(raw).is_err());
    }
}
