mod ids;
mod lesson;
mod progress;
mod quiz;
mod sport;

pub use ids::{LessonId, ModuleId, ParseIdError, ProgressKey, QuizResultId, SportId, UserId};

pub use lesson::{Lesson, LessonSection, LessonSectionType, Module};
pub use progress::{Progress, XP_PER_LEVEL, level_for_xp, level_title};
pub use quiz::{PASSING_PERCENTAGE, QuizError, QuizResult};
pub use sport::{Difficulty, Sport, SportCategory};
