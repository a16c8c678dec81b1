use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use sporty_core::engine::{self, average_quiz_score};
use sporty_core::model::{
    Lesson, LessonId, ModuleId, Progress, ProgressKey, QuizResult, SportId, UserId,
};
use sporty_core::{CurriculumCatalog, LockState};

use crate::error::ProgressServiceError;
use crate::progress_store::{ProgressChanged, ProgressStore};

//
// ─── VIEW TYPES ────────────────────────────────────────────────────────────────
//

/// Completion of one module for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProgress {
    pub module_id: ModuleId,
    pub title: String,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    /// `completed_lessons / total_lessons`, 0 for an empty module.
    pub fraction: f64,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Catalog-aware entry point for presentation code.
///
/// Resolves sport, XP reward and module position from the catalog, then hands
/// the event to the store.
#[derive(Clone)]
pub struct ProgressService {
    catalog: Arc<CurriculumCatalog>,
    store: Arc<ProgressStore>,
}

impl ProgressService {
    #[must_use]
    pub fn new(catalog: Arc<CurriculumCatalog>, store: Arc<ProgressStore>) -> Self {
        Self { catalog, store }
    }

    #[must_use]
    pub fn catalog(&self) -> &CurriculumCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn store(&self) -> Arc<ProgressStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressChanged> {
        self.store.subscribe()
    }

    /// Progress for `user_id` in `sport_id`; a fresh aggregate if none exists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Store` if the repository read fails.
    pub async fn progress(
        &self,
        user_id: &UserId,
        sport_id: &SportId,
    ) -> Result<Progress, ProgressServiceError> {
        let key = ProgressKey::new(user_id.clone(), sport_id.clone());
        Ok(self.store.get(&key).await?)
    }

    /// Complete a lesson, awarding its catalog XP.
    ///
    /// Lock state is reported by [`ProgressService::lock_state`] and is not
    /// enforced here.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for a lesson missing from the catalog, or
    /// `Store` if the write fails.
    pub async fn complete_lesson(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<Progress, ProgressServiceError> {
        let lesson = self.lesson(lesson_id)?;
        let key = ProgressKey::new(user_id.clone(), lesson.sport_id.clone());
        let position = self.catalog.module_position(lesson_id);
        let progress = self
            .store
            .complete_lesson(&key, lesson.id.clone(), lesson.xp_reward, position)
            .await?;
        Ok(progress)
    }

    /// Record an already-built quiz result against the lesson's sport.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` if the quiz names an unknown lesson, or
    /// `Store` if the write fails.
    pub async fn record_quiz(
        &self,
        user_id: &UserId,
        result: QuizResult,
    ) -> Result<Progress, ProgressServiceError> {
        let lesson = self.lesson(result.lesson_id())?;
        let key = ProgressKey::new(user_id.clone(), lesson.sport_id.clone());
        Ok(self.store.record_quiz_result(&key, result).await?)
    }

    /// Build a quiz result stamped with the store's clock and record it.
    ///
    /// # Errors
    ///
    /// Returns `Quiz` when `score` exceeds `total_questions`, plus the errors
    /// of [`ProgressService::record_quiz`].
    pub async fn submit_quiz(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
        score: u32,
        total_questions: u32,
        time_spent: Duration,
    ) -> Result<Progress, ProgressServiceError> {
        let lesson = self.lesson(lesson_id)?;
        let result = QuizResult::new(
            lesson.id.clone(),
            score,
            total_questions,
            self.store.clock().now(),
            time_spent,
        )?;
        self.record_quiz(user_id, result).await
    }

    /// Derived lock state of a lesson for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for an unknown lesson, or `Store` if the
    /// progress read fails.
    pub async fn lock_state(
        &self,
        user_id: &UserId,
        lesson_id: &LessonId,
    ) -> Result<LockState, ProgressServiceError> {
        let lesson = self.lesson(lesson_id)?;
        let progress = self.progress(user_id, &lesson.sport_id).await?;
        Ok(engine::resolve_lock_state(
            &self.catalog,
            &progress,
            lesson_id,
        ))
    }

    /// Every lesson of the sport in curriculum order, with its lock state.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the progress read fails.
    pub async fn lesson_states(
        &self,
        user_id: &UserId,
        sport_id: &SportId,
    ) -> Result<Vec<(&Lesson, LockState)>, ProgressServiceError> {
        let progress = self.progress(user_id, sport_id).await?;
        Ok(engine::lesson_states(&self.catalog, &progress))
    }

    /// Per-module completion for the sport, in module order. Unknown sports
    /// have no modules.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the progress read fails.
    pub async fn module_progress(
        &self,
        user_id: &UserId,
        sport_id: &SportId,
    ) -> Result<Vec<ModuleProgress>, ProgressServiceError> {
        let progress = self.progress(user_id, sport_id).await?;
        let completed = progress.completed_lessons();
        Ok(self
            .catalog
            .modules_of(sport_id)
            .iter()
            .map(|module| ModuleProgress {
                module_id: module.id.clone(),
                title: module.title.clone(),
                completed_lessons: module
                    .lessons
                    .iter()
                    .filter(|lesson| progress.has_completed(&lesson.id))
                    .count(),
                total_lessons: module.lessons.len(),
                fraction: module.progress_percentage(completed),
            })
            .collect())
    }

    /// The first unlocked lesson of the sport the user has not completed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the progress read fails.
    pub async fn next_lesson(
        &self,
        user_id: &UserId,
        sport_id: &SportId,
    ) -> Result<Option<&Lesson>, ProgressServiceError> {
        let progress = self.progress(user_id, sport_id).await?;
        Ok(engine::next_lesson(&self.catalog, &progress))
    }

    /// Mean quiz percentage for the sport; 0 with no quizzes.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the progress read fails.
    pub async fn average_quiz_score(
        &self,
        user_id: &UserId,
        sport_id: &SportId,
    ) -> Result<f64, ProgressServiceError> {
        let progress = self.progress(user_id, sport_id).await?;
        Ok(average_quiz_score(&progress))
    }

    fn lesson(&self, lesson_id: &LessonId) -> Result<&Lesson, ProgressServiceError> {
        self.catalog
            .get_lesson(lesson_id)
            .ok_or_else(|| ProgressServiceError::LessonNotFound(lesson_id.clone()))
    }
}
