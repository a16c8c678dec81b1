use std::collections::HashMap;

use sporty_core::model::{LessonId, Module, ModuleId, SportId};
use sporty_core::{CurriculumDraft, SportDraft};
use sqlx::Row;
use tracing::{debug, info};

use super::SqliteRepository;
use super::mapping::{
    category_to_str, db, difficulty_to_str, map_lesson_row, map_sport_row, ser, to_u32,
};
use crate::repository::{ContentRepository, StorageError};

impl SqliteRepository {
    /// Replace the stored curriculum with `draft`.
    ///
    /// The draft is written as-is; run it through `CurriculumCatalog::load`
    /// first if it has not been validated. Progress rows are left alone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any statement fails; nothing is written in
    /// that case.
    #[allow(clippy::too_many_lines)]
    pub async fn import_curriculum(&self, draft: &CurriculumDraft) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        for table in ["lesson_prerequisites", "lessons", "modules", "sports"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(db)?;
        }

        let mut lesson_count = 0_usize;
        for (position, entry) in draft.sports.iter().enumerate() {
            let sport = &entry.sport;
            sqlx::query(
                r"
                INSERT INTO sports (
                    id, position, name, emoji, description, total_modules,
                    total_lessons, difficulty, category, is_premium, is_available
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
            )
            .bind(sport.id.as_str())
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(&sport.name)
            .bind(&sport.emoji)
            .bind(&sport.description)
            .bind(i64::from(sport.total_modules))
            .bind(i64::from(sport.total_lessons))
            .bind(difficulty_to_str(sport.difficulty))
            .bind(category_to_str(sport.category))
            .bind(i64::from(sport.is_premium))
            .bind(i64::from(sport.is_available))
            .execute(&mut *tx)
            .await
            .map_err(db)?;

            for module in &entry.modules {
                sqlx::query(
                    r"
                    INSERT INTO modules (id, sport_id, sort_order, title, description)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ",
                )
                .bind(module.id.as_str())
                .bind(sport.id.as_str())
                .bind(i64::from(module.order))
                .bind(&module.title)
                .bind(&module.description)
                .execute(&mut *tx)
                .await
                .map_err(db)?;

                for lesson in &module.lessons {
                    let sections = serde_json::to_string(&lesson.content).map_err(ser)?;
                    sqlx::query(
                        r"
                        INSERT INTO lessons (
                            id, sport_id, module_id, sort_order, title, description,
                            sections, estimated_minutes, xp_reward, is_locked
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        ",
                    )
                    .bind(lesson.id.as_str())
                    .bind(lesson.sport_id.as_str())
                    .bind(lesson.module_id.as_str())
                    .bind(i64::from(lesson.order))
                    .bind(&lesson.title)
                    .bind(&lesson.description)
                    .bind(sections)
                    .bind(i64::from(lesson.estimated_minutes))
                    .bind(i64::from(lesson.xp_reward))
                    .bind(i64::from(lesson.is_locked))
                    .execute(&mut *tx)
                    .await
                    .map_err(db)?;

                    for (idx, prerequisite) in lesson.prerequisites.iter().enumerate() {
                        sqlx::query(
                            r"
                            INSERT INTO lesson_prerequisites (lesson_id, prerequisite_id, position)
                            VALUES (?1, ?2, ?3)
                            ON CONFLICT(lesson_id, prerequisite_id) DO NOTHING
                            ",
                        )
                        .bind(lesson.id.as_str())
                        .bind(prerequisite.as_str())
                        .bind(i64::try_from(idx).map_err(ser)?)
                        .execute(&mut *tx)
                        .await
                        .map_err(db)?;
                    }
                    lesson_count += 1;
                }
            }
        }

        tx.commit().await.map_err(db)?;
        info!(
            sports = draft.sports.len(),
            lessons = lesson_count,
            "imported curriculum"
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl ContentRepository for SqliteRepository {
    async fn load_curriculum(&self) -> Result<CurriculumDraft, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let sport_rows = sqlx::query(
            r"
            SELECT id, name, emoji, description, total_modules, total_lessons,
                   difficulty, category, is_premium, is_available
            FROM sports
            ORDER BY position ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        let module_rows = sqlx::query(
            r"
            SELECT id, sport_id, sort_order, title, description
            FROM modules
            ORDER BY sport_id ASC, sort_order ASC, rowid ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        let lesson_rows = sqlx::query(
            r"
            SELECT id, sport_id, module_id, sort_order, title, description,
                   sections, estimated_minutes, xp_reward, is_locked
            FROM lessons
            ORDER BY module_id ASC, sort_order ASC, rowid ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        let prerequisite_rows = sqlx::query(
            r"
            SELECT lesson_id, prerequisite_id
            FROM lesson_prerequisites
            ORDER BY lesson_id ASC, position ASC
            ",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db)?;

        tx.commit().await.map_err(db)?;

        let mut prerequisites: HashMap<LessonId, Vec<LessonId>> = HashMap::new();
        for row in &prerequisite_rows {
            let lesson_id = LessonId::new(row.try_get::<String, _>("lesson_id").map_err(ser)?);
            let prerequisite =
                LessonId::new(row.try_get::<String, _>("prerequisite_id").map_err(ser)?);
            prerequisites.entry(lesson_id).or_default().push(prerequisite);
        }

        let mut lessons_by_module: HashMap<ModuleId, Vec<_>> = HashMap::new();
        for row in &lesson_rows {
            let mut lesson = map_lesson_row(row)?;
            lesson.prerequisites = prerequisites.remove(&lesson.id).unwrap_or_default();
            lessons_by_module
                .entry(lesson.module_id.clone())
                .or_default()
                .push(lesson);
        }

        let mut modules_by_sport: HashMap<SportId, Vec<Module>> = HashMap::new();
        for row in &module_rows {
            let id = ModuleId::new(row.try_get::<String, _>("id").map_err(ser)?);
            let sport_id = SportId::new(row.try_get::<String, _>("sport_id").map_err(ser)?);
            let module = Module {
                lessons: lessons_by_module.remove(&id).unwrap_or_default(),
                id,
                sport_id: sport_id.clone(),
                order: to_u32("sort_order", row.try_get("sort_order").map_err(ser)?)?,
                title: row.try_get("title").map_err(ser)?,
                description: row.try_get("description").map_err(ser)?,
            };
            modules_by_sport.entry(sport_id).or_default().push(module);
        }

        let mut sports = Vec::with_capacity(sport_rows.len());
        for row in &sport_rows {
            let sport = map_sport_row(row)?;
            let modules = modules_by_sport.remove(&sport.id).unwrap_or_default();
            sports.push(SportDraft { sport, modules });
        }

        debug!(sports = sports.len(), "loaded curriculum from sqlite");
        Ok(CurriculumDraft { sports })
    }
}
