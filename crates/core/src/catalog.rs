//! Read-only curriculum graph: sports, their ordered modules, and lessons with
//! prerequisite edges.
//!
//! A catalog is built in one step from a [`CurriculumDraft`]. Either every
//! integrity check passes and the whole catalog is returned, or nothing is.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Lesson, LessonId, Module, ModuleId, Sport, SportId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate sport id: {0}")]
    DuplicateSport(SportId),

    #[error("duplicate module id: {0}")]
    DuplicateModule(ModuleId),

    #[error("duplicate lesson id: {0}")]
    DuplicateLesson(LessonId),

    #[error("module {module} declares sport {declared} but is listed under {parent}")]
    ModuleSportMismatch {
        module: ModuleId,
        declared: SportId,
        parent: SportId,
    },

    #[error("lesson {lesson} belongs to {declared_sport}/{declared_module}, not {sport}/{module}")]
    LessonParentMismatch {
        lesson: LessonId,
        declared_sport: SportId,
        declared_module: ModuleId,
        sport: SportId,
        module: ModuleId,
    },

    #[error("lesson {lesson} requires unknown lesson {prerequisite}")]
    UnknownPrerequisite {
        lesson: LessonId,
        prerequisite: LessonId,
    },

    #[error("lesson {0} lists itself as a prerequisite")]
    SelfPrerequisite(LessonId),

    #[error("prerequisite cycle through lesson {0}")]
    PrerequisiteCycle(LessonId),
}

//
// ─── DRAFT (raw content) ───────────────────────────────────────────────────────
//

/// Raw curriculum as supplied by a content source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumDraft {
    #[serde(default)]
    pub sports: Vec<SportDraft>,
}

/// A sport together with its modules (each carrying its lessons).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SportDraft {
    #[serde(flatten)]
    pub sport: Sport,
    #[serde(default)]
    pub modules: Vec<Module>,
}

//
// ─── LOCK STATE ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked,
}

impl LockState {
    #[must_use]
    pub fn is_unlocked(self) -> bool {
        matches!(self, LockState::Unlocked)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct LessonEntry {
    lesson: Lesson,
    module_position: u32,
}

/// Validated, immutable curriculum.
#[derive(Debug, Clone, Default)]
pub struct CurriculumCatalog {
    sports: Vec<Sport>,
    modules: HashMap<SportId, Vec<Module>>,
    lessons: HashMap<LessonId, LessonEntry>,
}

impl CurriculumCatalog {
    /// Validate a draft and build the catalog from it.
    ///
    /// Modules are ordered by `order` within their sport and lessons by
    /// `order` within their module. Repeated prerequisite entries collapse to
    /// one, keeping first-occurrence order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for duplicate ids, lessons or modules filed under
    /// the wrong parent, prerequisites that name unknown lessons or the lesson
    /// itself, and prerequisite cycles.
    pub fn load(draft: CurriculumDraft) -> Result<Self, CatalogError> {
        let mut sports = Vec::with_capacity(draft.sports.len());
        let mut modules: HashMap<SportId, Vec<Module>> = HashMap::new();
        let mut lessons: HashMap<LessonId, LessonEntry> = HashMap::new();
        let mut seen_modules: HashSet<ModuleId> = HashSet::new();

        for SportDraft {
            sport,
            modules: mut sport_modules,
        } in draft.sports
        {
            if modules.contains_key(&sport.id) {
                return Err(CatalogError::DuplicateSport(sport.id));
            }

            sport_modules.sort_by_key(|m| m.order);
            for (position, module) in sport_modules.iter_mut().enumerate() {
                if !seen_modules.insert(module.id.clone()) {
                    return Err(CatalogError::DuplicateModule(module.id.clone()));
                }
                if module.sport_id != sport.id {
                    return Err(CatalogError::ModuleSportMismatch {
                        module: module.id.clone(),
                        declared: module.sport_id.clone(),
                        parent: sport.id.clone(),
                    });
                }

                module.lessons.sort_by_key(|l| l.order);
                let module_position = u32::try_from(position).unwrap_or(u32::MAX);
                for lesson in &mut module.lessons {
                    if lesson.sport_id != sport.id || lesson.module_id != module.id {
                        return Err(CatalogError::LessonParentMismatch {
                            lesson: lesson.id.clone(),
                            declared_sport: lesson.sport_id.clone(),
                            declared_module: lesson.module_id.clone(),
                            sport: sport.id.clone(),
                            module: module.id.clone(),
                        });
                    }
                    dedup_in_order(&mut lesson.prerequisites);
                    if lessons.contains_key(&lesson.id) {
                        return Err(CatalogError::DuplicateLesson(lesson.id.clone()));
                    }
                    lessons.insert(
                        lesson.id.clone(),
                        LessonEntry {
                            lesson: lesson.clone(),
                            module_position,
                        },
                    );
                }
            }

            modules.insert(sport.id.clone(), sport_modules);
            sports.push(sport);
        }

        check_prerequisites(&lessons)?;

        Ok(Self {
            sports,
            modules,
            lessons,
        })
    }

    /// All sports in content order.
    #[must_use]
    pub fn sports(&self) -> &[Sport] {
        &self.sports
    }

    /// Sports that are currently offered.
    pub fn available_sports(&self) -> impl Iterator<Item = &Sport> {
        self.sports.iter().filter(|s| s.is_available)
    }

    #[must_use]
    pub fn sport(&self, sport_id: &SportId) -> Option<&Sport> {
        self.sports.iter().find(|s| &s.id == sport_id)
    }

    /// Modules of a sport ordered by `order`; empty for unknown sports.
    #[must_use]
    pub fn modules_of(&self, sport_id: &SportId) -> &[Module] {
        self.modules
            .get(sport_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn module(&self, module_id: &ModuleId) -> Option<&Module> {
        self.modules
            .values()
            .flat_map(|mods| mods.iter())
            .find(|m| &m.id == module_id)
    }

    /// Lessons of a sport in curriculum order (module order, then lesson order).
    pub fn lessons_of_sport(&self, sport_id: &SportId) -> impl Iterator<Item = &Lesson> {
        self.modules_of(sport_id)
            .iter()
            .flat_map(|m| m.lessons.iter())
    }

    #[must_use]
    pub fn lesson_count(&self, sport_id: &SportId) -> usize {
        self.modules_of(sport_id).iter().map(|m| m.lessons.len()).sum()
    }

    #[must_use]
    pub fn get_lesson(&self, lesson_id: &LessonId) -> Option<&Lesson> {
        self.lessons.get(lesson_id).map(|e| &e.lesson)
    }

    /// Index of the lesson's module within its sport.
    #[must_use]
    pub fn module_position(&self, lesson_id: &LessonId) -> Option<u32> {
        self.lessons.get(lesson_id).map(|e| e.module_position)
    }

    /// Prerequisites of a lesson; empty when it has none or is unknown.
    #[must_use]
    pub fn prerequisites_of(&self, lesson_id: &LessonId) -> &[LessonId] {
        self.lessons
            .get(lesson_id)
            .map(|e| e.lesson.prerequisites.as_slice())
            .unwrap_or_default()
    }

    /// True iff every prerequisite of `lesson_id` is in `completed`.
    ///
    /// This is the only unlock rule; `Lesson::is_locked` is ignored.
    #[must_use]
    pub fn is_unlocked(&self, lesson_id: &LessonId, completed: &[LessonId]) -> bool {
        self.prerequisites_of(lesson_id)
            .iter()
            .all(|p| completed.contains(p))
    }

    #[must_use]
    pub fn lock_state(&self, lesson_id: &LessonId, completed: &[LessonId]) -> LockState {
        if self.is_unlocked(lesson_id, completed) {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }
}

fn dedup_in_order(ids: &mut Vec<LessonId>) {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.retain(|id| seen.insert(id.clone()));
}

fn check_prerequisites(lessons: &HashMap<LessonId, LessonEntry>) -> Result<(), CatalogError> {
    for (id, entry) in lessons {
        for prerequisite in &entry.lesson.prerequisites {
            if prerequisite == id {
                return Err(CatalogError::SelfPrerequisite(id.clone()));
            }
            if !lessons.contains_key(prerequisite) {
                return Err(CatalogError::UnknownPrerequisite {
                    lesson: id.clone(),
                    prerequisite: prerequisite.clone(),
                });
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    // Iterative DFS so deep chains cannot overflow the stack.
    let mut marks: HashMap<&LessonId, Mark> = HashMap::with_capacity(lessons.len());
    let mut roots: Vec<&LessonId> = lessons.keys().collect();
    roots.sort();
    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        let mut stack: Vec<(&LessonId, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Visiting);
        while let Some((node, next_edge)) = stack.pop() {
            let edges = &lessons[node].lesson.prerequisites;
            if let Some(child) = edges.get(next_edge) {
                stack.push((node, next_edge + 1));
                match marks.get(child) {
                    Some(Mark::Visiting) => {
                        return Err(CatalogError::PrerequisiteCycle(child.clone()));
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                }
            } else {
                marks.insert(node, Mark::Done);
            }
        }
    }
    Ok(())
}
