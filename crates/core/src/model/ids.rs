use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Errors ────────────────────────────────────────────────────────────────────

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot be empty", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── String-backed identifiers ─────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self(trimmed.to_owned()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Opaque, already-authenticated user identifier.
    UserId
);
string_id!(
    /// Identifier of a sport in the curriculum catalog.
    SportId
);
string_id!(
    /// Identifier of a module within a sport.
    ModuleId
);
string_id!(
    /// Identifier of a lesson.
    LessonId
);
string_id!(
    /// Identifier of a recorded quiz attempt.
    QuizResultId
);

impl QuizResultId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// ─── Composite key ─────────────────────────────────────────────────────────────

/// Identity of a `Progress` aggregate: one per (user, sport) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressKey {
    user_id: UserId,
    sport_id: SportId,
}

impl ProgressKey {
    #[must_use]
    pub fn new(user_id: UserId, sport_id: SportId) -> Self {
        Self { user_id, sport_id }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn sport_id(&self) -> &SportId {
        &self.sport_id
    }
}

impl fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.sport_id)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_id_display() {
        let id = LessonId::new("bb-101");
        assert_eq!(id.to_string(), "bb-101");
    }

    #[test]
    fn sport_id_from_str_trims() {
        let id: SportId = "  basketball ".parse().unwrap();
        assert_eq!(id, SportId::new("basketball"));
    }

    #[test]
    fn empty_id_is_rejected() {
        let err = "   ".parse::<LessonId>().unwrap_err();
        assert_eq!(err.to_string(), "LessonId cannot be empty");
    }

    #[test]
    fn generated_quiz_ids_are_distinct() {
        assert_ne!(QuizResultId::generate(), QuizResultId::generate());
    }

    #[test]
    fn composite_keys_do_not_collide_like_joined_strings() {
        // "a_b" + "c" and "a" + "b_c" join to the same string but are different keys.
        let left = ProgressKey::new(UserId::new("a_b"), SportId::new("c"));
        let right = ProgressKey::new(UserId::new("a"), SportId::new("b_c"));
        assert_ne!(left, right);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&LessonId::new("l1")).unwrap();
        assert_eq!(json, "\"l1\"");
    }
}
