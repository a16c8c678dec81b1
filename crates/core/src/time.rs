use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use chrono_tz::Tz;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// The calendar used to decide which day an instant falls on.
///
/// Streaks are counted in calendar days, so "same day" and "yesterday" depend
/// on where the day boundary sits. A `Fixed` calendar keeps one UTC offset all
/// year. A `Zone` calendar follows an IANA zone, daylight saving included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    Fixed(FixedOffset),
    Zone(Tz),
}

impl Default for Calendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar {
    #[must_use]
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    #[must_use]
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self::Fixed(offset)
    }

    #[must_use]
    pub fn with_zone(zone: Tz) -> Self {
        Self::Zone(zone)
    }

    /// Builds a calendar from an offset in minutes east of UTC.
    ///
    /// Returns `None` when the offset is outside ±24h.
    #[must_use]
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::with_offset)
    }

    /// Builds a calendar from an IANA zone name such as `Europe/Berlin`.
    #[must_use]
    pub fn from_zone_name(name: &str) -> Option<Self> {
        name.trim().parse::<Tz>().ok().map(Self::with_zone)
    }

    /// The calendar day `at` falls on.
    #[must_use]
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Fixed(offset) => at.with_timezone(offset).date_naive(),
            Self::Zone(zone) => at.with_timezone(zone).date_naive(),
        }
    }

    /// Whole calendar days from `earlier` to `later`; negative when `later` is
    /// on an earlier day.
    #[must_use]
    pub fn days_between(&self, earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
        (self.day_of(later) - self.day_of(earlier)).num_days()
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
