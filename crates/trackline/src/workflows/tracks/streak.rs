use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::next_period_start;

/// Fractional score bonus granted per consecutive period.
pub const STREAK_BONUS_STEP: f64 = 0.12;
/// Ceiling on the streak multiplier.
pub const MULTIPLIER_CAP: f64 = 3.0;

/// Per-membership streak counters. `last_active_period` holds the normalized
/// start of the most recent period with an approved submission; streaks are
/// period-granular, so day-level activity inside a period never changes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    pub current: u32,
    pub longest: u32,
    pub last_active_period: Option<DateTime<Utc>>,
}

impl StreakState {
    /// Advances the streak for an approval landing in the period beginning at
    /// `period_start`. The immediately following period extends the run, a
    /// repeat of the last period leaves it unchanged, anything else starts a
    /// fresh run of one. `longest` never decreases.
    pub fn record_approval(self, period_start: DateTime<Utc>) -> StreakState {
        let current = match self.last_active_period {
            Some(last) if period_start == last => self.current,
            Some(last) if period_start == next_period_start(last) => self.current + 1,
            _ => 1,
        };

        StreakState {
            current,
            longest: self.longest.max(current),
            last_active_period: Some(period_start),
        }
    }

    /// Rebuilds the streak by replaying an approved-period history through
    /// [`StreakState::record_approval`]. The history may arrive in any order
    /// and contain repeats; `prior_longest` floors the best run so it
    /// survives the replay.
    pub fn rebuilt_from(
        history: impl IntoIterator<Item = DateTime<Utc>>,
        prior_longest: u32,
    ) -> StreakState {
        let mut periods: Vec<DateTime<Utc>> = history.into_iter().collect();
        periods.sort_unstable();
        periods.dedup();

        let seed = StreakState {
            longest: prior_longest,
            ..StreakState::default()
        };
        periods.into_iter().fold(seed, StreakState::record_approval)
    }
}

/// Streak-weighted score multiplier: one plus a fixed step per consecutive
/// period, capped. A streak of zero always yields the identity multiplier.
pub fn score_multiplier(streak: u32) -> f64 {
    (1.0 + f64::from(streak) * STREAK_BONUS_STEP).min(MULTIPLIER_CAP)
}

/// Rounds to two decimals for presentation and deterministic comparison.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
