use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{MemberId, MemberStatus, Membership, TrackId};
use super::repository::PeriodScoreTotal;
use super::streak::{round2, score_multiplier};

/// One row of a period leaderboard. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub member_id: MemberId,
    pub display_name: String,
    pub base_score: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub multiplier: f64,
    pub total_score: f64,
    pub submission_count: u32,
}

/// Full standings payload for one (track, period) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStandings {
    pub track_id: TrackId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("approved submissions reference unknown membership {0}")]
    MissingMembership(String),
}

/// Joins per-period score totals with membership streaks and produces the
/// ranked board: streak multiplier applied, totals sorted descending, equal
/// totals ordered by ascending member id, dense sequential ranks from one.
/// Banned members are dropped from the output.
pub fn build_leaderboard(
    totals: Vec<PeriodScoreTotal>,
    memberships: &[Membership],
) -> Result<Vec<LeaderboardEntry>, RankingError> {
    let by_member: HashMap<&MemberId, &Membership> = memberships
        .iter()
        .map(|membership| (&membership.member_id, membership))
        .collect();

    let mut entries = Vec::with_capacity(totals.len());
    for total in totals {
        let membership = by_member
            .get(&total.member_id)
            .copied()
            .ok_or_else(|| RankingError::MissingMembership(total.member_id.0.clone()))?;
        if membership.status == MemberStatus::Banned {
            continue;
        }

        let multiplier = score_multiplier(membership.streak.current);
        entries.push(LeaderboardEntry {
            rank: 0,
            member_id: total.member_id,
            display_name: membership.display_name.clone(),
            base_score: total.base_score,
            current_streak: membership.streak.current,
            longest_streak: membership.streak.longest,
            multiplier: round2(multiplier),
            total_score: round2(f64::from(total.base_score) * multiplier),
            submission_count: total.submission_count,
        });
    }

    entries.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.member_id.cmp(&b.member_id))
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as u32 + 1;
    }

    Ok(entries)
}
