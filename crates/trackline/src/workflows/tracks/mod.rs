//! Recurring-track workflow: organizations, tracks, member submissions,
//! admin verification, and streak-weighted period standings.
//!
//! Time is always explicit. Handlers capture `Utc::now()` once at the edge
//! and every operation below takes the instant it should reason about, so
//! the whole workflow can be driven deterministically from tests.

pub mod access;
pub mod domain;
pub mod memory;
pub mod period;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod service;
pub mod streak;

#[cfg(test)]
mod tests;

pub use access::{admin_capability, AdminCapability};
pub use domain::{
    JoinRequest, MemberId, MemberRole, MemberStatus, Membership, NewOrganization, NewSubmission,
    NewTrack, OrgId, Organization, ProofKind, ProofReference, ScoringRule, Submission,
    SubmissionId, SubmissionStatus, Track, TrackId, VerificationDecision, VerificationRequest,
};
pub use memory::MemoryTrackStore;
pub use period::{next_period_start, period_bounds, PeriodBounds, PeriodStartDay};
pub use ranking::{build_leaderboard, LeaderboardEntry, PeriodStandings, RankingError};
pub use repository::{
    NotificationError, NotificationPublisher, PeriodScoreTotal, StoreError, TrackStore,
    VerificationNotice,
};
pub use router::{track_router, MEMBER_ID_HEADER};
pub use service::{TrackService, TrackServiceError, ValidationError};
pub use streak::{round2, score_multiplier, StreakState};
