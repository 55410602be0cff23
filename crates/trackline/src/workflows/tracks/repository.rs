use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    MemberId, Membership, OrgId, Organization, Submission, SubmissionId, SubmissionStatus, Track,
    TrackId,
};

/// Storage boundary for the tracks workflow, shaped like a document store
/// with per-key uniqueness and a conditional write for decision commits, so
/// the service module can be exercised in isolation.
pub trait TrackStore: Send + Sync {
    /// Fails with `Conflict` when the organization id is already taken.
    fn insert_organization(&self, org: Organization) -> Result<Organization, StoreError>;
    fn organization(&self, id: &OrgId) -> Result<Option<Organization>, StoreError>;

    /// Fails with `Conflict` when the track id is already taken.
    fn insert_track(&self, track: Track) -> Result<Track, StoreError>;
    fn track(&self, id: &TrackId) -> Result<Option<Track>, StoreError>;

    /// Fails with `Conflict` when the member already belongs to the track,
    /// and with `CapacityExceeded` when `capacity` non-banned members
    /// already do. The occupancy check and the insert share one critical
    /// section, so racing joins cannot overshoot the limit.
    fn insert_membership(
        &self,
        membership: Membership,
        capacity: Option<u32>,
    ) -> Result<Membership, StoreError>;
    fn membership(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Option<Membership>, StoreError>;
    fn memberships(&self, track_id: &TrackId) -> Result<Vec<Membership>, StoreError>;
    /// Conditional write: fails with `Conflict` unless the stored row's
    /// version still equals `expected_version`. The write lands with the
    /// version bumped by one.
    fn update_membership(
        &self,
        membership: Membership,
        expected_version: u64,
    ) -> Result<Membership, StoreError>;

    /// Fails with `Conflict` when the member already has a submission for
    /// the same track and normalized period start.
    fn insert_submission(&self, submission: Submission) -> Result<Submission, StoreError>;
    fn submission(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError>;
    fn submissions(
        &self,
        track_id: &TrackId,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>, StoreError>;
    /// Period starts of every approved submission the member has on the
    /// track, in no particular order. Feeds streak replays.
    fn approved_period_starts(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;
    /// Approved base-score totals per member for one period of a track.
    fn approved_totals(
        &self,
        track_id: &TrackId,
        period_start: DateTime<Utc>,
    ) -> Result<Vec<PeriodScoreTotal>, StoreError>;

    /// Atomically records a decision. The stored submission must still be
    /// pending, and when a membership update rides along its stored version
    /// must equal the expected one; otherwise the commit fails with
    /// `Conflict` and nothing lands.
    fn commit_decision(
        &self,
        submission: Submission,
        membership: Option<(Membership, u64)>,
    ) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("capacity exhausted")]
    CapacityExceeded,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Aggregated approved scores for one member within one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodScoreTotal {
    pub member_id: MemberId,
    pub base_score: u32,
    pub submission_count: u32,
}

/// Trait describing outbound decision notices (e.g., chat or e-mail
/// adapters).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notice: VerificationNotice) -> Result<(), NotificationError>;
}

/// Notice payload so routes/tests can assert integration boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationNotice {
    pub template: String,
    pub submission_id: SubmissionId,
    pub track_id: TrackId,
    pub member_id: MemberId,
    pub details: BTreeMap<String, String>,
}

/// Notice dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}
