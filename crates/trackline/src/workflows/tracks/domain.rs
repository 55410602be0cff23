use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::PeriodStartDay;
use super::streak::StreakState;

/// Opaque member identity issued by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Tenant owning tracks. The owner and the listed admins hold moderation
/// rights over every track in the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub owner: MemberId,
    pub admins: Vec<MemberId>,
    pub created_at: DateTime<Utc>,
}

/// How approvals on a track are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringRule {
    /// The verifier supplies a score within the inclusive bounds.
    Manual { min_score: u32, max_score: u32 },
    /// Every approval is worth the same fixed points.
    Flat { points: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub org_id: OrgId,
    pub name: String,
    pub period_start_day: PeriodStartDay,
    pub scoring: ScoringRule,
    pub max_members: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
}

impl MemberRole {
    pub const fn label(self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    Suspended,
    Banned,
}

impl MemberStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Suspended => "suspended",
            MemberStatus::Banned => "banned",
        }
    }
}

/// One member's standing inside a track. `version` guards concurrent streak
/// and moderation writes; conditional store writes bump it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub track_id: TrackId,
    pub member_id: MemberId,
    pub display_name: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub streak: StreakState,
    pub joined_at: DateTime<Utc>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub banned_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Membership {
    pub const fn can_submit(&self) -> bool {
        matches!(self.status, MemberStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofKind {
    Image,
    File,
    Link,
}

impl ProofKind {
    pub const fn label(self) -> &'static str {
        match self {
            ProofKind::Image => "image",
            ProofKind::File => "file",
            ProofKind::Link => "link",
        }
    }
}

/// Pointer to the evidence backing a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofReference {
    pub url: String,
    pub kind: ProofKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

/// A member's claim for one period of one track. The score, verifier, and
/// decision time are set exactly once, when the submission is decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub track_id: TrackId,
    pub member_id: MemberId,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub description: String,
    pub proof: ProofReference,
    pub status: SubmissionStatus,
    pub score: Option<u32>,
    pub verified_by: Option<MemberId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDecision {
    Approved,
    Rejected,
}

/// Inbound payload creating an organization; the caller becomes the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub admins: Vec<MemberId>,
}

/// Inbound payload creating a track within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub name: String,
    pub period_start_day: PeriodStartDay,
    pub scoring: ScoringRule,
    #[serde(default)]
    pub max_members: Option<u32>,
}

/// Inbound payload joining a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub display_name: String,
}

/// Inbound payload filing a submission for the current period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub description: String,
    pub proof: ProofReference,
}

/// Inbound payload deciding a pending submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub decision: VerificationDecision,
    #[serde(default)]
    pub score: Option<u32>,
}
