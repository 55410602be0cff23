use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::access::{admin_capability, AdminCapability};
use super::domain::{
    JoinRequest, MemberId, MemberRole, MemberStatus, Membership, NewOrganization, NewSubmission,
    NewTrack, OrgId, Organization, ScoringRule, Submission, SubmissionId, SubmissionStatus, Track,
    TrackId, VerificationDecision, VerificationRequest,
};
use super::period::period_bounds;
use super::ranking::{build_leaderboard, PeriodStandings};
use super::repository::{NotificationPublisher, StoreError, TrackStore, VerificationNotice};
use super::streak::StreakState;

/// Service owning the track lifecycle: organizations, tracks, memberships,
/// submission intake, verification, and standings.
pub struct TrackService<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
}

static ORG_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TRACK_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Attempts before a contended decision commit surfaces as a conflict.
const DECISION_RETRY_LIMIT: usize = 3;

fn next_org_id() -> OrgId {
    let id = ORG_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OrgId(format!("org-{id:06}"))
}

fn next_track_id() -> TrackId {
    let id = TRACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TrackId(format!("trk-{id:06}"))
}

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

impl<S, N> TrackService<S, N>
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self { store, notices }
    }

    /// Create an organization owned by the caller.
    pub fn create_organization(
        &self,
        owner: MemberId,
        request: NewOrganization,
        now: DateTime<Utc>,
    ) -> Result<Organization, TrackServiceError> {
        let name = required_text(&request.name, "organization name")?;
        let org = Organization {
            id: next_org_id(),
            name,
            owner,
            admins: request.admins,
            created_at: now,
        };
        Ok(self.store.insert_organization(org)?)
    }

    /// Create a track inside an organization the actor administers.
    pub fn create_track(
        &self,
        org_id: &OrgId,
        actor: &MemberId,
        request: NewTrack,
        now: DateTime<Utc>,
    ) -> Result<Track, TrackServiceError> {
        let org = self
            .store
            .organization(org_id)?
            .ok_or(StoreError::NotFound)?;
        if admin_capability(actor, &org, None).is_none() {
            return Err(TrackServiceError::Forbidden);
        }

        let name = required_text(&request.name, "track name")?;
        if let ScoringRule::Manual {
            min_score,
            max_score,
        } = request.scoring
        {
            if max_score < min_score {
                return Err(ValidationError::InvalidScoreBounds {
                    min_score,
                    max_score,
                }
                .into());
            }
        }
        if request.max_members == Some(0) {
            return Err(ValidationError::ZeroCapacity.into());
        }

        let track = Track {
            id: next_track_id(),
            org_id: org.id,
            name,
            period_start_day: request.period_start_day,
            scoring: request.scoring,
            max_members: request.max_members,
            created_at: now,
        };
        let track = self.store.insert_track(track)?;
        tracing::info!(track = %track.id.0, org = %track.org_id.0, "track created");
        Ok(track)
    }

    /// Join a track as a regular member. Capacity counts non-banned members
    /// and is enforced by the store inside the insert, so concurrent joins
    /// cannot overshoot the limit.
    pub fn join_track(
        &self,
        track_id: &TrackId,
        member_id: MemberId,
        request: JoinRequest,
        now: DateTime<Utc>,
    ) -> Result<Membership, TrackServiceError> {
        let track = self.store.track(track_id)?.ok_or(StoreError::NotFound)?;
        let display_name = required_text(&request.display_name, "display name")?;

        let membership = Membership {
            track_id: track.id,
            member_id,
            display_name,
            role: MemberRole::Member,
            status: MemberStatus::Active,
            streak: StreakState::default(),
            joined_at: now,
            suspended_at: None,
            banned_at: None,
            version: 1,
        };
        match self.store.insert_membership(membership, track.max_members) {
            Err(StoreError::CapacityExceeded) => Err(TrackServiceError::TrackFull),
            other => Ok(other?),
        }
    }

    /// File a submission for the period containing `now`. Uniqueness per
    /// (member, track, period) is enforced by the store, not by a pre-check.
    pub fn create_submission(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
        request: NewSubmission,
        now: DateTime<Utc>,
    ) -> Result<Submission, TrackServiceError> {
        let track = self.store.track(track_id)?.ok_or(StoreError::NotFound)?;
        let membership = self
            .store
            .membership(track_id, member_id)?
            .ok_or(TrackServiceError::Forbidden)?;
        if !membership.can_submit() {
            return Err(TrackServiceError::Forbidden);
        }

        let description = required_text(&request.description, "description")?;
        required_text(&request.proof.url, "proof url")?;

        let bounds = period_bounds(now, track.period_start_day);
        let submission = Submission {
            id: next_submission_id(),
            track_id: track.id,
            member_id: membership.member_id,
            period_start: bounds.start,
            period_end: bounds.end,
            description,
            proof: request.proof,
            status: SubmissionStatus::Pending,
            score: None,
            verified_by: None,
            decided_at: None,
            submitted_at: now,
        };
        Ok(self.store.insert_submission(submission)?)
    }

    /// Decide a pending submission. The caller must have cleared the admin
    /// capability gate for the submission's track; `verifier` is stamped on
    /// the decided record. Decisions are final.
    pub fn verify(
        &self,
        submission_id: &SubmissionId,
        verifier: &MemberId,
        request: VerificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Submission, TrackServiceError> {
        let submission = self
            .store
            .submission(submission_id)?
            .ok_or(StoreError::NotFound)?;
        if submission.status.is_decided() {
            return Err(TrackServiceError::AlreadyDecided);
        }
        let track = self.store.track(&submission.track_id)?.ok_or_else(|| {
            self.invariant(format!(
                "submission {} references missing track {}",
                submission.id.0, submission.track_id.0
            ))
        })?;

        match request.decision {
            VerificationDecision::Approved => {
                let score = resolve_score(&track.scoring, request.score)?;
                self.commit_approval(submission, score, verifier, now)
            }
            VerificationDecision::Rejected => {
                if request.score.is_some() {
                    return Err(ValidationError::ScoreWithRejection.into());
                }
                self.commit_rejection(submission, verifier, now)
            }
        }
    }

    /// Submissions on a track, optionally filtered by status, oldest first.
    pub fn submissions(
        &self,
        track_id: &TrackId,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>, TrackServiceError> {
        self.store.track(track_id)?.ok_or(StoreError::NotFound)?;
        Ok(self.store.submissions(track_id, status)?)
    }

    /// Standings for the period containing `at`. Never persisted; every call
    /// recomputes from approved submissions and live membership streaks.
    pub fn leaderboard(
        &self,
        track_id: &TrackId,
        at: DateTime<Utc>,
    ) -> Result<PeriodStandings, TrackServiceError> {
        let track = self.store.track(track_id)?.ok_or(StoreError::NotFound)?;
        let bounds = period_bounds(at, track.period_start_day);
        let totals = self.store.approved_totals(track_id, bounds.start)?;
        let memberships = self.store.memberships(track_id)?;
        let entries = build_leaderboard(totals, &memberships)
            .map_err(|error| self.invariant(error.to_string()))?;

        Ok(PeriodStandings {
            track_id: track.id,
            period_start: bounds.start,
            period_end: bounds.end,
            entries,
        })
    }

    pub fn membership_profile(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Option<Membership>, TrackServiceError> {
        Ok(self.store.membership(track_id, member_id)?)
    }

    pub fn submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<Submission>, TrackServiceError> {
        Ok(self.store.submission(submission_id)?)
    }

    pub fn track(&self, track_id: &TrackId) -> Result<Option<Track>, TrackServiceError> {
        Ok(self.store.track(track_id)?)
    }

    /// Moderate a member. Reactivation clears the matching status timestamp.
    pub fn set_member_status(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
        actor: &MemberId,
        status: MemberStatus,
        now: DateTime<Utc>,
    ) -> Result<Membership, TrackServiceError> {
        self.authorize_track_admin(actor, track_id)?;
        let membership = self
            .store
            .membership(track_id, member_id)?
            .ok_or(StoreError::NotFound)?;

        let mut updated = membership.clone();
        updated.status = status;
        match status {
            MemberStatus::Active => {
                updated.suspended_at = None;
                updated.banned_at = None;
            }
            MemberStatus::Suspended => updated.suspended_at = Some(now),
            MemberStatus::Banned => updated.banned_at = Some(now),
        }
        Ok(self.store.update_membership(updated, membership.version)?)
    }

    /// Grant or revoke the track-admin role.
    pub fn set_member_role(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
        actor: &MemberId,
        role: MemberRole,
    ) -> Result<Membership, TrackServiceError> {
        self.authorize_track_admin(actor, track_id)?;
        let membership = self
            .store
            .membership(track_id, member_id)?
            .ok_or(StoreError::NotFound)?;

        let mut updated = membership.clone();
        updated.role = role;
        Ok(self.store.update_membership(updated, membership.version)?)
    }

    /// The capability gate for admin actions on a track. Resolves the org
    /// and the actor's membership once and answers through
    /// [`admin_capability`].
    pub fn authorize_track_admin(
        &self,
        actor: &MemberId,
        track_id: &TrackId,
    ) -> Result<AdminCapability, TrackServiceError> {
        let track = self.store.track(track_id)?.ok_or(StoreError::NotFound)?;
        let org = self.store.organization(&track.org_id)?.ok_or_else(|| {
            self.invariant(format!(
                "track {} references missing organization {}",
                track.id.0, track.org_id.0
            ))
        })?;
        let membership = self.store.membership(track_id, actor)?;
        admin_capability(actor, &org, membership.as_ref()).ok_or(TrackServiceError::Forbidden)
    }

    fn commit_approval(
        &self,
        submission: Submission,
        score: u32,
        verifier: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Submission, TrackServiceError> {
        let mut decided = submission;
        decided.status = SubmissionStatus::Approved;
        decided.score = Some(score);
        decided.verified_by = Some(verifier.clone());
        decided.decided_at = Some(now);

        for _ in 0..DECISION_RETRY_LIMIT {
            let membership = self
                .store
                .membership(&decided.track_id, &decided.member_id)?
                .ok_or_else(|| {
                    self.invariant(format!(
                        "approval of {} found no membership for {} on {}",
                        decided.id.0, decided.member_id.0, decided.track_id.0
                    ))
                })?;

            // Replay the approved history plus this period so backfilled
            // approvals land in order.
            let mut history = self
                .store
                .approved_period_starts(&decided.track_id, &decided.member_id)?;
            history.push(decided.period_start);
            let streak = StreakState::rebuilt_from(history, membership.streak.longest);

            let mut updated = membership.clone();
            updated.streak = streak;

            match self
                .store
                .commit_decision(decided.clone(), Some((updated, membership.version)))
            {
                Ok(()) => {
                    tracing::info!(
                        submission = %decided.id.0,
                        member = %decided.member_id.0,
                        streak = streak.current,
                        "submission approved"
                    );
                    self.publish_notice(&decided, "submission_approved", Some(streak));
                    return Ok(decided);
                }
                Err(StoreError::Conflict) => {
                    // Either the submission was decided under us or the
                    // membership version moved. Re-read to tell which.
                    let fresh = self
                        .store
                        .submission(&decided.id)?
                        .ok_or(StoreError::NotFound)?;
                    if fresh.status.is_decided() {
                        return Err(TrackServiceError::AlreadyDecided);
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(TrackServiceError::Contention)
    }

    fn commit_rejection(
        &self,
        submission: Submission,
        verifier: &MemberId,
        now: DateTime<Utc>,
    ) -> Result<Submission, TrackServiceError> {
        let mut decided = submission;
        decided.status = SubmissionStatus::Rejected;
        decided.score = Some(0);
        decided.verified_by = Some(verifier.clone());
        decided.decided_at = Some(now);

        match self.store.commit_decision(decided.clone(), None) {
            Ok(()) => {
                self.publish_notice(&decided, "submission_rejected", None);
                Ok(decided)
            }
            Err(StoreError::Conflict) => Err(TrackServiceError::AlreadyDecided),
            Err(other) => Err(other.into()),
        }
    }

    /// Notices are best effort: the decision has already committed, so a
    /// failed publish is logged rather than surfaced.
    fn publish_notice(&self, submission: &Submission, template: &str, streak: Option<StreakState>) {
        let mut details = BTreeMap::new();
        if let Some(score) = submission.score {
            details.insert("score".to_string(), score.to_string());
        }
        if let Some(streak) = streak {
            details.insert("current_streak".to_string(), streak.current.to_string());
            details.insert("longest_streak".to_string(), streak.longest.to_string());
        }

        let notice = VerificationNotice {
            template: template.to_string(),
            submission_id: submission.id.clone(),
            track_id: submission.track_id.clone(),
            member_id: submission.member_id.clone(),
            details,
        };
        if let Err(error) = self.notices.publish(notice) {
            tracing::warn!(%error, submission = %submission.id.0, "verification notice failed");
        }
    }

    fn invariant(&self, message: String) -> TrackServiceError {
        tracing::error!(%message, "track workflow invariant violated");
        TrackServiceError::Invariant(message)
    }
}

fn required_text(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(trimmed.to_string())
}

fn resolve_score(rule: &ScoringRule, supplied: Option<u32>) -> Result<u32, ValidationError> {
    match (rule, supplied) {
        (
            ScoringRule::Manual {
                min_score,
                max_score,
            },
            Some(score),
        ) => {
            if score < *min_score || score > *max_score {
                return Err(ValidationError::ScoreOutOfBounds {
                    score,
                    min_score: *min_score,
                    max_score: *max_score,
                });
            }
            Ok(score)
        }
        (ScoringRule::Manual { .. }, None) => Err(ValidationError::ScoreRequired),
        (ScoringRule::Flat { points }, None) => Ok(*points),
        (ScoringRule::Flat { points }, Some(_)) => Err(ValidationError::ScoreNotConfigurable {
            points: *points,
        }),
    }
}

/// Error raised by the track service.
#[derive(Debug, thiserror::Error)]
pub enum TrackServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("track is at capacity")]
    TrackFull,
    #[error("submission already decided")]
    AlreadyDecided,
    #[error("forbidden")]
    Forbidden,
    #[error("decision contention retries exhausted")]
    Contention,
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

/// Unprocessable caller input.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("score bounds invalid: max {max_score} is below min {min_score}")]
    InvalidScoreBounds { min_score: u32, max_score: u32 },
    #[error("max_members must be at least 1")]
    ZeroCapacity,
    #[error("score {score} is outside the track bounds {min_score}..={max_score}")]
    ScoreOutOfBounds {
        score: u32,
        min_score: u32,
        max_score: u32,
    },
    #[error("approval on this track requires a score")]
    ScoreRequired,
    #[error("track awards a fixed {points} points; omit the score")]
    ScoreNotConfigurable { points: u32 },
    #[error("a rejection cannot carry a score")]
    ScoreWithRejection,
}
