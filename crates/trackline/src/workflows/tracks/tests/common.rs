use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::tracks::domain::{
    JoinRequest, MemberId, Membership, NewOrganization, NewSubmission, NewTrack, OrgId,
    Organization, ProofKind, ProofReference, ScoringRule, Submission, SubmissionId,
    SubmissionStatus, Track, TrackId, VerificationDecision, VerificationRequest,
};
use crate::workflows::tracks::memory::MemoryTrackStore;
use crate::workflows::tracks::period::PeriodStartDay;
use crate::workflows::tracks::repository::{
    NotificationError, NotificationPublisher, PeriodScoreTotal, StoreError, TrackStore,
    VerificationNotice,
};
use crate::workflows::tracks::{track_router, TrackService};

pub(super) fn instant(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Noon on the Monday of week `n`, counted from Monday 2024-01-01.
pub(super) fn week(n: u32) -> DateTime<Utc> {
    instant(2024, 1, 1, 12) + Duration::days(7 * (i64::from(n) - 1))
}

pub(super) fn owner() -> MemberId {
    MemberId("mem-owner".to_string())
}

pub(super) fn proof() -> ProofReference {
    ProofReference {
        url: "https://proofs.example.com/run-42.png".to_string(),
        kind: ProofKind::Image,
    }
}

pub(super) fn manual_scoring() -> ScoringRule {
    ScoringRule::Manual {
        min_score: 0,
        max_score: 100,
    }
}

pub(super) fn build_service() -> (
    TrackService<MemoryTrackStore, MemoryNotices>,
    Arc<MemoryTrackStore>,
    Arc<MemoryNotices>,
) {
    let store = Arc::new(MemoryTrackStore::default());
    let notices = Arc::new(MemoryNotices::default());
    let service = TrackService::new(store.clone(), notices.clone());
    (service, store, notices)
}

/// Creates an organization owned by [`owner`] plus one track inside it.
pub(super) fn seeded_track<S, N>(
    service: &TrackService<S, N>,
    scoring: ScoringRule,
    max_members: Option<u32>,
) -> (Organization, Track)
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let org = service
        .create_organization(
            owner(),
            NewOrganization {
                name: "Morning Miles Club".to_string(),
                admins: Vec::new(),
            },
            week(1),
        )
        .expect("organization created");
    let track = service
        .create_track(
            &org.id,
            &owner(),
            NewTrack {
                name: "5k Every Week".to_string(),
                period_start_day: PeriodStartDay::Monday,
                scoring,
                max_members,
            },
            week(1),
        )
        .expect("track created");
    (org, track)
}

pub(super) fn join<S, N>(
    service: &TrackService<S, N>,
    track: &Track,
    member: &str,
    display_name: &str,
) -> Membership
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    service
        .join_track(
            &track.id,
            MemberId(member.to_string()),
            JoinRequest {
                display_name: display_name.to_string(),
            },
            week(1),
        )
        .expect("member joined")
}

pub(super) fn submit<S, N>(
    service: &TrackService<S, N>,
    track: &Track,
    member: &str,
    at: DateTime<Utc>,
) -> Submission
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    service
        .create_submission(
            &track.id,
            &MemberId(member.to_string()),
            NewSubmission {
                description: "Logged the weekly run".to_string(),
                proof: proof(),
            },
            at,
        )
        .expect("submission filed")
}

pub(super) fn approve<S, N>(
    service: &TrackService<S, N>,
    submission_id: &SubmissionId,
    score: Option<u32>,
    at: DateTime<Utc>,
) -> Submission
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    service
        .verify(
            submission_id,
            &owner(),
            VerificationRequest {
                decision: VerificationDecision::Approved,
                score,
            },
            at,
        )
        .expect("submission approved")
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotices {
    events: Arc<Mutex<Vec<VerificationNotice>>>,
}

impl MemoryNotices {
    pub(super) fn events(&self) -> Vec<VerificationNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

impl NotificationPublisher for MemoryNotices {
    fn publish(&self, notice: VerificationNotice) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotices;

impl NotificationPublisher for FailingNotices {
    fn publish(&self, _notice: VerificationNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("notice sink offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn offline<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }
}

impl TrackStore for UnavailableStore {
    fn insert_organization(&self, _org: Organization) -> Result<Organization, StoreError> {
        Self::offline()
    }

    fn organization(&self, _id: &OrgId) -> Result<Option<Organization>, StoreError> {
        Self::offline()
    }

    fn insert_track(&self, _track: Track) -> Result<Track, StoreError> {
        Self::offline()
    }

    fn track(&self, _id: &TrackId) -> Result<Option<Track>, StoreError> {
        Self::offline()
    }

    fn insert_membership(
        &self,
        _membership: Membership,
        _capacity: Option<u32>,
    ) -> Result<Membership, StoreError> {
        Self::offline()
    }

    fn membership(
        &self,
        _track_id: &TrackId,
        _member_id: &MemberId,
    ) -> Result<Option<Membership>, StoreError> {
        Self::offline()
    }

    fn memberships(&self, _track_id: &TrackId) -> Result<Vec<Membership>, StoreError> {
        Self::offline()
    }

    fn update_membership(
        &self,
        _membership: Membership,
        _expected_version: u64,
    ) -> Result<Membership, StoreError> {
        Self::offline()
    }

    fn insert_submission(&self, _submission: Submission) -> Result<Submission, StoreError> {
        Self::offline()
    }

    fn submission(&self, _id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Self::offline()
    }

    fn submissions(
        &self,
        _track_id: &TrackId,
        _status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>, StoreError> {
        Self::offline()
    }

    fn approved_period_starts(
        &self,
        _track_id: &TrackId,
        _member_id: &MemberId,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        Self::offline()
    }

    fn approved_totals(
        &self,
        _track_id: &TrackId,
        _period_start: DateTime<Utc>,
    ) -> Result<Vec<PeriodScoreTotal>, StoreError> {
        Self::offline()
    }

    fn commit_decision(
        &self,
        _submission: Submission,
        _membership: Option<(Membership, u64)>,
    ) -> Result<(), StoreError> {
        Self::offline()
    }
}

/// Store that fails the first `failures` decision commits with `Conflict`
/// while leaving the stored rows untouched, so the retry loop is exercised.
#[derive(Default)]
pub(super) struct ContentionStore {
    inner: MemoryTrackStore,
    failures: AtomicUsize,
}

impl ContentionStore {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            inner: MemoryTrackStore::default(),
            failures: AtomicUsize::new(failures),
        }
    }
}

impl TrackStore for ContentionStore {
    fn insert_organization(&self, org: Organization) -> Result<Organization, StoreError> {
        self.inner.insert_organization(org)
    }

    fn organization(&self, id: &OrgId) -> Result<Option<Organization>, StoreError> {
        self.inner.organization(id)
    }

    fn insert_track(&self, track: Track) -> Result<Track, StoreError> {
        self.inner.insert_track(track)
    }

    fn track(&self, id: &TrackId) -> Result<Option<Track>, StoreError> {
        self.inner.track(id)
    }

    fn insert_membership(
        &self,
        membership: Membership,
        capacity: Option<u32>,
    ) -> Result<Membership, StoreError> {
        self.inner.insert_membership(membership, capacity)
    }

    fn membership(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Option<Membership>, StoreError> {
        self.inner.membership(track_id, member_id)
    }

    fn memberships(&self, track_id: &TrackId) -> Result<Vec<Membership>, StoreError> {
        self.inner.memberships(track_id)
    }

    fn update_membership(
        &self,
        membership: Membership,
        expected_version: u64,
    ) -> Result<Membership, StoreError> {
        self.inner.update_membership(membership, expected_version)
    }

    fn insert_submission(&self, submission: Submission) -> Result<Submission, StoreError> {
        self.inner.insert_submission(submission)
    }

    fn submission(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        self.inner.submission(id)
    }

    fn submissions(
        &self,
        track_id: &TrackId,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>, StoreError> {
        self.inner.submissions(track_id, status)
    }

    fn approved_period_starts(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        self.inner.approved_period_starts(track_id, member_id)
    }

    fn approved_totals(
        &self,
        track_id: &TrackId,
        period_start: DateTime<Utc>,
    ) -> Result<Vec<PeriodScoreTotal>, StoreError> {
        self.inner.approved_totals(track_id, period_start)
    }

    fn commit_decision(
        &self,
        submission: Submission,
        membership: Option<(Membership, u64)>,
    ) -> Result<(), StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict);
        }
        self.inner.commit_decision(submission, membership)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 65_536)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn track_router_with_service(
    service: TrackService<MemoryTrackStore, MemoryNotices>,
) -> axum::Router {
    track_router(Arc::new(service))
}
