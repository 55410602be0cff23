use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    MemberId, MemberStatus, Membership, OrgId, Organization, Submission, SubmissionId,
    SubmissionStatus, Track, TrackId,
};
use super::repository::{PeriodScoreTotal, StoreError, TrackStore};

/// In-process reference implementation of [`TrackStore`]. One mutex guards
/// all maps so the decision commit observes and writes both the submission
/// and the membership under a single critical section.
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    inner: Mutex<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    organizations: HashMap<String, Organization>,
    tracks: HashMap<String, Track>,
    memberships: HashMap<(String, String), Membership>,
    submissions: HashMap<String, Submission>,
    // Uniqueness index: (track, member, period start) -> submission id.
    submission_periods: HashMap<(String, String, DateTime<Utc>), String>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("track store mutex poisoned".to_string()))
    }
}

impl TrackStore for MemoryTrackStore {
    fn insert_organization(&self, org: Organization) -> Result<Organization, StoreError> {
        let mut inner = self.lock()?;
        if inner.organizations.contains_key(&org.id.0) {
            return Err(StoreError::Conflict);
        }
        inner.organizations.insert(org.id.0.clone(), org.clone());
        Ok(org)
    }

    fn organization(&self, id: &OrgId) -> Result<Option<Organization>, StoreError> {
        Ok(self.lock()?.organizations.get(&id.0).cloned())
    }

    fn insert_track(&self, track: Track) -> Result<Track, StoreError> {
        let mut inner = self.lock()?;
        if inner.tracks.contains_key(&track.id.0) {
            return Err(StoreError::Conflict);
        }
        inner.tracks.insert(track.id.0.clone(), track.clone());
        Ok(track)
    }

    fn track(&self, id: &TrackId) -> Result<Option<Track>, StoreError> {
        Ok(self.lock()?.tracks.get(&id.0).cloned())
    }

    fn insert_membership(
        &self,
        membership: Membership,
        capacity: Option<u32>,
    ) -> Result<Membership, StoreError> {
        let mut inner = self.lock()?;
        let key = (membership.track_id.0.clone(), membership.member_id.0.clone());
        if inner.memberships.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        if let Some(cap) = capacity {
            let occupied = inner
                .memberships
                .values()
                .filter(|held| {
                    held.track_id == membership.track_id && held.status != MemberStatus::Banned
                })
                .count();
            if occupied >= cap as usize {
                return Err(StoreError::CapacityExceeded);
            }
        }
        inner.memberships.insert(key, membership.clone());
        Ok(membership)
    }

    fn membership(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Option<Membership>, StoreError> {
        let key = (track_id.0.clone(), member_id.0.clone());
        Ok(self.lock()?.memberships.get(&key).cloned())
    }

    fn memberships(&self, track_id: &TrackId) -> Result<Vec<Membership>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Membership> = inner
            .memberships
            .values()
            .filter(|membership| membership.track_id == *track_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.member_id.cmp(&b.member_id));
        Ok(rows)
    }

    fn update_membership(
        &self,
        membership: Membership,
        expected_version: u64,
    ) -> Result<Membership, StoreError> {
        let mut inner = self.lock()?;
        let key = (membership.track_id.0.clone(), membership.member_id.0.clone());
        let stored = inner.memberships.get_mut(&key).ok_or(StoreError::NotFound)?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict);
        }
        let mut updated = membership;
        updated.version = expected_version + 1;
        *stored = updated.clone();
        Ok(updated)
    }

    fn insert_submission(&self, submission: Submission) -> Result<Submission, StoreError> {
        let mut inner = self.lock()?;
        let period_key = (
            submission.track_id.0.clone(),
            submission.member_id.0.clone(),
            submission.period_start,
        );
        if inner.submission_periods.contains_key(&period_key)
            || inner.submissions.contains_key(&submission.id.0)
        {
            return Err(StoreError::Conflict);
        }
        inner
            .submission_periods
            .insert(period_key, submission.id.0.clone());
        inner
            .submissions
            .insert(submission.id.0.clone(), submission.clone());
        Ok(submission)
    }

    fn submission(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(self.lock()?.submissions.get(&id.0).cloned())
    }

    fn submissions(
        &self,
        track_id: &TrackId,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<Submission> = inner
            .submissions
            .values()
            .filter(|submission| submission.track_id == *track_id)
            .filter(|submission| status.map_or(true, |wanted| submission.status == wanted))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(rows)
    }

    fn approved_period_starts(
        &self,
        track_id: &TrackId,
        member_id: &MemberId,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .submissions
            .values()
            .filter(|submission| {
                submission.track_id == *track_id
                    && submission.member_id == *member_id
                    && submission.status == SubmissionStatus::Approved
            })
            .map(|submission| submission.period_start)
            .collect())
    }

    fn approved_totals(
        &self,
        track_id: &TrackId,
        period_start: DateTime<Utc>,
    ) -> Result<Vec<PeriodScoreTotal>, StoreError> {
        let inner = self.lock()?;
        let mut totals: BTreeMap<String, PeriodScoreTotal> = BTreeMap::new();
        for submission in inner.submissions.values().filter(|submission| {
            submission.track_id == *track_id
                && submission.period_start == period_start
                && submission.status == SubmissionStatus::Approved
        }) {
            let entry = totals
                .entry(submission.member_id.0.clone())
                .or_insert_with(|| PeriodScoreTotal {
                    member_id: submission.member_id.clone(),
                    base_score: 0,
                    submission_count: 0,
                });
            entry.base_score += submission.score.unwrap_or(0);
            entry.submission_count += 1;
        }
        Ok(totals.into_values().collect())
    }

    fn commit_decision(
        &self,
        submission: Submission,
        membership: Option<(Membership, u64)>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;

        let stored = inner
            .submissions
            .get(&submission.id.0)
            .ok_or(StoreError::NotFound)?;
        if stored.status.is_decided() {
            return Err(StoreError::Conflict);
        }
        if let Some((updated, expected_version)) = &membership {
            let key = (updated.track_id.0.clone(), updated.member_id.0.clone());
            let current = inner.memberships.get(&key).ok_or(StoreError::NotFound)?;
            if current.version != *expected_version {
                return Err(StoreError::Conflict);
            }
        }

        inner
            .submissions
            .insert(submission.id.0.clone(), submission);
        if let Some((updated, expected_version)) = membership {
            let key = (updated.track_id.0.clone(), updated.member_id.0.clone());
            let mut next = updated;
            next.version = expected_version + 1;
            inner.memberships.insert(key, next);
        }
        Ok(())
    }
}
