use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    JoinRequest, MemberId, MemberRole, MemberStatus, Membership, NewOrganization, NewSubmission,
    NewTrack, OrgId, ProofReference, Submission, SubmissionId, SubmissionStatus, TrackId,
    VerificationRequest,
};
use super::repository::{NotificationPublisher, StoreError, TrackStore};
use super::service::{TrackService, TrackServiceError};

/// Header carrying the acting member's identity.
pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// Router builder exposing HTTP endpoints for the track workflow.
pub fn track_router<S, N>(service: Arc<TrackService<S, N>>) -> Router
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/orgs", post(create_org_handler::<S, N>))
        .route(
            "/api/v1/orgs/:org_id/tracks",
            post(create_track_handler::<S, N>),
        )
        .route("/api/v1/tracks/:track_id/join", post(join_handler::<S, N>))
        .route(
            "/api/v1/tracks/:track_id/submissions",
            post(submit_handler::<S, N>).get(list_submissions_handler::<S, N>),
        )
        .route(
            "/api/v1/submissions/:submission_id/verify",
            post(verify_handler::<S, N>),
        )
        .route(
            "/api/v1/tracks/:track_id/leaderboard",
            get(leaderboard_handler::<S, N>),
        )
        .route(
            "/api/v1/tracks/:track_id/members/:member_id",
            get(member_handler::<S, N>),
        )
        .route(
            "/api/v1/tracks/:track_id/members/:member_id/status",
            patch(member_status_handler::<S, N>),
        )
        .route(
            "/api/v1/tracks/:track_id/members/:member_id/role",
            patch(member_role_handler::<S, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionListQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StandingsQuery {
    at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    status: MemberStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleChange {
    role: MemberRole,
}

/// Wire shape for a submission, with labelled status.
#[derive(Debug, Serialize)]
pub(crate) struct SubmissionView {
    submission_id: String,
    track_id: String,
    member_id: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    description: String,
    proof: ProofReference,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decided_at: Option<DateTime<Utc>>,
    submitted_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionView {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id.0.clone(),
            track_id: submission.track_id.0.clone(),
            member_id: submission.member_id.0.clone(),
            period_start: submission.period_start,
            period_end: submission.period_end,
            description: submission.description.clone(),
            proof: submission.proof.clone(),
            status: submission.status.label(),
            score: submission.score,
            verified_by: submission.verified_by.as_ref().map(|id| id.0.clone()),
            decided_at: submission.decided_at,
            submitted_at: submission.submitted_at,
        }
    }
}

/// Wire shape for a membership, with labelled role and status.
#[derive(Debug, Serialize)]
pub(crate) struct MembershipView {
    track_id: String,
    member_id: String,
    display_name: String,
    role: &'static str,
    status: &'static str,
    current_streak: u32,
    longest_streak: u32,
    joined_at: DateTime<Utc>,
}

impl From<&Membership> for MembershipView {
    fn from(membership: &Membership) -> Self {
        Self {
            track_id: membership.track_id.0.clone(),
            member_id: membership.member_id.0.clone(),
            display_name: membership.display_name.clone(),
            role: membership.role.label(),
            status: membership.status.label(),
            current_streak: membership.streak.current,
            longest_streak: membership.streak.longest,
            joined_at: membership.joined_at,
        }
    }
}

pub(crate) async fn create_org_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewOrganization>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let owner = match caller(&headers) {
        Ok(owner) => owner,
        Err(response) => return response,
    };
    match service.create_organization(owner, request, Utc::now()) {
        Ok(org) => (StatusCode::CREATED, axum::Json(org)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_track_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(org_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewTrack>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match caller(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.create_track(&OrgId(org_id), &actor, request, Utc::now()) {
        Ok(track) => (StatusCode::CREATED, axum::Json(track)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn join_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<JoinRequest>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let member = match caller(&headers) {
        Ok(member) => member,
        Err(response) => return response,
    };
    match service.join_track(&TrackId(track_id), member, request, Utc::now()) {
        Ok(membership) => {
            (StatusCode::CREATED, axum::Json(MembershipView::from(&membership))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<NewSubmission>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let member = match caller(&headers) {
        Ok(member) => member,
        Err(response) => return response,
    };
    match service.create_submission(&TrackId(track_id), &member, request, Utc::now()) {
        Ok(submission) => {
            (StatusCode::CREATED, axum::Json(SubmissionView::from(&submission))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_submissions_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<SubmissionListQuery>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match caller(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let track_id = TrackId(track_id);
    if let Err(error) = service.authorize_track_admin(&actor, &track_id) {
        return error_response(error);
    }

    let filter = match query.status.as_deref() {
        None => None,
        Some("pending") => Some(SubmissionStatus::Pending),
        Some("approved") => Some(SubmissionStatus::Approved),
        Some("rejected") => Some(SubmissionStatus::Rejected),
        Some(other) => {
            let payload = json!({
                "error": format!("unknown status filter: {other}"),
            });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };

    match service.submissions(&track_id, filter) {
        Ok(submissions) => {
            let views: Vec<SubmissionView> = submissions.iter().map(SubmissionView::from).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn verify_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(submission_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<VerificationRequest>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let verifier = match caller(&headers) {
        Ok(verifier) => verifier,
        Err(response) => return response,
    };
    let submission_id = SubmissionId(submission_id);

    // The capability gate needs the submission's track before the decision
    // itself runs.
    let submission = match service.submission(&submission_id) {
        Ok(Some(submission)) => submission,
        Ok(None) => return error_response(StoreError::NotFound.into()),
        Err(error) => return error_response(error),
    };
    if let Err(error) = service.authorize_track_admin(&verifier, &submission.track_id) {
        return error_response(error);
    }

    match service.verify(&submission_id, &verifier, request, Utc::now()) {
        Ok(decided) => {
            (StatusCode::OK, axum::Json(SubmissionView::from(&decided))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn leaderboard_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path(track_id): Path<String>,
    Query(query): Query<StandingsQuery>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let at = match query.at.as_deref() {
        None => Utc::now(),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(at) => at.with_timezone(&Utc),
            Err(_) => {
                let payload = json!({
                    "error": "at must be an RFC 3339 timestamp",
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
            }
        },
    };

    match service.leaderboard(&TrackId(track_id), at) {
        Ok(standings) => (StatusCode::OK, axum::Json(standings)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn member_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path((track_id, member_id)): Path<(String, String)>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    match service.membership_profile(&TrackId(track_id), &MemberId(member_id)) {
        Ok(Some(membership)) => {
            (StatusCode::OK, axum::Json(MembershipView::from(&membership))).into_response()
        }
        Ok(None) => error_response(StoreError::NotFound.into()),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn member_status_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path((track_id, member_id)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(change): axum::Json<StatusChange>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match caller(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.set_member_status(
        &TrackId(track_id),
        &MemberId(member_id),
        &actor,
        change.status,
        Utc::now(),
    ) {
        Ok(membership) => {
            (StatusCode::OK, axum::Json(MembershipView::from(&membership))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn member_role_handler<S, N>(
    State(service): State<Arc<TrackService<S, N>>>,
    Path((track_id, member_id)): Path<(String, String)>,
    headers: HeaderMap,
    axum::Json(change): axum::Json<RoleChange>,
) -> Response
where
    S: TrackStore + 'static,
    N: NotificationPublisher + 'static,
{
    let actor = match caller(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.set_member_role(&TrackId(track_id), &MemberId(member_id), &actor, change.role) {
        Ok(membership) => {
            (StatusCode::OK, axum::Json(MembershipView::from(&membership))).into_response()
        }
        Err(error) => error_response(error),
    }
}

/// Resolves the acting member from the identity header. Requests without it
/// are turned away before any workflow code runs.
fn caller(headers: &HeaderMap) -> Result<MemberId, Response> {
    let raw = headers
        .get(MEMBER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        let payload = json!({
            "error": format!("missing {MEMBER_ID_HEADER} header"),
        });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    }
    Ok(MemberId(raw.to_string()))
}

fn error_response(error: TrackServiceError) -> Response {
    let status = match &error {
        TrackServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TrackServiceError::Store(StoreError::Conflict)
        | TrackServiceError::Store(StoreError::CapacityExceeded)
        | TrackServiceError::TrackFull
        | TrackServiceError::AlreadyDecided
        | TrackServiceError::Contention => StatusCode::CONFLICT,
        TrackServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        TrackServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        TrackServiceError::Forbidden => StatusCode::FORBIDDEN,
        TrackServiceError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    // Invariant details stay in the logs.
    let message = match &error {
        TrackServiceError::Invariant(_) => "internal error".to_string(),
        other => other.to_string(),
    };
    let payload = json!({
        "error": message,
    });
    (status, axum::Json(payload)).into_response()
}
