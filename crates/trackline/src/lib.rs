//! Trackline keeps score for organizations that run recurring challenge
//! tracks: members file one proof-backed submission per period, admins verify
//! them, approvals extend per-membership streaks, and standings weight each
//! member's period total by their streak multiplier.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
