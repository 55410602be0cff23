use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use trackline::workflows::tracks::{
    NotificationError, NotificationPublisher, ProofKind, ProofReference, VerificationNotice,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Storage seam for uploaded proof artifacts. The HTTP layer hands raw bytes
/// to the vault and gets back an addressable reference.
pub(crate) trait ProofVault: Send + Sync {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<ProofReference, ProofVaultError>;
}

#[derive(Debug)]
pub(crate) enum ProofVaultError {
    TooLarge { limit: usize },
    Unavailable(String),
}

impl fmt::Display for ProofVaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofVaultError::TooLarge { limit } => {
                write!(f, "proof exceeds the {limit}-byte limit")
            }
            ProofVaultError::Unavailable(detail) => write!(f, "proof vault unavailable: {detail}"),
        }
    }
}

impl std::error::Error for ProofVaultError {}

pub(crate) struct MemoryProofVault {
    max_bytes: usize,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    sequence: AtomicU64,
}

impl MemoryProofVault {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            objects: Arc::default(),
            sequence: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn stored_count(&self) -> usize {
        self.objects.lock().expect("proof vault mutex poisoned").len()
    }
}

impl ProofVault for MemoryProofVault {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<ProofReference, ProofVaultError> {
        if bytes.len() > self.max_bytes {
            return Err(ProofVaultError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let url = format!("memory://proofs/{id:06}/{filename}");
        let mut guard = self.objects.lock().expect("proof vault mutex poisoned");
        guard.insert(url.clone(), bytes.to_vec());
        Ok(ProofReference {
            url,
            kind: classify_proof(filename),
        })
    }
}

/// Image uploads keep their kind so clients can render inline previews;
/// everything else is a plain file attachment.
pub(crate) fn classify_proof(filename: &str) -> ProofKind {
    let is_image = mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false);
    if is_image {
        ProofKind::Image
    } else {
        ProofKind::File
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNoticePublisher {
    events: Arc<Mutex<Vec<VerificationNotice>>>,
}

impl NotificationPublisher for InMemoryNoticePublisher {
    fn publish(&self, notice: VerificationNotice) -> Result<(), NotificationError> {
        let mut guard = self.events.lock().expect("notice mutex poisoned");
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNoticePublisher {
    pub(crate) fn events(&self) -> Vec<VerificationNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
}
