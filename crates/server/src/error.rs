//! `SovereignError` maps every subsystem error into the seven-kind
//! taxonomy of `spec.md` §7, returned to MCP callers as `{kind, message}`.
//! `Internal` messages are generic; the underlying detail is logged
//! locally via `tracing` with an incident id, never sent to the caller.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    UnsafePath,
    NotFound,
    Conflict,
    Timeout,
    ChainBroken,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SovereignError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SovereignError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn internal(detail: impl std::fmt::Display) -> Self {
        let incident_id = Uuid::new_v4();
        tracing::error!(%incident_id, detail = %detail, "internal error");
        Self::new(ErrorKind::Internal, format!("internal error (incident {incident_id})"))
    }
}

impl std::fmt::Display for SovereignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SovereignError {}

impl From<sovereign_coherence::CoherenceError> for SovereignError {
    fn from(err: sovereign_coherence::CoherenceError) -> Self {
        use sovereign_coherence::CoherenceError as E;
        match err {
            E::InvalidSchema(msg) => Self::new(ErrorKind::InvalidInput, msg),
            E::InvalidPacket(key) => Self::new(ErrorKind::InvalidInput, format!("packet missing key '{key}'")),
            E::UnsafePathSegment(seg) => Self::new(ErrorKind::UnsafePath, format!("unsafe path segment: {seg}")),
            E::Io(e) => Self::internal(e),
            E::Json(e) => Self::internal(e),
        }
    }
}

impl From<sovereign_chronicle::ChronicleError> for SovereignError {
    fn from(err: sovereign_chronicle::ChronicleError) -> Self {
        use sovereign_chronicle::ChronicleError as E;
        match err {
            E::InvalidInput(msg) => Self::new(ErrorKind::InvalidInput, msg),
            E::NotFound(msg) => Self::new(ErrorKind::NotFound, msg),
            E::Io(e) => Self::internal(e),
            E::Json(e) => Self::internal(e),
        }
    }
}

impl From<sovereign_governance::GovernanceError> for SovereignError {
    fn from(err: sovereign_governance::GovernanceError) -> Self {
        use sovereign_governance::GovernanceError as E;
        match err {
            E::DetectorTimeout { path } => Self::new(ErrorKind::Timeout, format!("detector scan of {path} timed out")),
            E::DetectorFailure(e) => Self::internal(e),
            E::ChainBroken { line } => Self::new(ErrorKind::ChainBroken, format!("audit chain broken at line {line}")),
            E::AuditLog(e) => Self::internal(e),
        }
    }
}

impl From<sovereign_spiral::SpiralError> for SovereignError {
    fn from(err: sovereign_spiral::SpiralError) -> Self {
        use sovereign_spiral::SpiralError as E;
        match err {
            E::InvalidSessionId(id) => Self::new(ErrorKind::InvalidInput, format!("invalid session id: {id}")),
            E::NoPriorSession => Self::new(ErrorKind::NotFound, "no prior session to inherit from"),
            E::Io(e) => Self::internal(e),
            E::Json(e) => Self::internal(e),
        }
    }
}

impl From<sovereign_compaction::CompactionError> for SovereignError {
    fn from(err: sovereign_compaction::CompactionError) -> Self {
        use sovereign_compaction::CompactionError as E;
        match err {
            E::Io(e) => Self::internal(e),
            E::Json(e) => Self::internal(e),
        }
    }
}
