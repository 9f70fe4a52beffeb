use thiserror::Error;

#[derive(Error, Debug)]
pub enum RotaError {
    // ── Validation: malformed input, rejected before it reaches the schedule ──
    #[error("Invalid intent '{id}': {reason}")]
    InvalidIntent { id: String, reason: String },

    #[error("Invalid time '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("Unknown intent '{id}'")]
    UnknownIntent { id: String },

    #[error("Clock cannot move backwards: {from} -> {to}")]
    ClockRewind { from: String, to: String },

    #[error("Invalid skill value '{value}'")]
    InvalidSkillValue { value: String },

    // ── Configuration ──────────────────────────────
    #[error("Unknown skill '{skill}'")]
    UnknownSkill { skill: String },

    #[error("Unknown modality '{modality}'")]
    UnknownModality { modality: String },

    #[error("No weight defined for skill '{skill}' in modality '{modality}'")]
    MissingWeight { skill: String, modality: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // ── Internal ───────────────────────────────────
    #[error("Invariant violation for {worker}/{skill}/{modality}: {detail}")]
    InvariantViolation {
        worker: String,
        skill: String,
        modality: String,
        detail: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Configuration,
    InvariantViolation,
    Internal,
}

impl RotaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIntent { .. }
            | Self::InvalidTime { .. }
            | Self::UnknownIntent { .. }
            | Self::ClockRewind { .. }
            | Self::InvalidSkillValue { .. } => ErrorKind::Validation,
            Self::UnknownSkill { .. }
            | Self::UnknownModality { .. }
            | Self::MissingWeight { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::Database(_) | Self::Serialization(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_intent(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIntent {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

pub type RotaResult<T> = Result<T, RotaError>;
