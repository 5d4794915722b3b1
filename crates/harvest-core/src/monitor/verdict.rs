//! Final-size classification.

/// Result of the monitor's one final check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalVerdict {
    Succeeded { size_bytes: u64 },
    SuspiciouslySmall { size_bytes: u64, threshold_bytes: u64 },
    /// The artifact is missing or could not be stat'ed; nothing can be certified.
    StatError(String),
}

impl FinalVerdict {
    pub fn size_bytes(&self) -> Option<u64> {
        match self {
            FinalVerdict::Succeeded { size_bytes }
            | FinalVerdict::SuspiciouslySmall { size_bytes, .. } => Some(*size_bytes),
            FinalVerdict::StatError(_) => None,
        }
    }
}

/// `size >= threshold` succeeds; the boundary itself is a success.
pub fn classify_final_size(size_bytes: u64, threshold_bytes: u64) -> FinalVerdict {
    if size_bytes >= threshold_bytes {
        FinalVerdict::Succeeded { size_bytes }
    } else {
        FinalVerdict::SuspiciouslySmall {
            size_bytes,
            threshold_bytes,
        }
    }
}
