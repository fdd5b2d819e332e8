//! Buffer policy: which eligible files are held back and which get converted.
//!
//! The newest `buffer_size` eligible files are always left alone as a safety
//! margin against files that are still arriving. Everything older forms the
//! batch for this cycle.

use crate::scan::CandidateFile;

/// Outcome of applying the buffer policy to an eligible set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchDecision {
    /// Not enough eligible files to exceed the buffer; nothing to do.
    Idle {
        /// Size of the eligible set that was examined.
        eligible: usize,
    },
    /// Files to convert, in processing order.
    Process(Vec<CandidateFile>),
}

impl BatchDecision {
    /// Files to convert; empty when idle.
    pub fn into_batch(self) -> Vec<CandidateFile> {
        match self {
            BatchDecision::Idle { .. } => Vec::new(),
            BatchDecision::Process(batch) => batch,
        }
    }
}

/// Splits the buffer off a newest-first eligible set.
///
/// Returns `Idle` when `eligible.len() <= buffer_size`. Otherwise the first
/// `buffer_size` entries are dropped and the rest is returned with its order
/// kept, so processing runs from the least stale to the most stale file.
pub fn select_batch(mut eligible: Vec<CandidateFile>, buffer_size: usize) -> BatchDecision {
    if eligible.len() <= buffer_size {
        return BatchDecision::Idle {
            eligible: eligible.len(),
        };
    }
    BatchDecision::Process(eligible.split_off(buffer_size))
}
