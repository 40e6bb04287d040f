use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::property::Property;
use crate::scoring::ScoringEngine;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Outcome of a batch rescore. A best-effort batch, not a transaction:
/// properties scored before a failure keep their new scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescoreReport {
    pub total: usize,
    pub scored: usize,
    /// `(property id, error)` for every property recorded as zero
    pub failed: Vec<(u64, String)>,
    pub batches_committed: usize,
    pub cancelled: bool,
    /// Set when a batch could not be committed; rescoring stops there
    pub commit_error: Option<String>,
}

impl RescoreReport {
    /// True when every property was scored and committed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.commit_error.is_none() && self.failed.is_empty()
    }
}

/// Re-score every property in batches of `batch_size`.
///
/// Properties within a batch are scored in parallel; `commit` receives the
/// whole collection after each batch. `cancel` is checked between batches,
/// so an interrupted run leaves every property either fully old or fully
/// new. Rerunning with unchanged inputs gives the same scores.
pub fn rescore_all<F>(
    engine: &ScoringEngine,
    properties: &mut [Property],
    batch_size: usize,
    cancel: Option<&AtomicBool>,
    mut commit: F,
) -> RescoreReport
where
    F: FnMut(&[Property]) -> Result<()>,
{
    let batch_size = batch_size.max(1);
    let mut report = RescoreReport {
        total: properties.len(),
        ..Default::default()
    };

    let mut start = 0;
    while start < properties.len() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            warn!(scored = report.scored, total = report.total, "rescore cancelled");
            report.cancelled = true;
            break;
        }

        let end = (start + batch_size).min(properties.len());
        let failures: Vec<(u64, String)> = properties[start..end]
            .par_iter_mut()
            .filter_map(|property| {
                let id = property.id;
                engine.calculate_score(property).err().map(|e| (id, e.to_string()))
            })
            .collect();

        report.scored += (end - start) - failures.len();
        report.failed.extend(failures);

        let batch_number = report.batches_committed + 1;
        if let Err(e) = commit(properties) {
            error!(batch = batch_number, error = %format!("{:#}", e), "failed to commit batch");
            report.commit_error = Some(format!("batch {}: {:#}", batch_number, e));
            break;
        }
        report.batches_committed += 1;
        info!(batch = batch_number, properties = end - start, "committed batch");

        start = end;
    }

    info!(
        scored = report.scored,
        failed = report.failed.len(),
        total = report.total,
        "batch scoring completed"
    );
    report
}
