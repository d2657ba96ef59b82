// src/filter.rs

use crate::types::{DetectionRecord, RenderOptions};
use std::collections::HashSet;

/// Apply the configured filters to a normalized detection set.
///
/// Filters are conjunctive: a record must pass every active one. A record
/// missing the field a filter inspects passes that filter unconditionally,
/// so label filters never hide unlabeled records and id filters never hide
/// anonymous ones. An empty result is a normal outcome.
pub fn filter(records: &[DetectionRecord], options: &RenderOptions) -> Vec<DetectionRecord> {
    let labels: Option<HashSet<String>> = options
        .labels
        .as_ref()
        .map(|set| set.iter().map(|s| s.to_lowercase()).collect());

    records
        .iter()
        .filter(|record| {
            if let (Some(allowed), Some(label)) = (&labels, &record.label) {
                if !allowed.contains(&label.to_lowercase()) {
                    return false;
                }
            }
            if let (Some(allowed), Some(id)) = (&options.ids, &record.id) {
                if !allowed.contains(id) {
                    return false;
                }
            }
            if let (Some(cutoff), Some(frame)) = (options.max_frame_index, record.frame_index) {
                if frame > cutoff {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
