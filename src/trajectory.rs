// src/trajectory.rs

use crate::types::{DetectionRecord, Point};
use std::collections::BTreeMap;

/// Build per-identity movement paths from a normalized detection set.
///
/// Only records whose label matches `target_label` (case-insensitive)
/// participate. Each contributes the bottom midpoint of its box, the point
/// where the entity meets the ground. Points are ordered by sequence key,
/// ties keeping input order, and identities with fewer than two points are
/// excluded since they describe no movement.
///
/// Anonymous records get a synthetic per-index identity so they never merge
/// into a shared path; being single-point groups, the `<2` rule always drops
/// them.
pub fn build_trajectories(
    records: &[DetectionRecord],
    target_label: &str,
) -> BTreeMap<String, Vec<Point>> {
    let mut keyed: BTreeMap<String, Vec<(f64, Point)>> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        let matches = record
            .label
            .as_deref()
            .is_some_and(|label| label.eq_ignore_ascii_case(target_label));
        if !matches {
            continue;
        }
        let identity = match &record.id {
            Some(id) => id.clone(),
            None => format!("~{index}"),
        };
        keyed
            .entry(identity)
            .or_default()
            .push((record.sequence_key, record.bbox.bottom_mid()));
    }

    keyed
        .into_iter()
        .filter(|(_, points)| points.len() >= 2)
        .map(|(identity, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            (identity, points.into_iter().map(|(_, p)| p).collect())
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelBox;

    fn record(id: Option<&str>, label: &str, x: f32, seq: f64) -> DetectionRecord {
        DetectionRecord {
            id: id.map(String::from),
            label: Some(label.to_string()),
            score: None,
            bbox: PixelBox::new(x, 0.0, 10.0, 20.0),
            sequence_key: seq,
            frame_index: None,
        }
    }

    #[test]
    fn test_paths_grouped_by_identity_and_ordered() {
        let records = vec![
            record(Some("a"), "person", 100.0, 2.0),
            record(Some("b"), "person", 0.0, 0.0),
            record(Some("a"), "person", 50.0, 1.0),
            record(Some("b"), "person", 10.0, 1.0),
        ];
        let paths = build_trajectories(&records, "person");
        assert_eq!(paths.len(), 2);
        // Sorted by sequence key, anchored at the bottom midpoint.
        assert_eq!(
            paths["a"],
            vec![Point::new(55.0, 20.0), Point::new(105.0, 20.0)]
        );
        assert_eq!(
            paths["b"],
            vec![Point::new(5.0, 20.0), Point::new(15.0, 20.0)]
        );
    }

    #[test]
    fn test_single_point_identities_are_excluded() {
        let records = vec![
            record(Some("lone"), "person", 0.0, 0.0),
            record(Some("pair"), "person", 0.0, 0.0),
            record(Some("pair"), "person", 10.0, 1.0),
        ];
        let paths = build_trajectories(&records, "person");
        assert_eq!(paths.len(), 1);
        assert!(paths.contains_key("pair"));
    }

    #[test]
    fn test_anonymous_records_never_merge() {
        // Two anonymous matches: if they collapsed into one identity they
        // would form a visible two-point path.
        let records = vec![
            record(None, "person", 0.0, 0.0),
            record(None, "person", 10.0, 1.0),
        ];
        assert!(build_trajectories(&records, "person").is_empty());
    }

    #[test]
    fn test_label_match_is_case_insensitive() {
        let records = vec![
            record(Some("a"), "Person", 0.0, 0.0),
            record(Some("a"), "PERSON", 10.0, 1.0),
            record(Some("a"), "car", 20.0, 2.0),
        ];
        let paths = build_trajectories(&records, "person");
        assert_eq!(paths["a"].len(), 2);
    }

    #[test]
    fn test_equal_sequence_keys_keep_input_order() {
        let records = vec![
            record(Some("a"), "person", 0.0, 1.0),
            record(Some("a"), "person", 10.0, 1.0),
            record(Some("a"), "person", 20.0, 1.0),
        ];
        let paths = build_trajectories(&records, "person");
        assert_eq!(
            paths["a"],
            vec![
                Point::new(5.0, 20.0),
                Point::new(15.0, 20.0),
                Point::new(25.0, 20.0)
            ]
        );
    }
}
