use crate::{
    error::{Error, Result},
    selector::SceneRange,
};
use serde::Serialize;
use tracing::debug;

/// Smallest part count accepted for a split export.
pub const MIN_PARTS: usize = 2;

/// Largest part count accepted for a split export.
pub const MAX_PARTS: usize = 20;

/// Partition of a selection into contiguous, size-balanced parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    /// Selection size the plan covers
    pub total: usize,

    /// Part ranges, 1-based and relative to the selection
    pub ranges: Vec<SceneRange>,
}

impl SplitPlan {
    /// Number of parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.ranges.len()
    }

    /// Sizes of the parts, in order.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.len()).collect()
    }
}

/// Splits a selection of `total` scenes into `parts` contiguous ranges.
///
/// Sizes differ by at most one; when `total` does not divide evenly the earlier
/// parts take the extra scene.
///
/// # Errors
///
/// Returns [`Error::Config`] if `parts` is outside `2..=20`, and
/// [`Error::SplitInfeasible`] if there are fewer scenes than parts.
pub fn plan_parts(total: usize, parts: usize) -> Result<SplitPlan> {
    if !(MIN_PARTS..=MAX_PARTS).contains(&parts) {
        return Err(Error::config(format!(
            "Part count must be between {MIN_PARTS} and {MAX_PARTS}, got {parts}"
        )));
    }

    if total < parts {
        return Err(Error::SplitInfeasible {
            requested: parts,
            available: total,
        });
    }

    let base = total / parts;
    let remainder = total % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 1;
    for index in 0..parts {
        let size = base + usize::from(index < remainder);
        ranges.push(SceneRange::new(start, start + size - 1));
        start += size;
    }

    let plan = SplitPlan { total, ranges };
    debug!(
        "Split {} scene(s) into {} parts: {:?}",
        total,
        parts,
        plan.sizes()
    );

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_into_three() {
        let plan = plan_parts(10, 3).unwrap();

        assert_eq!(plan.sizes(), vec![4, 3, 3]);
        let sizes = plan.sizes();
        let max = sizes.iter().max().unwrap();
        let min = sizes.iter().min().unwrap();
        assert!(max - min <= 1);

        let positions: Vec<usize> = plan.ranges.iter().flat_map(|r| r.start..=r.end).collect();
        assert_eq!(positions, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_even_split() {
        let plan = plan_parts(6, 2).unwrap();
        assert_eq!(
            plan.ranges,
            vec![SceneRange::new(1, 3), SceneRange::new(4, 6)]
        );
    }

    #[test]
    fn test_one_scene_per_part() {
        let plan = plan_parts(4, 4).unwrap();
        assert!(plan.ranges.iter().all(|r| r.len() == 1));
        assert_eq!(plan.part_count(), 4);
    }

    #[test]
    fn test_balance_holds_for_all_feasible_inputs() {
        for parts in MIN_PARTS..=MAX_PARTS {
            for total in parts..parts * 4 {
                let plan = plan_parts(total, parts).unwrap();
                let sizes = plan.sizes();
                assert_eq!(sizes.iter().sum::<usize>(), total);
                assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
                assert_eq!(plan.ranges.first().unwrap().start, 1);
                assert_eq!(plan.ranges.last().unwrap().end, total);
                for pair in plan.ranges.windows(2) {
                    assert_eq!(pair[0].end + 1, pair[1].start);
                }
            }
        }
    }

    #[test]
    fn test_infeasible_split() {
        let err = plan_parts(2, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::SplitInfeasible {
                requested: 3,
                available: 2
            }
        ));
    }

    #[test]
    fn test_part_count_bounds() {
        assert!(plan_parts(10, 1).unwrap_err().is_config());
        assert!(plan_parts(100, 21).unwrap_err().is_config());
        assert!(plan_parts(100, 20).is_ok());
    }
}
