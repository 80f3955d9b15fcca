//! The ROI range-filter engine: a sparse set of per-column numeric
//! range constraints kept minimal and consistent as the user drags
//! sliders or types bounds.
//!
//! The reconciliation rules make the set self-cleaning: an update that
//! widens a column back to its full global range deletes that column's
//! entry, and an update that would invert the range is silently
//! rejected, leaving the set untouched. Filters are combined
//! conjunctively with inclusive bounds.

use serde::{Deserialize, Serialize};

use crate::roi::{Roi, RoiColumn};

/// Global min/max of one column over a ROI set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

/// One column's inclusive range constraint.
///
/// A missing bound means unconstrained on that side. An entry is never
/// stored when both bounds sit on the column's global range (that
/// filter would pass everything and is dropped instead).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiFilter {
    /// The column this filter constrains.
    pub column: RoiColumn,
    /// Inclusive lower bound, if any.
    pub min: Option<f64>,
    /// Inclusive upper bound, if any.
    pub max: Option<f64>,
}

impl RoiFilter {
    /// Whether a value lies within this filter's bounds (inclusive).
    #[must_use]
    pub fn admits(&self, value: f64) -> bool {
        value >= self.min.unwrap_or(f64::NEG_INFINITY)
            && value <= self.max.unwrap_or(f64::INFINITY)
    }
}

/// The sparse set of active range filters (at most one per column).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: Vec<RoiFilter>,
}

impl FilterSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Rebuild the set from persisted entries, keeping the last entry
    /// per column.
    #[must_use]
    pub fn from_filters(filters: Vec<RoiFilter>) -> Self {
        let mut set = Self::new();
        for filter in filters {
            set.remove(filter.column);
            set.filters.push(filter);
        }
        set
    }

    /// All active filters.
    #[must_use]
    pub fn filters(&self) -> &[RoiFilter] {
        &self.filters
    }

    /// The filter for one column, if any.
    #[must_use]
    pub fn get(&self, column: RoiColumn) -> Option<&RoiFilter> {
        self.filters.iter().find(|filter| filter.column == column)
    }

    /// Whether no filter is active.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Move a column's lower bound.
    ///
    /// The request is clamped to `global.min`. A clamped value landing
    /// on `global.min` while the upper bound is absent or on
    /// `global.max` deletes the column's entry (the constraint became a
    /// no-op). A clamped value at or above the effective upper bound
    /// would invert the range and is silently ignored.
    pub fn update_min(&mut self, column: RoiColumn, requested: f64, global: Bounds) {
        let clamped = requested.max(global.min);
        let existing_max = self.get(column).and_then(|filter| filter.max);
        let effective_max = existing_max.unwrap_or(global.max);

        if clamped <= global.min && existing_max.is_none_or(|max| max >= global.max) {
            self.remove(column);
        } else if clamped < effective_max {
            self.put(RoiFilter {
                column,
                min: Some(clamped),
                max: Some(effective_max),
            });
        }
        // Otherwise: inverted range requested; leave the set unchanged.
    }

    /// Move a column's upper bound. Mirror image of
    /// [`update_min`](Self::update_min).
    pub fn update_max(&mut self, column: RoiColumn, requested: f64, global: Bounds) {
        let clamped = requested.min(global.max);
        let existing_min = self.get(column).and_then(|filter| filter.min);
        let effective_min = existing_min.unwrap_or(global.min);

        if clamped >= global.max && existing_min.is_none_or(|min| min <= global.min) {
            self.remove(column);
        } else if clamped > effective_min {
            self.put(RoiFilter {
                column,
                min: Some(effective_min),
                max: Some(clamped),
            });
        }
    }

    /// Delete a column's filter unconditionally.
    pub fn remove(&mut self, column: RoiColumn) {
        self.filters.retain(|filter| filter.column != column);
    }

    /// Delete every filter.
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Delete filters on columns that are no longer visible.
    pub fn retain_columns(&mut self, visible: &[RoiColumn]) {
        self.filters
            .retain(|filter| visible.contains(&filter.column));
    }

    /// Whether a record passes every filter (conjunctive, inclusive).
    #[must_use]
    pub fn matches(&self, roi: &Roi) -> bool {
        self.matches_excluding(roi, None)
    }

    /// Like [`matches`](Self::matches), but skipping one column's
    /// filter during the AND reduction. Used to compute that column's
    /// own global bounds, so narrowing a column never shrinks the
    /// slider range available for widening it back.
    #[must_use]
    pub fn matches_excluding(&self, roi: &Roi, excluded: Option<RoiColumn>) -> bool {
        self.filters
            .iter()
            .filter(|filter| Some(filter.column) != excluded)
            .all(|filter| filter.admits(filter.column.value(roi)))
    }

    fn put(&mut self, filter: RoiFilter) {
        if let Some(existing) = self
            .filters
            .iter_mut()
            .find(|candidate| candidate.column == filter.column)
        {
            *existing = filter;
        } else {
            self.filters.push(filter);
        }
    }
}

/// Global bounds of one column over the ROI records visible when that
/// column's own filter is ignored.
///
/// Returns `None` when no record is visible (there is no slider range
/// to offer).
#[must_use]
pub fn column_bounds(rois: &[Roi], filters: &FilterSet, column: RoiColumn) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;
    for roi in rois {
        if !filters.matches_excluding(roi, Some(column)) {
            continue;
        }
        let value = column.value(roi);
        bounds = Some(bounds.map_or(
            Bounds {
                min: value,
                max: value,
            },
            |current| Bounds {
                min: current.min.min(value),
                max: current.max.max(value),
            },
        ));
    }
    bounds
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::roi::RoiPoint;

    const GLOBAL: Bounds = Bounds {
        min: 0.0,
        max: 100.0,
    };

    fn roi_with_surface(id: u32, surface: u32) -> Roi {
        Roi {
            id,
            column: 0,
            row: 0,
            width: 1,
            height: 1,
            surface,
            perimeter: 4.0,
            feret_min: 1.0,
            feret_max: std::f64::consts::SQRT_2,
            aspect_ratio: 1.0 / std::f64::consts::SQRT_2,
            roundness: 0.5,
            solidity: 1.0,
            sphericity: 0.88,
            fill_ratio: 1.0,
            convex_hull: vec![RoiPoint::new(0.0, 0.0)],
            min_bounding_rect: [RoiPoint::new(0.0, 0.0); 4],
        }
    }

    #[test]
    fn update_min_clamps_to_global_min() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, -20.0, GLOBAL);
        // Clamped to the global min with no max set: the filter is a
        // no-op and must not be stored.
        assert!(set.get(RoiColumn::Surface).is_none());

        set.update_max(RoiColumn::Surface, 50.0, GLOBAL);
        set.update_min(RoiColumn::Surface, -20.0, GLOBAL);
        let filter = set.get(RoiColumn::Surface).unwrap();
        assert_eq!(filter.min, Some(0.0));
        assert_eq!(filter.max, Some(50.0));
    }

    #[test]
    fn update_min_stores_narrowed_bound() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        let filter = set.get(RoiColumn::Surface).unwrap();
        assert_eq!(filter.min, Some(10.0));
        assert_eq!(filter.max, Some(100.0));
    }

    #[test]
    fn update_min_back_to_global_drops_the_filter() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        assert!(!set.is_empty());

        set.update_min(RoiColumn::Surface, 0.0, GLOBAL);
        assert!(set.is_empty());
    }

    #[test]
    fn update_min_keeps_filter_while_max_is_narrowed() {
        let mut set = FilterSet::new();
        set.update_max(RoiColumn::Surface, 60.0, GLOBAL);
        // Min back at global, but max still narrowed: entry must stay.
        set.update_min(RoiColumn::Surface, 0.0, GLOBAL);
        let filter = set.get(RoiColumn::Surface).unwrap();
        assert_eq!(filter.min, Some(0.0));
        assert_eq!(filter.max, Some(60.0));
    }

    #[test]
    fn inverted_min_is_silently_rejected() {
        let mut set = FilterSet::new();
        set.update_max(RoiColumn::Surface, 40.0, GLOBAL);
        let before = set.clone();

        set.update_min(RoiColumn::Surface, 40.0, GLOBAL);
        assert_eq!(set, before);
        set.update_min(RoiColumn::Surface, 75.0, GLOBAL);
        assert_eq!(set, before);
    }

    #[test]
    fn update_max_mirrors_update_min() {
        let mut set = FilterSet::new();
        set.update_max(RoiColumn::Surface, 120.0, GLOBAL);
        assert!(set.is_empty(), "clamped to global max = no-op");

        set.update_max(RoiColumn::Surface, 80.0, GLOBAL);
        let filter = set.get(RoiColumn::Surface).unwrap();
        assert_eq!(filter.min, Some(0.0));
        assert_eq!(filter.max, Some(80.0));

        set.update_min(RoiColumn::Surface, 30.0, GLOBAL);
        let before = set.clone();
        set.update_max(RoiColumn::Surface, 30.0, GLOBAL);
        assert_eq!(set, before, "inverted max silently rejected");

        set.update_max(RoiColumn::Surface, 100.0, GLOBAL);
        let filter = set.get(RoiColumn::Surface).unwrap();
        assert_eq!(filter.max, Some(100.0), "max widened while min holds");
        assert_eq!(filter.min, Some(30.0));
    }

    #[test]
    fn remove_deletes_unconditionally() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        set.update_min(RoiColumn::Roundness, 0.5, Bounds { min: 0.0, max: 1.0 });
        set.remove(RoiColumn::Surface);
        assert!(set.get(RoiColumn::Surface).is_none());
        assert!(set.get(RoiColumn::Roundness).is_some());
    }

    #[test]
    fn retain_columns_clears_hidden_filters() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        set.update_min(RoiColumn::Width, 2.0, GLOBAL);

        set.retain_columns(&[RoiColumn::Surface, RoiColumn::Height]);

        assert!(set.get(RoiColumn::Surface).is_some());
        assert!(set.get(RoiColumn::Width).is_none());
    }

    #[test]
    fn bounds_are_inclusive_on_both_sides() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        set.update_max(RoiColumn::Surface, 50.0, GLOBAL);

        assert!(set.matches(&roi_with_surface(0, 10)));
        assert!(!set.matches(&roi_with_surface(1, 9)));
        assert!(set.matches(&roi_with_surface(2, 50)));
        assert!(!set.matches(&roi_with_surface(3, 51)));
    }

    #[test]
    fn fractional_boundary_values_are_inclusive() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Perimeter, 10.0, GLOBAL);
        set.update_max(RoiColumn::Perimeter, 50.0, GLOBAL);

        let with_perimeter = |perimeter: f64| {
            let mut roi = roi_with_surface(0, 1);
            roi.perimeter = perimeter;
            roi
        };
        assert!(set.matches(&with_perimeter(10.0)));
        assert!(!set.matches(&with_perimeter(9.999)));
        assert!(set.matches(&with_perimeter(50.0)));
        assert!(!set.matches(&with_perimeter(50.001)));
    }

    #[test]
    fn filters_combine_conjunctively() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 10.0, GLOBAL);
        set.update_min(RoiColumn::Id, 2.0, Bounds { min: 0.0, max: 5.0 });

        // Passes surface but fails id.
        assert!(!set.matches(&roi_with_surface(1, 20)));
        // Passes both.
        assert!(set.matches(&roi_with_surface(3, 20)));
    }

    #[test]
    fn matches_excluding_skips_one_column() {
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 30.0, GLOBAL);

        let small = roi_with_surface(0, 10);
        assert!(!set.matches(&small));
        assert!(set.matches_excluding(&small, Some(RoiColumn::Surface)));
        assert!(!set.matches_excluding(&small, Some(RoiColumn::Width)));
    }

    #[test]
    fn column_bounds_ignore_the_columns_own_filter() {
        let rois = vec![
            roi_with_surface(0, 5),
            roi_with_surface(1, 20),
            roi_with_surface(2, 90),
        ];
        let mut set = FilterSet::new();
        set.update_min(RoiColumn::Surface, 15.0, GLOBAL);

        // The surface slider still spans the full data range.
        let bounds = column_bounds(&rois, &set, RoiColumn::Surface).unwrap();
        assert!((bounds.min - 5.0).abs() < f64::EPSILON);
        assert!((bounds.max - 90.0).abs() < f64::EPSILON);

        // Another column's bounds see only the filtered records.
        let bounds = column_bounds(&rois, &set, RoiColumn::Id).unwrap();
        assert!((bounds.min - 1.0).abs() < f64::EPSILON);
        assert!((bounds.max - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn column_bounds_of_empty_set_is_none() {
        assert!(column_bounds(&[], &FilterSet::new(), RoiColumn::Surface).is_none());
    }

    #[test]
    fn from_filters_keeps_last_entry_per_column() {
        let set = FilterSet::from_filters(vec![
            RoiFilter {
                column: RoiColumn::Surface,
                min: Some(1.0),
                max: None,
            },
            RoiFilter {
                column: RoiColumn::Surface,
                min: Some(7.0),
                max: Some(9.0),
            },
        ]);
        assert_eq!(set.filters().len(), 1);
        assert_eq!(set.get(RoiColumn::Surface).unwrap().min, Some(7.0));
    }

    #[test]
    fn filter_serde_round_trip() {
        let filter = RoiFilter {
            column: RoiColumn::Roundness,
            min: Some(0.25),
            max: None,
        };
        let json = serde_json::to_string(&filter).unwrap();
        let back: RoiFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(filter, back);
    }
}
