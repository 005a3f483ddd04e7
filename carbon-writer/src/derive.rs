//! Counter differentiation into deltas and per-second rates.
use std::collections::HashMap;

use crate::types::DataSource;

/// Counter differentiation mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DifferentiationMode {
    /// Counters and derives are sent as raw values.
    #[default]
    Disabled,

    /// Counters and derives are sent as the delta since the previous observation.
    Delta,

    /// Counters and derives are sent as the delta since the previous observation, divided by the number of seconds
    /// elapsed between the two observations.
    OverTime,
}

impl DifferentiationMode {
    /// Returns `true` if counters are differentiated at all.
    pub const fn is_enabled(self) -> bool {
        !matches!(self, DifferentiationMode::Disabled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Observation {
    timestamp: u64,
    value: f64,
}

/// Previous observations of differentiated metrics, keyed by full metric path.
///
/// Entries are never removed: a metric that stops reporting keeps its last observation for the life of the writer.
#[derive(Debug, Default)]
pub struct History {
    observations: HashMap<String, Observation>,
}

impl History {
    /// Creates an empty `History`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the value to report for a metric.
    ///
    /// Values of non-differentiable data sources, and all values when differentiation is disabled, are passed through
    /// unchanged and leave the history alone. Otherwise, the delta (or rate) since the previous observation of `path`
    /// is returned, and the current observation becomes the new baseline.
    ///
    /// Returns `None` when the value should not be reported: either because there is no previous observation to
    /// compare against, or because the counter went backwards and the data source has no upper bound to correct the
    /// wraparound with.
    pub fn derive(
        &mut self,
        path: &str,
        value: f64,
        ds: &DataSource,
        timestamp: u64,
        mode: DifferentiationMode,
    ) -> Option<f64> {
        if !mode.is_enabled() || !ds.kind().is_differentiable() || value.is_nan() {
            return Some(value);
        }

        let current = Observation { timestamp, value };
        let previous = match self.observations.get_mut(path) {
            Some(previous) => std::mem::replace(previous, current),
            None => {
                self.observations.insert(path.to_string(), current);
                return None;
            }
        };

        let delta = if value >= previous.value {
            value - previous.value
        } else if ds.max().is_unlimited() {
            // Without an upper bound there's no telling a wrap from a reset, so start over from this observation.
            return None;
        } else {
            let max = ds.max().as_f64_or_zero();
            let min = ds.min().as_f64_or_zero();
            (max - previous.value) + value - min
        };

        match mode {
            DifferentiationMode::OverTime => {
                let interval = timestamp.saturating_sub(previous.timestamp).max(1);
                Some(delta / interval as f64)
            }
            _ => Some(delta),
        }
    }

    /// Returns the last observation of `path` as `(timestamp, value)`.
    pub fn last_observation(&self, path: &str) -> Option<(u64, f64)> {
        self.observations.get(path).map(|o| (o.timestamp, o.value))
    }

    /// Returns the number of tracked metrics.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns `true` if no metrics are tracked.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{DifferentiationMode, History};
    use crate::types::{Bound, DataSource, DataSourceKind};

    const PATH: &str = "h.p.cnt.value";

    fn counter(min: Bound, max: Bound) -> DataSource {
        DataSource::new("value", DataSourceKind::Counter, min, max)
    }

    #[test]
    fn disabled_passes_through() {
        let mut history = History::new();
        let ds = counter(Bound::Value(0.0), Bound::Unlimited);

        assert_eq!(history.derive(PATH, 5.0, &ds, 1000, DifferentiationMode::Disabled), Some(5.0));
        assert_eq!(history.derive(PATH, 7.0, &ds, 1010, DifferentiationMode::Disabled), Some(7.0));
        assert!(history.is_empty());
    }

    #[test]
    fn not_a_number_passes_through() {
        let mut history = History::new();
        let ds = counter(Bound::Value(0.0), Bound::Unlimited);

        let result = history.derive(PATH, f64::NAN, &ds, 1000, DifferentiationMode::Delta);
        assert!(result.is_some_and(f64::is_nan));
        assert!(history.is_empty());
    }

    #[test]
    fn first_observation_is_suppressed() {
        for kind in [DataSourceKind::Counter, DataSourceKind::Derive] {
            let mut history = History::new();
            let ds = DataSource::new("value", kind, Bound::Value(0.0), Bound::Unlimited);

            assert_eq!(history.derive(PATH, 5.0, &ds, 1000, DifferentiationMode::Delta), None);
            assert_eq!(history.last_observation(PATH), Some((1000, 5.0)));
        }
    }

    #[test]
    fn delta_and_rate() {
        let ds = counter(Bound::Value(0.0), Bound::Unlimited);

        let mut history = History::new();
        history.derive(PATH, 100.0, &ds, 1000, DifferentiationMode::Delta);
        assert_eq!(history.derive(PATH, 150.0, &ds, 1010, DifferentiationMode::Delta), Some(50.0));
        assert_eq!(history.last_observation(PATH), Some((1010, 150.0)));

        let mut history = History::new();
        history.derive(PATH, 100.0, &ds, 1000, DifferentiationMode::OverTime);
        assert_eq!(history.derive(PATH, 150.0, &ds, 1010, DifferentiationMode::OverTime), Some(5.0));

        // Same or earlier timestamps divide by one second instead.
        assert_eq!(history.derive(PATH, 160.0, &ds, 1010, DifferentiationMode::OverTime), Some(10.0));
        assert_eq!(history.derive(PATH, 170.0, &ds, 1005, DifferentiationMode::OverTime), Some(10.0));
    }

    #[test]
    fn bounded_wraparound() {
        let ds = counter(Bound::Value(0.0), Bound::Value(4_294_967_295.0));

        let mut history = History::new();
        history.derive(PATH, 4_294_967_000.0, &ds, 1000, DifferentiationMode::Delta);
        assert_eq!(history.derive(PATH, 100.0, &ds, 1010, DifferentiationMode::Delta), Some(395.0));

        let ds = counter(Bound::Value(10.0), Bound::Value(1000.0));
        let mut history = History::new();
        history.derive(PATH, 900.0, &ds, 1000, DifferentiationMode::OverTime);
        assert_eq!(history.derive(PATH, 60.0, &ds, 1005, DifferentiationMode::OverTime), Some(30.0));
        assert_eq!(history.last_observation(PATH), Some((1005, 60.0)));
    }

    #[test]
    fn unlimited_wraparound_restarts_baseline() {
        let ds = counter(Bound::Value(0.0), Bound::Unlimited);
        let mut history = History::new();

        assert_eq!(history.derive(PATH, 5.0, &ds, 1000, DifferentiationMode::Delta), None);
        assert_eq!(history.last_observation(PATH), Some((1000, 5.0)));

        assert_eq!(history.derive(PATH, 3.0, &ds, 1010, DifferentiationMode::Delta), None);
        assert_eq!(history.last_observation(PATH), Some((1010, 3.0)));

        assert_eq!(history.derive(PATH, 8.0, &ds, 1020, DifferentiationMode::Delta), Some(5.0));
    }

    #[test]
    fn unlimited_min_counts_as_zero() {
        let ds = counter(Bound::Unlimited, Bound::Value(100.0));
        let mut history = History::new();

        history.derive(PATH, 90.0, &ds, 1000, DifferentiationMode::Delta);
        assert_eq!(history.derive(PATH, 5.0, &ds, 1010, DifferentiationMode::Delta), Some(15.0));
    }

    #[test]
    fn paths_are_tracked_independently() {
        let ds = counter(Bound::Value(0.0), Bound::Unlimited);
        let mut history = History::new();

        history.derive("a", 10.0, &ds, 1000, DifferentiationMode::Delta);
        assert_eq!(history.derive("b", 20.0, &ds, 1000, DifferentiationMode::Delta), None);
        assert_eq!(history.derive("a", 15.0, &ds, 1010, DifferentiationMode::Delta), Some(5.0));
        assert_eq!(history.len(), 2);
    }

    proptest! {
        #[test]
        fn gauges_are_never_differentiated(
            values in prop::collection::vec(-1.0e12f64..1.0e12, 1..16),
            mode in prop_oneof![
                Just(DifferentiationMode::Disabled),
                Just(DifferentiationMode::Delta),
                Just(DifferentiationMode::OverTime),
            ],
        ) {
            let ds = DataSource::new("value", DataSourceKind::Gauge, Bound::Value(0.0), Bound::Value(100.0));
            let mut history = History::new();

            for (i, value) in values.into_iter().enumerate() {
                prop_assert_eq!(history.derive(PATH, value, &ds, 1000 + i as u64, mode), Some(value));
            }
            prop_assert!(history.is_empty());
        }

        #[test]
        fn bounded_wrap_matches_formula(
            min in 0.0f64..1000.0,
            span in 1000.0f64..1.0e9,
            old_frac in 0.5f64..1.0,
            new_frac in 0.0f64..0.5,
            elapsed in 0u64..600,
        ) {
            let max = min + span;
            let old = min + span * old_frac;
            let new = min + span * new_frac;
            prop_assume!(new < old);

            let ds = counter(Bound::Value(min), Bound::Value(max));
            let mut history = History::new();
            history.derive(PATH, old, &ds, 1000, DifferentiationMode::OverTime);

            let expected = ((max - old) + new - min) / elapsed.max(1) as f64;
            let actual = history.derive(PATH, new, &ds, 1000 + elapsed, DifferentiationMode::OverTime).unwrap();
            prop_assert!((actual - expected).abs() <= expected.abs() * 1e-12);
        }
    }
}
