//! Column split of two-block rows.
//!
//! Manual resizing maps pointer travel onto the ratio and clamps it to
//! [1/3, 2/3]. Auto-equalize nudges the ratio toward
//! `left / (left + right)` of the measured column heights, damped so it
//! does not oscillate, and re-measures between iterations.

use crate::config::EqualizeConfig;
use crate::model::{clamp_column_ratio, RowId, MAX_COLUMN_RATIO, MIN_COLUMN_RATIO};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Smallest ratio change still worth a re-render
const MIN_RATIO_STEP: f64 = 1e-4;

/// An in-flight drag of a row's resize handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeGesture {
    pub row_id: RowId,
    pub start_x: f64,
    pub start_ratio: f64,
    pub row_width: f64,
    /// Set once the first update has been written to history
    #[serde(default)]
    pub recorded: bool,
}

impl ResizeGesture {
    pub fn new(row_id: impl Into<RowId>, start_x: f64, start_ratio: f64, row_width: f64) -> Self {
        Self {
            row_id: row_id.into(),
            start_x,
            start_ratio,
            row_width,
            recorded: false,
        }
    }

    /// Ratio for the pointer at `x`
    pub fn ratio_at(&self, x: f64) -> f64 {
        if self.row_width <= 0.0 || !self.row_width.is_finite() {
            return clamp_column_ratio(self.start_ratio);
        }
        clamp_column_ratio(self.start_ratio + (x - self.start_x) / self.row_width)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EqualizeStop {
    /// Height difference under tolerance
    Converged,
    MaxIterations,
    /// Clamping pinned the ratio; further iterations change nothing
    Stalled,
    /// Column heights unavailable or zero
    Unmeasurable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum EqualizeStep {
    Apply { ratio: f64 },
    Done { reason: EqualizeStop },
}

/// One auto-equalize run for one row.
///
/// The run keeps its own last applied ratio instead of re-reading the
/// document, which may not reflect the previous iteration yet. Callers
/// that store the ratio report the stored value back with
/// [`EqualizeRun::sync_ratio`].
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizeRun {
    row_id: RowId,
    last_ratio: f64,
    iterations: u32,
    frames_waited: u32,
    /// Set once an applied step has landed in history
    recorded: bool,
    config: EqualizeConfig,
}

impl EqualizeRun {
    pub fn new(row_id: impl Into<RowId>, current_ratio: f64, config: EqualizeConfig) -> Self {
        Self {
            row_id: row_id.into(),
            last_ratio: current_ratio,
            iterations: 0,
            // The first measurement needs no wait.
            frames_waited: config.frames_between,
            recorded: false,
            config,
        }
    }

    pub fn row_id(&self) -> &str {
        &self.row_id
    }

    pub fn last_ratio(&self) -> f64 {
        self.last_ratio
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn recorded(&self) -> bool {
        self.recorded
    }

    pub fn mark_recorded(&mut self) {
        self.recorded = true;
    }

    /// Adopt the ratio the document actually stored for the last step
    pub fn sync_ratio(&mut self, stored: f64) {
        self.last_ratio = stored;
    }

    /// Equalize bounds narrowed to what a row can store
    fn bounds(&self) -> (f64, f64) {
        let lo = self.config.min_ratio.max(MIN_COLUMN_RATIO);
        let hi = self.config.max_ratio.min(MAX_COLUMN_RATIO);
        if lo <= hi {
            (lo, hi)
        } else {
            (MIN_COLUMN_RATIO, MAX_COLUMN_RATIO)
        }
    }

    /// Count one animation frame; true once enough frames have passed to measure
    pub fn on_frame(&mut self) -> bool {
        if self.frames_waited < self.config.frames_between {
            self.frames_waited += 1;
        }
        self.frames_waited >= self.config.frames_between
    }

    /// Feed the measured column heights and get the next action
    pub fn step(&mut self, left: f64, right: f64) -> EqualizeStep {
        let total = left + right;
        if !total.is_finite() || total <= 0.0 {
            return EqualizeStep::Done {
                reason: EqualizeStop::Unmeasurable,
            };
        }
        if (left - right).abs() < self.config.tolerance_px {
            return EqualizeStep::Done {
                reason: EqualizeStop::Converged,
            };
        }
        if self.iterations >= self.config.max_iterations {
            return EqualizeStep::Done {
                reason: EqualizeStop::MaxIterations,
            };
        }

        let target = left / total;
        let (lo, hi) = self.bounds();
        let next = (self.last_ratio + (target - self.last_ratio) * self.config.damping)
            .clamp(lo, hi);

        if (next - self.last_ratio).abs() < MIN_RATIO_STEP {
            return EqualizeStep::Done {
                reason: EqualizeStop::Stalled,
            };
        }

        self.iterations += 1;
        self.last_ratio = next;
        self.frames_waited = 0;

        debug!(
            row_id = %self.row_id,
            iteration = self.iterations,
            left,
            right,
            ratio = next,
            "equalize step"
        );

        EqualizeStep::Apply { ratio: next }
    }
}

/// Result of a synchronous equalize run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualizeReport {
    /// Every ratio applied, in order
    pub ratios: Vec<f64>,
    pub stop: EqualizeStop,
}

impl EqualizeReport {
    pub fn final_ratio(&self) -> Option<f64> {
        self.ratios.last().copied()
    }
}

/// Run auto-equalize to completion against a synchronous layout model.
///
/// `measure` renders the row at the given ratio and returns
/// `(left, right)` column heights.
pub fn equalize_with<F>(
    row_id: &str,
    start_ratio: f64,
    config: &EqualizeConfig,
    mut measure: F,
) -> EqualizeReport
where
    F: FnMut(f64) -> Option<(f64, f64)>,
{
    let mut run = EqualizeRun::new(row_id, start_ratio, config.clone());
    let mut ratios = Vec::new();
    let mut ratio = start_ratio;

    // max_iterations bounds Apply steps, so this always terminates.
    loop {
        let Some((left, right)) = measure(ratio) else {
            return EqualizeReport {
                ratios,
                stop: EqualizeStop::Unmeasurable,
            };
        };
        match run.step(left, right) {
            EqualizeStep::Apply { ratio: next } => {
                ratio = next;
                ratios.push(next);
            }
            EqualizeStep::Done { reason } => {
                return EqualizeReport { ratios, stop: reason };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MAX_COLUMN_RATIO, MIN_COLUMN_RATIO};

    /// Text reflow model: height is inversely proportional to column width
    fn reflowing(left_area: f64, right_area: f64) -> impl FnMut(f64) -> Option<(f64, f64)> {
        move |ratio| Some((left_area / ratio, right_area / (1.0 - ratio)))
    }

    #[test]
    fn test_resize_is_clamped() {
        let gesture = ResizeGesture::new("r1", 100.0, 0.5, 500.0);

        // +200px on a 500px row would mean 0.9
        let ratio = gesture.ratio_at(300.0);
        assert!((ratio - 0.6666).abs() < 1e-3);
        assert_eq!(ratio, MAX_COLUMN_RATIO);

        assert_eq!(gesture.ratio_at(-1000.0), MIN_COLUMN_RATIO);
        assert!((gesture.ratio_at(150.0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_resize_zero_width_row_keeps_start() {
        let gesture = ResizeGesture::new("r1", 0.0, 0.4, 0.0);
        assert_eq!(gesture.ratio_at(50.0), 0.4);
    }

    #[test]
    fn test_balanced_columns_converge_immediately() {
        let report = equalize_with("r1", 0.5, &EqualizeConfig::default(), |_| Some((300.0, 310.0)));
        assert!(report.ratios.is_empty());
        assert_eq!(report.stop, EqualizeStop::Converged);
    }

    #[test]
    fn test_step_is_damped() {
        let mut run = EqualizeRun::new("r1", 0.5, EqualizeConfig::default());
        // target = 0.6, 70% of the way from 0.5
        match run.step(600.0, 400.0) {
            EqualizeStep::Apply { ratio } => assert!((ratio - 0.57).abs() < 1e-9),
            other => panic!("expected apply, got {other:?}"),
        }
        assert_eq!(run.iterations(), 1);
    }

    #[test]
    fn test_ratio_stays_in_equalize_bounds() {
        let config = EqualizeConfig::default();
        for (left, right) in [(5000.0, 10.0), (10.0, 5000.0), (900.0, 100.0), (120.0, 600.0)] {
            let report = equalize_with("r1", 0.5, &config, reflowing(left, right));
            assert!(report.ratios.len() <= config.max_iterations as usize);
            for ratio in &report.ratios {
                assert!(*ratio >= config.min_ratio && *ratio <= config.max_ratio, "{ratio}");
            }
        }
    }

    #[test]
    fn test_pinned_ratio_stalls() {
        let report = equalize_with("r1", 0.5, &EqualizeConfig::default(), |_| Some((1000.0, 1.0)));
        assert_eq!(report.ratios, vec![MAX_COLUMN_RATIO]);
        assert_eq!(report.stop, EqualizeStop::Stalled);
    }

    #[test]
    fn test_row_at_storable_bound_stalls_without_applying() {
        let mut run = EqualizeRun::new("r1", MAX_COLUMN_RATIO, EqualizeConfig::default());
        assert_eq!(
            run.step(1000.0, 1.0),
            EqualizeStep::Done {
                reason: EqualizeStop::Stalled
            }
        );
        assert_eq!(run.iterations(), 0);
    }

    #[test]
    fn test_sync_ratio_replaces_last_applied() {
        let mut run = EqualizeRun::new("r1", 0.5, EqualizeConfig::default());
        run.step(600.0, 400.0);
        run.sync_ratio(0.56);
        assert_eq!(run.last_ratio(), 0.56);
    }

    #[test]
    fn test_iteration_cap() {
        let config = EqualizeConfig {
            damping: 0.1,
            ..EqualizeConfig::default()
        };
        let report = equalize_with("r1", 0.5, &config, |_| Some((600.0, 400.0)));
        assert_eq!(report.ratios.len(), 4);
        assert_eq!(report.stop, EqualizeStop::MaxIterations);
    }

    #[test]
    fn test_unmeasurable_row() {
        let report = equalize_with("r1", 0.5, &EqualizeConfig::default(), |_| None);
        assert_eq!(report.stop, EqualizeStop::Unmeasurable);

        let mut run = EqualizeRun::new("r1", 0.5, EqualizeConfig::default());
        assert_eq!(
            run.step(0.0, 0.0),
            EqualizeStep::Done {
                reason: EqualizeStop::Unmeasurable
            }
        );
    }

    #[test]
    fn test_waits_frames_between_measurements() {
        let mut run = EqualizeRun::new("r1", 0.5, EqualizeConfig::default());
        assert!(run.on_frame());
        run.step(600.0, 400.0);
        assert!(!run.on_frame());
        assert!(run.on_frame());
    }
}
