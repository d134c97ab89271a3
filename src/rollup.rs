//! Outcome display and payout rollup
//!
//! The reshuffle hands the reconciled outcome to this subsystem and waits
//! while it counts the payout up.

use serde::{Deserialize, Serialize};

use crate::engine::ReconciledOutcome;
use crate::settings::ReshuffleSettings;

/// Outcome display consumed by the engine
pub trait OutcomeDisplay {
    /// Remove whatever outcome is currently on screen
    fn clear_current_outcome(&mut self);

    /// Show the reconciled outcome. Returns true if a rollup animation started.
    fn apply_outcome(&mut self, outcome: &ReconciledOutcome, auto_mode: bool) -> bool;

    fn is_rollup_running(&self) -> bool;
}

/// Running payout total that counts up toward each applied win
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollupMeter {
    /// Total shown on the meter
    pub displayed: f64,
    /// Total the meter is counting toward
    pub target: u64,
    /// Units per second
    pub rate: f32,
    /// Jump straight to the target in auto mode
    pub instant_in_auto: bool,
    /// Outcomes applied so far
    pub applied: u32,
    /// Whether an outcome is currently on screen
    pub showing: bool,
}

impl RollupMeter {
    pub fn new(rate: f32, instant_in_auto: bool) -> Self {
        Self {
            displayed: 0.0,
            target: 0,
            rate,
            instant_in_auto,
            applied: 0,
            showing: false,
        }
    }

    /// Meter configured from reshuffle settings
    pub fn from_settings(settings: &ReshuffleSettings) -> Self {
        Self::new(settings.rollup_rate, settings.instant_rollup_in_auto)
    }

    /// Advance the count-up animation
    pub fn advance(&mut self, dt: f32) {
        let target = self.target as f64;
        if self.displayed < target {
            self.displayed = (self.displayed + self.rate as f64 * dt as f64).min(target);
        }
    }

    /// Finish the count-up immediately
    pub fn skip(&mut self) {
        self.displayed = self.target as f64;
    }

    pub fn total(&self) -> u64 {
        self.target
    }
}

impl OutcomeDisplay for RollupMeter {
    fn clear_current_outcome(&mut self) {
        self.showing = false;
    }

    fn apply_outcome(&mut self, outcome: &ReconciledOutcome, auto_mode: bool) -> bool {
        self.showing = true;
        self.applied += 1;
        if outcome.win_amount == 0 {
            return false;
        }
        self.target += outcome.win_amount;
        if (auto_mode && self.instant_in_auto) || self.rate <= 0.0 {
            self.skip();
            return false;
        }
        log::info!(
            "Rollup {} -> {} at {}/s",
            self.displayed as u64,
            self.target,
            self.rate
        );
        true
    }

    fn is_rollup_running(&self) -> bool {
        self.displayed < self.target as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FinalLayout;

    fn outcome(win: u64) -> ReconciledOutcome {
        ReconciledOutcome {
            layout: FinalLayout::new(vec![vec!["A".to_string()]]).unwrap(),
            win_amount: win,
        }
    }

    #[test]
    fn test_rollup_counts_up() {
        let mut meter = RollupMeter::new(100.0, true);
        assert!(meter.apply_outcome(&outcome(50), false));
        assert!(meter.is_rollup_running());
        meter.advance(0.25);
        assert!((meter.displayed - 25.0).abs() < 1e-6);
        meter.advance(1.0);
        assert!(!meter.is_rollup_running());
        assert_eq!(meter.displayed, 50.0);
    }

    #[test]
    fn test_auto_mode_is_instant() {
        let mut meter = RollupMeter::new(100.0, true);
        assert!(!meter.apply_outcome(&outcome(80), true));
        assert!(!meter.is_rollup_running());
        assert_eq!(meter.total(), 80);
    }

    #[test]
    fn test_zero_win_does_not_roll() {
        let mut meter = RollupMeter::new(100.0, false);
        assert!(!meter.apply_outcome(&outcome(0), false));
        assert_eq!(meter.applied, 1);
        assert!(meter.showing);
        meter.clear_current_outcome();
        assert!(!meter.showing);
    }
}
