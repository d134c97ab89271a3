//! Reshuffle engine facade
//!
//! Entry point for the round controller. A run clears whatever outcome is on
//! screen, plays the entrance, drives the state machine to RESTING, applies
//! the reconciled outcome and waits for its rollup to finish.

use serde::{Deserialize, Serialize};

use crate::error::ReshuffleError;
use crate::grid::ReelGrid;
use crate::presentation::{Cue, Presentation};
use crate::rollup::OutcomeDisplay;
use crate::settings::ReshuffleSettings;
use crate::sim::{FinalLayout, ReshufflePhase, ReshuffleReport, ReshuffleStateMachine};

/// Where in the round presentation the engine is being asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookPoint {
    /// Before any sub-outcome (payline) has been shown
    BeforeOutcomeDisplay,
    /// After the base round's sub-outcomes were shown
    AfterOutcomeDisplay,
}

/// Round outcome as delivered by the server outcome parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Reshuffled layout, server column order; empty when no reshuffle
    #[serde(default)]
    pub reshuffled_layout: Vec<Vec<String>>,
    /// Payout for the reshuffled grid
    #[serde(default)]
    pub win_amount: u64,
    /// Whether sub-outcomes have already been displayed this round
    #[serde(default)]
    pub sub_outcomes_displayed: bool,
}

/// Outcome handed to the display once the grid has settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledOutcome {
    pub layout: FinalLayout,
    pub win_amount: u64,
}

/// Result of an engine tick
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    Idle,
    Running,
    /// Grid settled and rollup done; control returns to the round
    Finished(ReshuffleReport),
}

#[derive(Debug)]
enum Task {
    Idle,
    ClearOutcome,
    Entrance { remaining: f32 },
    Reshuffling,
    ApplyOutcome,
    AwaitRollup,
}

/// Round-facing reshuffle entry point
#[derive(Debug)]
pub struct ReshuffleEngine {
    machine: ReshuffleStateMachine,
    task: Task,
    pending: Option<ReconciledOutcome>,
    report: Option<ReshuffleReport>,
    auto_mode: bool,
    skip: bool,
    cancelled: bool,
}

impl ReshuffleEngine {
    pub fn new(settings: ReshuffleSettings) -> Self {
        Self {
            machine: ReshuffleStateMachine::new(settings),
            task: Task::Idle,
            pending: None,
            report: None,
            auto_mode: false,
            skip: false,
            cancelled: false,
        }
    }

    pub fn settings(&self) -> &ReshuffleSettings {
        self.machine.settings()
    }

    pub fn machine(&self) -> &ReshuffleStateMachine {
        &self.machine
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.task, Task::Idle)
    }

    pub fn phase(&self) -> ReshufflePhase {
        self.machine.phase()
    }

    /// Whether this round needs a reshuffle at `hook`.
    ///
    /// The two hook points are mutually exclusive for a given outcome: the
    /// reshuffle runs before sub-outcomes are displayed or after, never both.
    pub fn needs_reshuffle(&self, outcome: &RoundOutcome, hook: HookPoint) -> bool {
        let has_layout = outcome.reshuffled_layout.iter().any(|col| !col.is_empty());
        has_layout
            && match hook {
                HookPoint::BeforeOutcomeDisplay => !outcome.sub_outcomes_displayed,
                HookPoint::AfterOutcomeDisplay => outcome.sub_outcomes_displayed,
            }
    }

    /// Start a run. Rejected while a previous run is still in progress.
    pub fn begin<G: ReelGrid + ?Sized>(
        &mut self,
        outcome: &RoundOutcome,
        grid: &G,
        auto_mode: bool,
    ) -> Result<(), ReshuffleError> {
        if !self.is_idle() || !self.machine.is_resting() {
            return Err(ReshuffleError::AlreadyRunning {
                phase: self.machine.phase(),
            });
        }
        let layout = FinalLayout::from_server_columns(
            outcome.reshuffled_layout.clone(),
            self.settings().server_column_order,
        )?;
        if layout.columns() != grid.columns() || layout.rows() != grid.rows() {
            return Err(ReshuffleError::LayoutShape {
                layout_columns: layout.columns(),
                layout_rows: layout.rows(),
                grid_columns: grid.columns(),
                grid_rows: grid.rows(),
            });
        }

        log::info!("Reshuffle run queued (win {})", outcome.win_amount);
        self.pending = Some(ReconciledOutcome {
            layout,
            win_amount: outcome.win_amount,
        });
        self.report = None;
        self.auto_mode = auto_mode;
        self.skip = false;
        self.cancelled = false;
        self.task = Task::ClearOutcome;
        Ok(())
    }

    /// Collapse remaining variable waits (entrance, holds, delays)
    pub fn request_skip(&mut self) {
        if !self.is_idle() {
            self.skip = true;
            self.machine.request_skip();
        }
    }

    /// Finish the current run without further animation. A cancel issued
    /// before the state machine starts is forwarded once it does.
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            self.skip = true;
            self.cancelled = true;
            self.machine.cancel();
        }
    }

    /// Advance the run by one step
    pub fn tick<G, D, P>(
        &mut self,
        grid: &mut G,
        display: &mut D,
        fx: &mut P,
        dt: f32,
    ) -> EngineStatus
    where
        G: ReelGrid + ?Sized,
        D: OutcomeDisplay + ?Sized,
        P: Presentation + ?Sized,
    {
        loop {
            let task = std::mem::replace(&mut self.task, Task::Idle);
            let (next, done) = match task {
                Task::Idle => return EngineStatus::Idle,
                Task::ClearOutcome => {
                    display.clear_current_outcome();
                    fx.play(Cue::ReshuffleIntro, None);
                    fx.camera_shake(self.settings().camera_shake);
                    let remaining = self.settings().paced(self.settings().entrance_duration);
                    (Task::Entrance { remaining }, false)
                }
                Task::Entrance { mut remaining } => {
                    remaining -= dt;
                    if remaining > 0.0 && !self.skip {
                        self.task = Task::Entrance { remaining };
                        return EngineStatus::Running;
                    }
                    self.start_machine(&*grid)
                }
                Task::Reshuffling => {
                    if self.machine.tick(grid, fx, dt) != ReshufflePhase::Resting {
                        self.task = Task::Reshuffling;
                        return EngineStatus::Running;
                    }
                    self.report = self.machine.take_report();
                    (Task::ApplyOutcome, false)
                }
                Task::ApplyOutcome => {
                    let started = match self.pending.as_ref() {
                        Some(outcome) => display.apply_outcome(outcome, self.auto_mode),
                        None => false,
                    };
                    if started {
                        (Task::AwaitRollup, false)
                    } else {
                        (Task::Idle, true)
                    }
                }
                Task::AwaitRollup => {
                    if display.is_rollup_running() {
                        self.task = Task::AwaitRollup;
                        return EngineStatus::Running;
                    }
                    (Task::Idle, true)
                }
            };

            self.task = next;
            if done {
                self.pending = None;
                let report = self.report.take().unwrap_or_default();
                log::info!(
                    "Reshuffle run complete ({} landings, {} faults)",
                    report.landings.len(),
                    report.faults.len()
                );
                return EngineStatus::Finished(report);
            }
        }
    }

    fn start_machine<G: ReelGrid + ?Sized>(&mut self, grid: &G) -> (Task, bool) {
        let Some(layout) = self.pending.as_ref().map(|o| o.layout.clone()) else {
            return (Task::ApplyOutcome, false);
        };
        match self.machine.start(layout, grid) {
            Ok(()) => {
                if self.skip {
                    self.machine.request_skip();
                }
                if self.cancelled {
                    self.machine.cancel();
                }
                (Task::Reshuffling, false)
            }
            Err(err) => {
                // Payout still comes from the layout even if the visuals fail
                log::error!("Reshuffle could not start: {err}");
                (Task::ApplyOutcome, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::grid::VecGrid;
    use crate::presentation::LoggedPresentation;
    use crate::rollup::RollupMeter;

    fn outcome(columns: &[&[&str]], win: u64, displayed: bool) -> RoundOutcome {
        RoundOutcome {
            reshuffled_layout: columns
                .iter()
                .map(|c| c.iter().map(|s| s.to_string()).collect())
                .collect(),
            win_amount: win,
            sub_outcomes_displayed: displayed,
        }
    }

    #[test]
    fn test_hook_points_are_exclusive() {
        let engine = ReshuffleEngine::new(ReshuffleSettings::default());
        let before = outcome(&[&["A"]], 0, false);
        let after = outcome(&[&["A"]], 0, true);
        let empty = outcome(&[], 0, false);

        assert!(engine.needs_reshuffle(&before, HookPoint::BeforeOutcomeDisplay));
        assert!(!engine.needs_reshuffle(&before, HookPoint::AfterOutcomeDisplay));
        assert!(engine.needs_reshuffle(&after, HookPoint::AfterOutcomeDisplay));
        assert!(!engine.needs_reshuffle(&after, HookPoint::BeforeOutcomeDisplay));
        assert!(!engine.needs_reshuffle(&empty, HookPoint::BeforeOutcomeDisplay));
    }

    #[test]
    fn test_cancel_during_entrance_places_without_animation() {
        let mut settings = ReshuffleSettings::default();
        settings.server_column_order = crate::settings::ColumnOrder::TopDown;
        let mut engine = ReshuffleEngine::new(settings);
        let mut grid = VecGrid::from_columns(&[vec!["A", "B"], vec!["C", "A"]]);
        let mut meter = RollupMeter::new(100.0, false);
        let mut fx = LoggedPresentation::new();

        let round = outcome(&[&["A", "A"], &["B", "C"]], 0, false);
        engine.begin(&round, &grid, false).unwrap();
        assert_eq!(
            engine.tick(&mut grid, &mut meter, &mut fx, SIM_DT),
            EngineStatus::Running
        );
        assert!(engine.machine().is_resting());
        engine.cancel();

        let mut finished = None;
        for _ in 0..5000 {
            if let EngineStatus::Finished(report) =
                engine.tick(&mut grid, &mut meter, &mut fx, SIM_DT)
            {
                finished = Some(report);
                break;
            }
        }

        let report = finished.expect("engine never finished");
        assert!(report.cancelled);
        assert!(report.landings.is_empty());
        assert_eq!(report.placed_without_animation.len(), 4);
        assert_eq!(grid.element(0, 1).unwrap().name, "A");
        assert_eq!(grid.element(1, 0).unwrap().name, "B");
        assert_eq!(fx.count(Cue::Pickup), 0);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_run_waits_for_rollup() {
        let mut settings = ReshuffleSettings::default();
        settings.server_column_order = crate::settings::ColumnOrder::TopDown;
        settings.instant_rollup_in_auto = false;
        settings.rollup_rate = 100.0;
        let mut engine = ReshuffleEngine::new(settings);
        let mut grid = VecGrid::from_columns(&[vec!["A", "B"], vec!["C", "A"]]);
        let mut meter = RollupMeter::new(100.0, false);
        let mut fx = LoggedPresentation::new();

        let round = outcome(&[&["A", "A"], &["B", "C"]], 50, false);
        engine.begin(&round, &grid, false).unwrap();
        assert!(engine.begin(&round, &grid, false).is_err());

        let mut finished = None;
        let mut settled_before_rollup_done = false;
        for _ in 0..5000 {
            meter.advance(SIM_DT);
            match engine.tick(&mut grid, &mut meter, &mut fx, SIM_DT) {
                EngineStatus::Finished(report) => {
                    finished = Some(report);
                    break;
                }
                EngineStatus::Running => {
                    if engine.machine().is_resting() && meter.is_rollup_running() {
                        settled_before_rollup_done = true;
                    }
                }
                EngineStatus::Idle => panic!("engine went idle without finishing"),
            }
        }

        let report = finished.expect("engine never finished");
        assert_eq!(report.landings.len(), 4);
        assert!(settled_before_rollup_done);
        assert!(!meter.is_rollup_running());
        assert_eq!(meter.total(), 50);
        assert_eq!(grid.element(0, 1).unwrap().name, "A");
        assert_eq!(grid.element(1, 1).unwrap().name, "C");
        assert!(engine.is_idle());
        assert_eq!(fx.first(Cue::ReshuffleIntro), Some(0));
    }
}
