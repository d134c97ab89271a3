#![allow(dead_code)]

use reel_reshuffle::consts::SIM_DT;
use reel_reshuffle::sim::{FinalLayout, ReshufflePhase, ReshuffleStateMachine};
use reel_reshuffle::{LoggedPresentation, VecGrid};

/// Upper bound on ticks for any run in these tests (60 simulated seconds)
pub const MAX_TICKS: usize = 120 * 60;

pub fn columns(raw: &[&[&str]]) -> Vec<Vec<String>> {
    raw.iter()
        .map(|c| c.iter().map(|s| s.to_string()).collect())
        .collect()
}

pub fn layout(raw: &[&[&str]]) -> FinalLayout {
    FinalLayout::new(columns(raw)).unwrap()
}

pub fn grid(raw: &[&[&str]]) -> VecGrid {
    VecGrid::from_columns(&columns(raw))
}

/// Tick until RESTING; returns the number of ticks taken
pub fn run_to_rest(
    machine: &mut ReshuffleStateMachine,
    grid: &mut VecGrid,
    fx: &mut LoggedPresentation,
) -> usize {
    for i in 0..MAX_TICKS {
        if machine.tick(grid, fx, SIM_DT) == ReshufflePhase::Resting {
            return i + 1;
        }
    }
    panic!("reshuffle did not reach RESTING in {MAX_TICKS} ticks");
}

/// Tick until `pred` holds for the current phase
pub fn run_until(
    machine: &mut ReshuffleStateMachine,
    grid: &mut VecGrid,
    fx: &mut LoggedPresentation,
    pred: impl Fn(ReshufflePhase) -> bool,
) {
    for _ in 0..MAX_TICKS {
        if pred(machine.tick(grid, fx, SIM_DT)) {
            return;
        }
    }
    panic!("phase condition never reached");
}

pub fn assert_grid_matches(grid: &VecGrid, layout: &FinalLayout) {
    assert!(grid.is_fully_populated());
    for (column, row, name) in layout.column_major() {
        assert_eq!(
            grid.element(column, row).map(|e| e.name.as_str()),
            Some(name),
            "cell ({column}, {row})"
        );
    }
}

/// Column-major cell list, optionally skipping some
pub fn column_major_cells(columns: usize, rows: usize, skip: &[(usize, usize)]) -> Vec<(usize, usize)> {
    (0..columns)
        .flat_map(|c| (0..rows).map(move |r| (c, r)))
        .filter(|cell| !skip.contains(cell))
        .collect()
}
