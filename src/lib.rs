//! Reel Reshuffle - orbiting symbols that settle onto a server layout
//!
//! Core modules:
//! - `sim`: Deterministic reshuffle simulation (pieces, matching, state machine)
//! - `grid`: Reel grid interface consumed by the simulation
//! - `presentation`: Audio/effect collaborators (fire-and-forget)
//! - `rollup`: Outcome display and payout rollup
//! - `engine`: Round-facing facade that sequences a whole reshuffle
//! - `settings`: Data-driven timings and kinematics

pub mod engine;
pub mod error;
pub mod grid;
pub mod presentation;
pub mod rollup;
pub mod settings;
pub mod sim;

pub use engine::{EngineStatus, HookPoint, ReconciledOutcome, ReshuffleEngine, RoundOutcome};
pub use error::{Fault, ReshuffleError};
pub use grid::{CellView, ReelGrid, SymbolicElement, VecGrid};
pub use presentation::{Cue, LoggedPresentation, Presentation, TrailHandle};
pub use rollup::{OutcomeDisplay, RollupMeter};
pub use settings::{ColumnOrder, PacingPreset, ReshuffleSettings};

use glam::Vec2;

/// Engine configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz, same cadence as the reel tick)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Default reel grid dimensions
    pub const DEFAULT_COLUMNS: usize = 5;
    pub const DEFAULT_ROWS: usize = 3;
    /// Spacing between cell centers (pixels)
    pub const CELL_WIDTH: f32 = 140.0;
    pub const CELL_HEIGHT: f32 = 120.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_normalize_angle_wraps() {
        assert!((normalize_angle(3.0 * PI) - (-PI)).abs() < 1e-4);
        assert!((normalize_angle(-3.5 * PI) - (0.5 * PI)).abs() < 1e-4);
        assert_eq!(normalize_angle(0.25), 0.25);
    }

    #[test]
    fn test_polar_roundtrip() {
        let p = polar_to_cartesian(120.0, 0.75);
        let (r, theta) = cartesian_to_polar(p);
        assert!((r - 120.0).abs() < 1e-3);
        assert!((theta - 0.75).abs() < 1e-4);
    }
}
