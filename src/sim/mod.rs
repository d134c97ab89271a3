//! Deterministic reshuffle simulation
//!
//! All reshuffle logic lives here. This module must stay deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (column-major cells, pieces by id)
//! - No rendering or platform dependencies

pub mod layout;
pub mod machine;
pub mod matcher;
pub mod piece;

pub use layout::FinalLayout;
pub use machine::{Landing, MoveStage, ReshufflePhase, ReshuffleReport, ReshuffleStateMachine};
pub use matcher::LandingMatcher;
pub use piece::{DropTween, KinematicPiece, Motion, PieceEvent, PieceId, ease_out_bounce};
