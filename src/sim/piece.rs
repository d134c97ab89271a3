//! Kinematic pieces
//!
//! A piece is a symbol lifted off the reels for the duration of one
//! reshuffle. Free pieces orbit the grid center as "debris"; directed pieces
//! keep orbiting while they hunt for their destination, and every piece
//! finishes with a falling/settling tween into its cell.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::grid::SymbolicElement;
use crate::presentation::{Presentation, TrailHandle};
use crate::settings::{HomingParams, OrbitParams};
use crate::{cartesian_to_polar, normalize_angle, polar_to_cartesian};

/// Piece identifier (index into the state machine's piece list)
pub type PieceId = u32;

/// Falling/settling tween from the orbit into a cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropTween {
    pub from: Vec2,
    pub to: Vec2,
    pub elapsed: f32,
    pub duration: f32,
}

impl DropTween {
    pub fn new(from: Vec2, to: Vec2, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    /// Linear progress in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).min(1.0)
        }
    }

    pub fn position(&self) -> Vec2 {
        self.from.lerp(self.to, ease_out_bounce(self.progress()))
    }

    pub fn is_done(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Bounce easing: overshoots into the cell and settles
pub fn ease_out_bounce(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    let t = t.clamp(0.0, 1.0);
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    }
}

/// Motion state of a piece
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    /// Free orbit (possibly still waiting out its hold)
    Orbit,
    /// Reached its destination; parked until its landing is called
    Arrived,
    /// Falling into its cell
    Dropping(DropTween),
    /// Settled; inert until the run is cleared
    Landed,
}

/// Something a step wants the state machine to know about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceEvent {
    /// Hold delay expired; the piece joined the orbit
    Released,
    /// Directed piece reached its destination (`forced` if by deadline)
    Arrived { forced: bool },
    /// Drop tween finished
    Settled,
}

/// Transient per-symbol animation state
#[derive(Debug)]
pub struct KinematicPiece {
    pub id: PieceId,
    pub name: String,
    /// Cell the piece was picked up from
    pub origin: (usize, usize),
    /// Variant-tagged symbol
    pub variant: bool,
    pub pos: Vec2,
    /// Distance from the orbit center
    pub radius: f32,
    /// Angle around the orbit center (radians)
    pub theta: f32,
    /// Current angular speed (radians/sec)
    pub angular_speed: f32,
    /// Seconds spent in free orbit
    pub elapsed: f32,
    /// Wait before the piece starts moving
    pub hold: f32,
    pub destination: Option<Vec2>,
    /// Released into directed flight
    pub homing: bool,
    /// Seconds spent hunting for the destination
    pub search_elapsed: f32,
    /// Arrival came from the deadline, not from convergence
    pub forced: bool,
    pub motion: Motion,
    element: Option<SymbolicElement>,
    trail: Option<TrailHandle>,
}

impl KinematicPiece {
    /// Lift an element off the grid into orbit
    #[allow(clippy::too_many_arguments)]
    pub fn pickup<R: Rng>(
        id: PieceId,
        element: SymbolicElement,
        origin: (usize, usize),
        pos: Vec2,
        variant: bool,
        hold: f32,
        params: &OrbitParams,
        rng: &mut R,
    ) -> Self {
        let (radius, theta) = cartesian_to_polar(pos - params.center);
        let lo = params.min_angular_speed.min(params.start_angular_speed);
        let hi = params.min_angular_speed.max(params.start_angular_speed);
        let angular_speed = if hi > lo {
            rng.random_range(lo..=hi)
        } else {
            lo
        };
        Self {
            id,
            name: element.name.clone(),
            origin,
            variant,
            pos,
            radius,
            theta,
            angular_speed,
            elapsed: 0.0,
            hold: hold.max(0.0),
            destination: None,
            homing: false,
            search_elapsed: 0.0,
            forced: false,
            motion: Motion::Orbit,
            element: Some(element),
            trail: None,
        }
    }

    pub fn attach_trail(&mut self, trail: Option<TrailHandle>) {
        self.trail = trail;
    }

    pub fn has_trail(&self) -> bool {
        self.trail.is_some()
    }

    /// Release the trail effect, if any. Safe to call more than once.
    pub fn release_trail<P: Presentation + ?Sized>(&mut self, fx: &mut P) {
        if let Some(handle) = self.trail.take() {
            fx.release_trail(handle);
        }
    }

    /// Hand the element back for placement (only once)
    pub fn take_element(&mut self) -> Option<SymbolicElement> {
        self.element.take()
    }

    pub fn is_holding(&self) -> bool {
        self.hold > 0.0 && self.motion == Motion::Orbit
    }

    pub fn has_destination(&self) -> bool {
        self.destination.is_some()
    }

    pub fn is_arrived(&self) -> bool {
        self.motion == Motion::Arrived
    }

    pub fn is_dropping(&self) -> bool {
        matches!(self.motion, Motion::Dropping(_))
    }

    pub fn is_landed(&self) -> bool {
        self.motion == Motion::Landed
    }

    /// Mark the piece destined without changing its motion yet
    pub fn assign_destination(&mut self, destination: Vec2) {
        self.destination = Some(destination);
    }

    /// Switch from free orbit to directed flight
    pub fn begin_homing(&mut self) {
        if self.destination.is_some() {
            self.homing = true;
            self.search_elapsed = 0.0;
        }
    }

    /// Collapse any remaining hold. Returns true if a hold was cut short.
    pub fn skip_hold(&mut self) -> bool {
        if !self.is_holding() {
            return false;
        }
        self.hold = 0.0;
        true
    }

    /// Start the falling/settling tween into a cell
    pub fn start_drop(&mut self, to: Vec2, duration: f32) {
        self.motion = Motion::Dropping(DropTween::new(self.pos, to, duration));
    }

    /// Advance one fixed step
    pub fn step(
        &mut self,
        dt: f32,
        orbit: &OrbitParams,
        homing: &HomingParams,
    ) -> Option<PieceEvent> {
        match self.motion {
            Motion::Arrived | Motion::Landed => None,
            Motion::Dropping(mut tween) => {
                tween.elapsed += dt;
                self.pos = tween.position();
                if tween.is_done() {
                    self.pos = tween.to;
                    self.motion = Motion::Landed;
                    Some(PieceEvent::Settled)
                } else {
                    self.motion = Motion::Dropping(tween);
                    None
                }
            }
            Motion::Orbit => {
                if self.hold > 0.0 {
                    self.hold -= dt;
                    if self.hold <= 0.0 {
                        self.hold = 0.0;
                        return Some(PieceEvent::Released);
                    }
                    return None;
                }

                self.orbit(dt, orbit);

                if !self.homing {
                    return None;
                }
                let dest = self.destination?;
                self.search_elapsed += dt;
                if self.pos.distance(dest) <= homing.tolerance {
                    self.arrive(dest, false);
                    Some(PieceEvent::Arrived { forced: false })
                } else if self.search_elapsed >= homing.max_search_time {
                    self.arrive(dest, true);
                    Some(PieceEvent::Arrived { forced: true })
                } else {
                    None
                }
            }
        }
    }

    /// Free-orbit update: drift toward a ring, spin up, then ease off
    fn orbit(&mut self, dt: f32, params: &OrbitParams) {
        self.elapsed += dt;

        // Free pieces sink toward the inner ring; homing pieces migrate to
        // the ring their destination sits on.
        let ring = match (self.homing, self.destination) {
            (true, Some(dest)) => (dest - params.center).length(),
            _ => params.inner_radius,
        };
        let max_step = params.radial_speed * dt;
        self.radius += (ring - self.radius).clamp(-max_step, max_step);

        if self.elapsed < params.decel_after {
            self.angular_speed =
                (self.angular_speed + params.angular_accel * dt).min(params.max_angular_speed);
        } else {
            // Late pieces must not outrun the ones already circling
            self.angular_speed =
                (self.angular_speed - params.angular_decel * dt).max(params.min_angular_speed);
        }

        self.theta = normalize_angle(self.theta + self.angular_speed * dt);
        self.pos = params.center + polar_to_cartesian(self.radius, self.theta);
    }

    fn arrive(&mut self, dest: Vec2, forced: bool) {
        self.pos = dest;
        self.forced = forced;
        self.motion = Motion::Arrived;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::presentation::LoggedPresentation;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn piece_at(pos: Vec2, hold: f32, seed: u64) -> KinematicPiece {
        let mut rng = Pcg32::seed_from_u64(seed);
        KinematicPiece::pickup(
            0,
            SymbolicElement::new("A"),
            (0, 0),
            pos,
            false,
            hold,
            &OrbitParams::default(),
            &mut rng,
        )
    }

    #[test]
    fn test_hold_delays_motion() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        let start = Vec2::new(150.0, 0.0);
        let mut piece = piece_at(start, 0.1, 1);
        assert!(piece.is_holding());

        let mut released = false;
        for _ in 0..24 {
            if piece.step(SIM_DT, &orbit, &homing) == Some(PieceEvent::Released) {
                released = true;
                break;
            }
            assert_eq!(piece.pos, start);
        }
        assert!(released);
        piece.step(SIM_DT, &orbit, &homing);
        assert_ne!(piece.pos, start);
    }

    #[test]
    fn test_orbit_drifts_inward_and_caps_speed() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        let mut piece = piece_at(Vec2::new(300.0, 0.0), 0.0, 2);
        let start_radius = piece.radius;

        let mut peak: f32 = 0.0;
        for _ in 0..240 {
            piece.step(SIM_DT, &orbit, &homing);
            peak = peak.max(piece.angular_speed);
        }
        assert!(piece.radius < start_radius);
        assert!(piece.radius >= orbit.inner_radius - 1e-3);
        assert!(peak <= orbit.max_angular_speed + 1e-4);
    }

    #[test]
    fn test_orbit_decelerates_after_threshold() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        let mut piece = piece_at(Vec2::new(100.0, 0.0), 0.0, 3);
        let steps = (orbit.decel_after / SIM_DT) as usize;
        for _ in 0..steps {
            piece.step(SIM_DT, &orbit, &homing);
        }
        let before = piece.angular_speed;
        for _ in 0..120 {
            piece.step(SIM_DT, &orbit, &homing);
        }
        assert!(piece.angular_speed < before);
        assert!(piece.angular_speed >= orbit.min_angular_speed);
    }

    #[test]
    fn test_homing_arrives_within_deadline() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        for seed in 0..64u64 {
            let start = polar_to_cartesian(80.0 + seed as f32 * 3.0, seed as f32 * 0.7);
            let mut piece = piece_at(start, 0.0, seed);
            piece.assign_destination(Vec2::new(-210.0, 95.0));
            piece.begin_homing();

            let mut arrived = None;
            let max_steps = (homing.max_search_time / SIM_DT) as usize + 2;
            for _ in 0..max_steps {
                if let Some(PieceEvent::Arrived { forced }) = piece.step(SIM_DT, &orbit, &homing) {
                    arrived = Some(forced);
                    break;
                }
            }
            assert!(arrived.is_some(), "seed {seed} never arrived");
            assert!(piece.search_elapsed <= homing.max_search_time + SIM_DT + 1e-4);
            assert_eq!(piece.pos, Vec2::new(-210.0, 95.0));
            assert!(piece.is_arrived());
        }
    }

    #[test]
    fn test_homing_on_path_converges_without_force() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        // Already on the destination ring, destination a little ahead
        let ring = orbit.inner_radius;
        let mut piece = piece_at(polar_to_cartesian(ring, 0.0), 0.0, 4);
        piece.assign_destination(polar_to_cartesian(ring, 0.5));
        piece.begin_homing();

        let mut event = None;
        for _ in 0..240 {
            event = piece.step(SIM_DT, &orbit, &homing);
            if event.is_some() {
                break;
            }
        }
        assert_eq!(event, Some(PieceEvent::Arrived { forced: false }));
        assert!(!piece.forced);
    }

    #[test]
    fn test_skip_hold_reports_collapse_once() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        let mut piece = piece_at(Vec2::new(150.0, 0.0), 0.5, 2);
        assert!(piece.skip_hold());
        assert!(!piece.is_holding());
        assert!(!piece.skip_hold());

        // Already released, so the next step orbits instead of re-releasing
        assert_eq!(piece.step(SIM_DT, &orbit, &homing), None);
        assert_ne!(piece.pos, Vec2::new(150.0, 0.0));
    }

    #[test]
    fn test_begin_homing_requires_destination() {
        let mut piece = piece_at(Vec2::new(50.0, 0.0), 0.0, 5);
        piece.begin_homing();
        assert!(!piece.homing);

        piece.assign_destination(Vec2::new(0.0, 120.0));
        assert!(piece.has_destination());
        piece.begin_homing();
        assert!(piece.homing);
    }

    #[test]
    fn test_trail_released_once() {
        let mut fx = LoggedPresentation::new();
        let mut piece = piece_at(Vec2::ZERO, 0.0, 8);
        piece.attach_trail(fx.spawn_trail("A"));
        assert!(piece.has_trail());

        piece.release_trail(&mut fx);
        piece.release_trail(&mut fx);
        assert!(!piece.has_trail());
        assert_eq!(fx.released_trails(), 1);
        assert_eq!(fx.live_trails(), 0);
    }

    #[test]
    fn test_drop_tween_settles_on_target() {
        let orbit = OrbitParams::default();
        let homing = HomingParams::default();
        let mut piece = piece_at(Vec2::new(100.0, 100.0), 0.0, 6);
        let target = Vec2::new(-140.0, 120.0);
        piece.start_drop(target, 0.2);
        assert!(piece.is_dropping());

        let mut settled = false;
        for _ in 0..30 {
            if piece.step(SIM_DT, &orbit, &homing) == Some(PieceEvent::Settled) {
                settled = true;
                break;
            }
        }
        assert!(settled);
        assert!(piece.is_landed());
        assert_eq!(piece.pos, target);
    }

    #[test]
    fn test_element_taken_once() {
        let mut piece = piece_at(Vec2::ZERO, 0.0, 7);
        assert_eq!(piece.take_element().unwrap().name, "A");
        assert!(piece.take_element().is_none());
    }

    #[test]
    fn test_ease_out_bounce_endpoints() {
        assert_eq!(ease_out_bounce(0.0), 0.0);
        assert!((ease_out_bounce(1.0) - 1.0).abs() < 1e-6);
        assert!(ease_out_bounce(0.5) > 0.5);
    }
}
