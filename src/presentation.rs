//! Presentation collaborators
//!
//! Audio cues, camera shake and trailing particle effects. The reshuffle
//! fires these and never waits on them.

use serde::{Deserialize, Serialize};

/// Presentation cue types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    /// Reshuffle entrance sting
    ReshuffleIntro,
    /// Symbols lift off the reels
    Pickup,
    /// A variant piece leaves its hold and joins the orbit
    VariantRelease,
    /// A directed piece was given its destination
    HomingStart,
    /// A piece landed in its cell
    Land,
    /// A directed piece landed in its cell
    DirectedLand,
    /// All cells settled
    Settle,
}

/// Handle to a trailing effect attached to a piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrailHandle(pub u32);

/// Fire-and-forget presentation sink
pub trait Presentation {
    /// Play a cue, optionally keyed by symbol name
    fn play(&mut self, cue: Cue, symbol: Option<&str>);

    fn camera_shake(&mut self, _strength: f32) {}

    /// Attach a trail to a piece; `None` if effects are disabled
    fn spawn_trail(&mut self, _symbol: &str) -> Option<TrailHandle> {
        None
    }

    fn release_trail(&mut self, _handle: TrailHandle) {}

    /// Drop every transient effect still alive
    fn clear_effects(&mut self) {}
}

/// Presentation that logs cues and tracks live trails
#[derive(Debug, Default)]
pub struct LoggedPresentation {
    next_trail: u32,
    live_trails: Vec<TrailHandle>,
    spawned: u32,
    released: u32,
    /// Every cue played, in order
    pub cues: Vec<(Cue, Option<String>)>,
    /// Spawn trail effects; off by default for low-effects hosts
    pub trails_enabled: bool,
}

impl LoggedPresentation {
    pub fn new() -> Self {
        Self {
            trails_enabled: true,
            ..Self::default()
        }
    }

    pub fn live_trails(&self) -> usize {
        self.live_trails.len()
    }

    pub fn spawned_trails(&self) -> u32 {
        self.spawned
    }

    pub fn released_trails(&self) -> u32 {
        self.released
    }

    /// Number of times `cue` was played
    pub fn count(&self, cue: Cue) -> usize {
        self.cues.iter().filter(|(c, _)| *c == cue).count()
    }

    /// Index of the first occurrence of `cue`
    pub fn first(&self, cue: Cue) -> Option<usize> {
        self.cues.iter().position(|(c, _)| *c == cue)
    }

    /// Index of the last occurrence of `cue`
    pub fn last(&self, cue: Cue) -> Option<usize> {
        self.cues.iter().rposition(|(c, _)| *c == cue)
    }
}

impl Presentation for LoggedPresentation {
    fn play(&mut self, cue: Cue, symbol: Option<&str>) {
        log::debug!("cue {:?} {}", cue, symbol.unwrap_or(""));
        self.cues.push((cue, symbol.map(str::to_string)));
    }

    fn camera_shake(&mut self, strength: f32) {
        log::debug!("camera shake {strength:.2}");
    }

    fn spawn_trail(&mut self, symbol: &str) -> Option<TrailHandle> {
        if !self.trails_enabled {
            return None;
        }
        let handle = TrailHandle(self.next_trail);
        self.next_trail += 1;
        self.spawned += 1;
        self.live_trails.push(handle);
        log::trace!("trail {} spawned for {symbol}", handle.0);
        Some(handle)
    }

    fn release_trail(&mut self, handle: TrailHandle) {
        if let Some(idx) = self.live_trails.iter().position(|h| *h == handle) {
            self.live_trails.swap_remove(idx);
            self.released += 1;
        } else {
            log::warn!("release of unknown trail {}", handle.0);
        }
    }

    fn clear_effects(&mut self) {
        if !self.live_trails.is_empty() {
            log::warn!("clearing {} leaked trails", self.live_trails.len());
        }
        self.released += self.live_trails.len() as u32;
        self.live_trails.clear();
    }
}
