//! Reshuffle state machine
//!
//! RESTING -> STARTING -> MOVING[pickup -> directed drop -> free drop]
//! -> FINISHING -> RESTING, driven one fixed step at a time by `tick`.
//!
//! Suspension points (hold timers, settle delays, inter-landing delays,
//! waiting for a directed piece to arrive) are stored in a private cursor
//! instead of blocking, so a single tick can run several zero-time stage
//! transitions and then yield.

use std::collections::{BTreeMap, VecDeque};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::layout::FinalLayout;
use super::matcher::LandingMatcher;
use super::piece::{KinematicPiece, PieceEvent, PieceId};
use crate::error::{Fault, ReshuffleError};
use crate::grid::{ReelGrid, SymbolicElement};
use crate::presentation::{Cue, Presentation};
use crate::settings::ReshuffleSettings;

/// Ordered substages of MOVING (never revisited within a run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStage {
    Pickup,
    DirectedDrop,
    FreeDrop,
}

/// Externally visible state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReshufflePhase {
    Resting,
    Starting,
    Moving(MoveStage),
    Finishing,
}

/// One piece placed into one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landing {
    pub column: usize,
    pub row: usize,
    pub name: String,
    pub piece: PieceId,
    pub directed: bool,
    /// Directed piece was snapped by its search deadline
    pub forced: bool,
}

/// What happened during one reshuffle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReshuffleReport {
    /// Animated landings, in landing order
    pub landings: Vec<Landing>,
    /// Cells filled straight from the layout (missing piece or cancel)
    pub placed_without_animation: Vec<(usize, usize)>,
    pub faults: Vec<Fault>,
    /// MOVING substages that did work, in order
    pub stages: Vec<MoveStage>,
    pub picked_up: usize,
    /// Simulated seconds from start to RESTING
    pub duration: f32,
    pub cancelled: bool,
}

impl ReshuffleReport {
    /// Cells in the order they were landed
    pub fn landing_order(&self) -> Vec<(usize, usize)> {
        self.landings.iter().map(|l| (l.column, l.row)).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct DirectedTarget {
    column: usize,
    row: usize,
    piece: PieceId,
}

#[derive(Debug)]
enum Cursor {
    Idle,
    Snapshot,
    Pickup,
    PickupSettle { remaining: f32 },
    AssignDestinations,
    DirectedLanding {
        targets: VecDeque<DirectedTarget>,
        pause: f32,
    },
    FreeDrop { next: usize, pause: f32 },
    Finishing { remaining: f32 },
}

impl Cursor {
    fn phase(&self) -> ReshufflePhase {
        match self {
            Cursor::Idle => ReshufflePhase::Resting,
            Cursor::Snapshot => ReshufflePhase::Starting,
            Cursor::Pickup | Cursor::PickupSettle { .. } => {
                ReshufflePhase::Moving(MoveStage::Pickup)
            }
            Cursor::AssignDestinations | Cursor::DirectedLanding { .. } => {
                ReshufflePhase::Moving(MoveStage::DirectedDrop)
            }
            Cursor::FreeDrop { .. } => ReshufflePhase::Moving(MoveStage::FreeDrop),
            Cursor::Finishing { .. } => ReshufflePhase::Finishing,
        }
    }

    /// Stages a cancel can cut short
    fn is_interruptible(&self) -> bool {
        !matches!(self, Cursor::Idle | Cursor::Finishing { .. })
    }
}

enum Flow {
    Continue,
    Yield,
}

/// Staged reshuffle controller; owns every piece for the duration of a run
#[derive(Debug)]
pub struct ReshuffleStateMachine {
    settings: ReshuffleSettings,
    cursor: Cursor,
    layout: Option<FinalLayout>,
    /// Visible cells at STARTING, keyed by (column, row)
    snapshot: BTreeMap<(usize, usize), Vec2>,
    pieces: Vec<KinematicPiece>,
    matcher: LandingMatcher,
    free_cells: Vec<(usize, usize)>,
    rng: Pcg32,
    runs: u64,
    skip: bool,
    cancelled: bool,
    report: ReshuffleReport,
    last_report: Option<ReshuffleReport>,
}

impl ReshuffleStateMachine {
    pub fn new(settings: ReshuffleSettings) -> Self {
        let settings = settings.sanitized();
        let rng = Pcg32::seed_from_u64(settings.seed);
        Self {
            settings,
            cursor: Cursor::Idle,
            layout: None,
            snapshot: BTreeMap::new(),
            pieces: Vec::new(),
            matcher: LandingMatcher::new(),
            free_cells: Vec::new(),
            rng,
            runs: 0,
            skip: false,
            cancelled: false,
            report: ReshuffleReport::default(),
            last_report: None,
        }
    }

    pub fn settings(&self) -> &ReshuffleSettings {
        &self.settings
    }

    pub fn phase(&self) -> ReshufflePhase {
        self.cursor.phase()
    }

    pub fn is_resting(&self) -> bool {
        matches!(self.cursor, Cursor::Idle)
    }

    /// Pieces currently owned by the run
    pub fn pieces(&self) -> &[KinematicPiece] {
        &self.pieces
    }

    pub fn matcher(&self) -> &LandingMatcher {
        &self.matcher
    }

    /// Report of the most recent completed run
    pub fn last_report(&self) -> Option<&ReshuffleReport> {
        self.last_report.as_ref()
    }

    pub fn take_report(&mut self) -> Option<ReshuffleReport> {
        self.last_report.take()
    }

    /// Begin a reshuffle toward `layout`.
    ///
    /// Rejected without touching any state if a run is already in flight or
    /// the layout does not match the grid's shape.
    pub fn start<G: ReelGrid + ?Sized>(
        &mut self,
        layout: FinalLayout,
        grid: &G,
    ) -> Result<(), ReshuffleError> {
        if !self.is_resting() {
            return Err(ReshuffleError::AlreadyRunning {
                phase: self.phase(),
            });
        }
        if layout.columns() != grid.columns() || layout.rows() != grid.rows() {
            return Err(ReshuffleError::LayoutShape {
                layout_columns: layout.columns(),
                layout_rows: layout.rows(),
                grid_columns: grid.columns(),
                grid_rows: grid.rows(),
            });
        }

        // Fresh stream per run, still reproducible from the settings seed
        self.rng = Pcg32::seed_from_u64(
            self.settings
                .seed
                .wrapping_add(self.runs.wrapping_mul(2654435761)),
        );
        self.runs += 1;
        self.report = ReshuffleReport::default();
        self.skip = false;
        self.cancelled = false;
        self.pieces.clear();
        self.matcher.reset_cells(layout.columns(), layout.rows());
        log::info!(
            "Reshuffle #{} starting on {}x{} grid",
            self.runs,
            layout.columns(),
            layout.rows()
        );
        self.layout = Some(layout);
        self.cursor = Cursor::Snapshot;
        Ok(())
    }

    /// Collapse every remaining wait of the current run to zero
    pub fn request_skip(&mut self) {
        if !self.is_resting() {
            self.skip = true;
        }
    }

    /// Stop animating: tweens in progress finish, everything else is placed
    /// immediately at the next suspension point
    pub fn cancel(&mut self) {
        if !self.is_resting() {
            self.cancelled = true;
        }
    }

    /// Advance the run by one fixed step
    pub fn tick<G, P>(&mut self, grid: &mut G, fx: &mut P, dt: f32) -> ReshufflePhase
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        if self.is_resting() {
            return ReshufflePhase::Resting;
        }
        self.report.duration += dt;
        self.step_pieces(fx, dt);
        self.advance(grid, fx, dt);
        self.phase()
    }

    fn step_pieces<P: Presentation + ?Sized>(&mut self, fx: &mut P, dt: f32) {
        let orbit = &self.settings.orbit;
        let homing = &self.settings.homing;
        for piece in &mut self.pieces {
            let event = if self.skip && piece.skip_hold() {
                Some(PieceEvent::Released)
            } else {
                piece.step(dt, orbit, homing)
            };
            match event {
                Some(PieceEvent::Released) if piece.variant => {
                    fx.play(Cue::VariantRelease, Some(&piece.name));
                }
                Some(PieceEvent::Arrived { forced: true }) => {
                    log::debug!("Piece {} hit its search deadline", piece.id);
                }
                _ => {}
            }
        }
    }

    fn advance<G, P>(&mut self, grid: &mut G, fx: &mut P, dt: f32)
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        loop {
            let mut cursor = std::mem::replace(&mut self.cursor, Cursor::Idle);
            if self.cancelled && cursor.is_interruptible() {
                cursor = self.cancel_remaining(grid, fx, cursor);
            }

            let (next, flow) = match cursor {
                Cursor::Idle => (Cursor::Idle, Flow::Yield),
                Cursor::Snapshot => {
                    self.take_snapshot(grid);
                    (Cursor::Pickup, Flow::Continue)
                }
                Cursor::Pickup => {
                    self.pick_up(grid, fx);
                    let remaining = self.settings.paced(self.settings.pickup_settle);
                    (Cursor::PickupSettle { remaining }, Flow::Yield)
                }
                Cursor::PickupSettle { mut remaining } => {
                    if self.wait(&mut remaining, dt) {
                        (Cursor::PickupSettle { remaining }, Flow::Yield)
                    } else {
                        (Cursor::AssignDestinations, Flow::Continue)
                    }
                }
                Cursor::AssignDestinations => {
                    let targets = self.assign_destinations(grid, fx);
                    if targets.is_empty() {
                        (self.enter_free_drop(), Flow::Continue)
                    } else {
                        self.report.stages.push(MoveStage::DirectedDrop);
                        (
                            Cursor::DirectedLanding {
                                targets,
                                pause: 0.0,
                            },
                            Flow::Yield,
                        )
                    }
                }
                Cursor::DirectedLanding { targets, pause } => {
                    self.directed_landing(grid, fx, targets, pause, dt)
                }
                Cursor::FreeDrop { next, pause } => self.free_drop(grid, fx, next, pause, dt),
                Cursor::Finishing { remaining } => self.finish(grid, fx, remaining, dt),
            };

            self.cursor = next;
            if let Flow::Yield = flow {
                return;
            }
        }
    }

    /// Returns true while the wait is still running
    fn wait(&self, remaining: &mut f32, dt: f32) -> bool {
        if self.skip {
            *remaining = 0.0;
            return false;
        }
        if *remaining <= 0.0 {
            return false;
        }
        *remaining -= dt;
        *remaining > 0.0
    }

    // === STARTING ===

    fn take_snapshot<G: ReelGrid + ?Sized>(&mut self, grid: &G) {
        self.snapshot.clear();
        for cell in grid.cells().into_iter().flatten() {
            if cell.element.is_some() {
                self.snapshot.insert((cell.column, cell.row), cell.position);
            }
        }
        log::info!("Snapshot: {} visible cells", self.snapshot.len());
    }

    // === MOVING: pickup ===

    fn pick_up<G, P>(&mut self, grid: &mut G, fx: &mut P)
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        self.report.stages.push(MoveStage::Pickup);
        let jitter = self.settings.paced(self.settings.pickup_jitter);
        let variant_hold = self.settings.paced(self.settings.variant_hold_delay);

        let snapshot = std::mem::take(&mut self.snapshot);
        for ((column, row), position) in snapshot {
            let Some(element) = grid.detach_element(column, row) else {
                continue;
            };
            let variant = self.settings.is_variant(&element.name);
            let mut hold = if jitter > 0.0 {
                self.rng.random_range(0.0..=jitter)
            } else {
                0.0
            };
            if variant {
                hold += variant_hold;
            }

            let id = self.pieces.len() as PieceId;
            let mut piece = KinematicPiece::pickup(
                id,
                element,
                (column, row),
                position,
                variant,
                hold,
                &self.settings.orbit,
                &mut self.rng,
            );
            piece.attach_trail(fx.spawn_trail(&piece.name));
            self.pieces.push(piece);
        }

        self.matcher.index(&self.pieces);
        self.report.picked_up = self.pieces.len();
        fx.play(Cue::Pickup, None);
        log::info!("Picked up {} pieces", self.pieces.len());
    }

    // === MOVING: directed drop ===

    /// Give every variant cell its piece and destination, then release them
    fn assign_destinations<G, P>(&mut self, grid: &mut G, fx: &mut P) -> VecDeque<DirectedTarget>
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        let mut targets = VecDeque::new();
        let Some(layout) = self.layout.take() else {
            return targets;
        };

        for (column, row, name) in layout.column_major() {
            if !self.settings.is_variant(name) || self.matcher.is_consumed(column, row) {
                continue;
            }
            match self.matcher.take_next(name) {
                Some(id) => {
                    let destination =
                        grid.cell_position(column, row) + self.settings.symbol_offset(name);
                    self.pieces[id as usize].assign_destination(destination);
                    fx.play(Cue::HomingStart, Some(name));
                    targets.push_back(DirectedTarget {
                        column,
                        row,
                        piece: id,
                    });
                }
                None => self.place_missing(grid, column, row, name),
            }
        }

        // Destinations depend on the whole layout; nobody flies until all are known
        for target in &targets {
            self.pieces[target.piece as usize].begin_homing();
        }
        if !targets.is_empty() {
            log::info!("Directed drop: {} destinations assigned", targets.len());
        }

        self.layout = Some(layout);
        targets
    }

    fn directed_landing<G, P>(
        &mut self,
        grid: &mut G,
        fx: &mut P,
        mut targets: VecDeque<DirectedTarget>,
        mut pause: f32,
        dt: f32,
    ) -> (Cursor, Flow)
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        if self.wait(&mut pause, dt) {
            return (Cursor::DirectedLanding { targets, pause }, Flow::Yield);
        }
        let Some(target) = targets.front().copied() else {
            return (self.enter_free_drop(), Flow::Continue);
        };
        if !self.pieces[target.piece as usize].is_arrived() {
            return (
                Cursor::DirectedLanding {
                    targets,
                    pause: 0.0,
                },
                Flow::Yield,
            );
        }

        targets.pop_front();
        self.land(grid, fx, target.column, target.row, target.piece, true);
        let pause = self.settings.paced(self.settings.directed_landing_interval);
        (Cursor::DirectedLanding { targets, pause }, Flow::Yield)
    }

    // === MOVING: free drop ===

    fn enter_free_drop(&mut self) -> Cursor {
        let settings = &self.settings;
        self.free_cells = self
            .layout
            .as_ref()
            .map(|layout| {
                layout
                    .column_major()
                    .filter(|(_, _, name)| !settings.is_variant(name))
                    .map(|(column, row, _)| (column, row))
                    .collect()
            })
            .unwrap_or_default();
        self.report.stages.push(MoveStage::FreeDrop);
        log::info!("Free drop: {} cells", self.free_cells.len());
        Cursor::FreeDrop {
            next: 0,
            pause: 0.0,
        }
    }

    fn free_drop<G, P>(
        &mut self,
        grid: &mut G,
        fx: &mut P,
        next: usize,
        mut pause: f32,
        dt: f32,
    ) -> (Cursor, Flow)
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        if self.wait(&mut pause, dt) {
            return (Cursor::FreeDrop { next, pause }, Flow::Yield);
        }
        let Some(&(column, row)) = self.free_cells.get(next) else {
            let remaining = self.settings.paced(self.settings.finishing_settle);
            return (Cursor::Finishing { remaining }, Flow::Continue);
        };
        let next = next + 1;
        if self.matcher.is_consumed(column, row) {
            return (Cursor::FreeDrop { next, pause: 0.0 }, Flow::Continue);
        }

        let name = self
            .layout
            .as_ref()
            .and_then(|layout| layout.name(column, row))
            .unwrap_or_default()
            .to_string();
        match self.matcher.take_next(&name) {
            Some(id) => {
                self.land(grid, fx, column, row, id, false);
                let pause = self.settings.paced(self.settings.free_landing_interval);
                (Cursor::FreeDrop { next, pause }, Flow::Yield)
            }
            None => {
                self.place_missing(grid, column, row, &name);
                (Cursor::FreeDrop { next, pause: 0.0 }, Flow::Continue)
            }
        }
    }

    // === Landing ===

    fn land<G, P>(
        &mut self,
        grid: &mut G,
        fx: &mut P,
        column: usize,
        row: usize,
        id: PieceId,
        directed: bool,
    ) where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        if !self.matcher.mark_cell_consumed(column, row) {
            self.record(Fault::CellAlreadyConsumed { column, row });
            return;
        }

        let target = grid.cell_position(column, row);
        let duration = self.settings.paced(self.settings.drop_duration);
        let piece = &mut self.pieces[id as usize];
        piece.release_trail(fx);
        let element = piece
            .take_element()
            .unwrap_or_else(|| SymbolicElement::new(piece.name.clone()));
        piece.start_drop(target, duration);
        let landing = Landing {
            column,
            row,
            name: piece.name.clone(),
            piece: id,
            directed,
            forced: piece.forced,
        };

        grid.set_cell_element(column, row, element);
        fx.play(
            if directed { Cue::DirectedLand } else { Cue::Land },
            Some(&landing.name),
        );
        log::debug!(
            "Landed piece {} '{}' at ({}, {})",
            id,
            landing.name,
            column,
            row
        );
        if landing.forced {
            self.record(Fault::ForcedArrival {
                piece: id,
                name: landing.name.clone(),
            });
        }
        self.report.landings.push(landing);
    }

    /// Layout wants a name nobody is carrying: fill the cell without animation
    fn place_missing<G: ReelGrid + ?Sized>(
        &mut self,
        grid: &mut G,
        column: usize,
        row: usize,
        name: &str,
    ) {
        self.record(Fault::MissingPiece {
            column,
            row,
            name: name.to_string(),
        });
        if self.matcher.mark_cell_consumed(column, row) {
            grid.set_cell_element(column, row, SymbolicElement::new(name));
            self.report.placed_without_animation.push((column, row));
        }
    }

    /// Put a specific piece straight into its cell
    fn place_piece_now<G, P>(
        &mut self,
        grid: &mut G,
        fx: &mut P,
        column: usize,
        row: usize,
        id: PieceId,
    ) where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        if !self.matcher.mark_cell_consumed(column, row) {
            return;
        }
        let target = grid.cell_position(column, row);
        let piece = &mut self.pieces[id as usize];
        piece.release_trail(fx);
        let element = piece
            .take_element()
            .unwrap_or_else(|| SymbolicElement::new(piece.name.clone()));
        piece.start_drop(target, 0.0);
        grid.set_cell_element(column, row, element);
        self.report.placed_without_animation.push((column, row));
    }

    fn cancel_remaining<G, P>(&mut self, grid: &mut G, fx: &mut P, cursor: Cursor) -> Cursor
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        log::info!("Reshuffle cancelled during {:?}", cursor.phase());
        self.report.cancelled = true;

        // Directed pieces were already dequeued when their destination was set
        if let Cursor::DirectedLanding { targets, .. } = &cursor {
            for target in targets {
                self.place_piece_now(grid, fx, target.column, target.row, target.piece);
            }
        }

        if let Some(layout) = self.layout.take() {
            for (column, row, name) in layout.column_major() {
                if self.matcher.is_consumed(column, row) {
                    continue;
                }
                if self.matcher.remaining(name) > 0 {
                    if let Some(id) = self.matcher.take_next(name) {
                        self.place_piece_now(grid, fx, column, row, id);
                    }
                } else if self.matcher.mark_cell_consumed(column, row) {
                    // Before pickup the stale element is simply overwritten
                    grid.set_cell_element(column, row, SymbolicElement::new(name));
                    self.report.placed_without_animation.push((column, row));
                }
            }
            self.layout = Some(layout);
        }

        Cursor::Finishing { remaining: 0.0 }
    }

    // === FINISHING ===

    fn finish<G, P>(
        &mut self,
        grid: &mut G,
        fx: &mut P,
        mut remaining: f32,
        dt: f32,
    ) -> (Cursor, Flow)
    where
        G: ReelGrid + ?Sized,
        P: Presentation + ?Sized,
    {
        let waiting = self.wait(&mut remaining, dt);
        if waiting || self.pieces.iter().any(KinematicPiece::is_dropping) {
            return (Cursor::Finishing { remaining }, Flow::Yield);
        }

        for id in self.matcher.drain_unclaimed() {
            let name = self.pieces[id as usize].name.clone();
            self.record(Fault::UnclaimedPiece { piece: id, name });
        }
        for piece in &mut self.pieces {
            piece.release_trail(fx);
        }
        fx.clear_effects();
        grid.refresh_visuals();
        fx.play(Cue::Settle, None);

        self.pieces.clear();
        self.matcher.clear();
        self.free_cells.clear();
        self.snapshot.clear();
        self.layout = None;
        self.skip = false;
        self.cancelled = false;

        let report = std::mem::take(&mut self.report);
        log::info!(
            "Reshuffle settled: {} landings, {} faults in {:.2}s",
            report.landings.len(),
            report.faults.len(),
            report.duration
        );
        self.last_report = Some(report);
        (Cursor::Idle, Flow::Yield)
    }

    fn record(&mut self, fault: Fault) {
        match fault {
            Fault::ForcedArrival { .. } => log::info!("{fault}"),
            _ => log::warn!("{fault}"),
        }
        self.report.faults.push(fault);
    }
}
