//! Name-based landing matcher
//!
//! Pieces are fungible by name: the layout asks for "the next A" and gets
//! the oldest A still in flight. Cells are tracked with an explicit consumed
//! flag so no cell is ever landed twice.

use std::collections::{HashMap, VecDeque};

use super::piece::{KinematicPiece, PieceId};

#[derive(Debug, Default)]
pub struct LandingMatcher {
    queues: HashMap<String, VecDeque<PieceId>>,
    /// `consumed[column][row]`
    consumed: Vec<Vec<bool>>,
}

impl LandingMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the name index from a pickup set, preserving pickup order
    pub fn index(&mut self, pieces: &[KinematicPiece]) {
        self.queues.clear();
        for piece in pieces {
            self.insert(&piece.name, piece.id);
        }
    }

    /// Size the consumed-cell table for a layout and clear it
    pub fn reset_cells(&mut self, columns: usize, rows: usize) {
        self.consumed = vec![vec![false; rows]; columns];
    }

    pub fn insert(&mut self, name: &str, id: PieceId) {
        self.queues.entry(name.to_string()).or_default().push_back(id);
    }

    /// Dequeue the oldest unclaimed piece for `name`
    pub fn take_next(&mut self, name: &str) -> Option<PieceId> {
        let id = self.queues.get_mut(name).and_then(VecDeque::pop_front);
        if id.is_none() {
            log::warn!("No queued piece named '{name}'");
        }
        id
    }

    pub fn remaining(&self, name: &str) -> usize {
        self.queues.get(name).map(VecDeque::len).unwrap_or(0)
    }

    pub fn total_remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Mark a layout cell as filled. Returns false if it already was.
    pub fn mark_cell_consumed(&mut self, column: usize, row: usize) -> bool {
        match self.consumed.get_mut(column).and_then(|c| c.get_mut(row)) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            Some(_) => false,
            None => {
                log::warn!("Consumed-cell lookup outside layout at ({column}, {row})");
                false
            }
        }
    }

    pub fn is_consumed(&self, column: usize, row: usize) -> bool {
        self.consumed
            .get(column)
            .and_then(|c| c.get(row))
            .copied()
            .unwrap_or(false)
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.iter().flatten().filter(|c| **c).count()
    }

    /// Drain every piece nobody asked for, ordered by id
    pub fn drain_unclaimed(&mut self) -> Vec<PieceId> {
        let mut ids: Vec<PieceId> = self.queues.drain().flat_map(|(_, q)| q).collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self) {
        self.queues.clear();
        self.consumed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.total_remaining() == 0 && self.consumed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SymbolicElement;
    use crate::settings::OrbitParams;
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn pieces(names: &[&str]) -> Vec<KinematicPiece> {
        let mut rng = Pcg32::seed_from_u64(9);
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                KinematicPiece::pickup(
                    i as PieceId,
                    SymbolicElement::new(*name),
                    (i, 0),
                    Vec2::ZERO,
                    false,
                    0.0,
                    &OrbitParams::default(),
                    &mut rng,
                )
            })
            .collect()
    }

    #[test]
    fn test_duplicates_are_fifo() {
        let mut matcher = LandingMatcher::new();
        matcher.index(&pieces(&["A", "B", "A", "A"]));
        assert_eq!(matcher.remaining("A"), 3);
        assert_eq!(matcher.take_next("A"), Some(0));
        assert_eq!(matcher.take_next("A"), Some(2));
        assert_eq!(matcher.take_next("B"), Some(1));
        assert_eq!(matcher.take_next("A"), Some(3));
        assert_eq!(matcher.take_next("A"), None);
    }

    #[test]
    fn test_unknown_name_is_none() {
        let mut matcher = LandingMatcher::new();
        matcher.index(&pieces(&["A"]));
        assert_eq!(matcher.take_next("Z"), None);
        assert_eq!(matcher.total_remaining(), 1);
    }

    #[test]
    fn test_cells_consumed_once() {
        let mut matcher = LandingMatcher::new();
        matcher.reset_cells(2, 2);
        assert!(!matcher.is_consumed(1, 1));
        assert!(matcher.mark_cell_consumed(1, 1));
        assert!(matcher.is_consumed(1, 1));
        assert!(!matcher.mark_cell_consumed(1, 1));
        assert!(!matcher.mark_cell_consumed(5, 0));
        assert_eq!(matcher.consumed_count(), 1);
    }

    #[test]
    fn test_drain_unclaimed_sorted() {
        let mut matcher = LandingMatcher::new();
        matcher.index(&pieces(&["C", "A", "B", "A"]));
        matcher.take_next("A");
        assert_eq!(matcher.drain_unclaimed(), vec![0, 2, 3]);
        assert_eq!(matcher.total_remaining(), 0);
    }

    #[test]
    fn test_reindex_discards_previous_run() {
        let mut matcher = LandingMatcher::new();
        matcher.index(&pieces(&["A", "A"]));
        matcher.index(&pieces(&["B"]));
        assert_eq!(matcher.remaining("A"), 0);
        assert_eq!(matcher.remaining("B"), 1);
        matcher.clear();
        assert!(matcher.is_empty());
    }
}
