//! Reel grid interface
//!
//! The grid is owned by the reel subsystem. The reshuffle only visits it:
//! it reads the snapshot, detaches elements at pickup and writes the
//! reconciled elements back as pieces land.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{CELL_HEIGHT, CELL_WIDTH};

/// A named token occupying a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolicElement {
    /// Server-side symbol name
    pub name: String,
}

impl SymbolicElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Read-only view of a cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub column: usize,
    pub row: usize,
    pub element: Option<SymbolicElement>,
    /// Visual position of the cell center (world space)
    pub position: Vec2,
}

/// Grid owned by the reel subsystem
pub trait ReelGrid {
    fn columns(&self) -> usize;
    fn rows(&self) -> usize;

    /// All cells, column-major
    fn cells(&self) -> Vec<Vec<CellView>>;

    /// Where an element sits once placed at (column, row)
    fn cell_position(&self, column: usize, row: usize) -> Vec2;

    /// Remove and return the element at (column, row)
    fn detach_element(&mut self, column: usize, row: usize) -> Option<SymbolicElement>;

    fn set_cell_element(&mut self, column: usize, row: usize, element: SymbolicElement);

    /// Recompute derived visual state after direct cell mutation
    fn refresh_visuals(&mut self);
}

/// In-memory grid, centered on the origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VecGrid {
    /// `cells[column][row]`
    cells: Vec<Vec<Option<SymbolicElement>>>,
    cell_size: Vec2,
    /// Number of `refresh_visuals` calls (for hosts that redraw lazily)
    #[serde(skip)]
    refreshes: u32,
}

impl VecGrid {
    /// Build a grid from column-major names
    pub fn from_columns<S: AsRef<str>>(columns: &[Vec<S>]) -> Self {
        let cells = columns
            .iter()
            .map(|col| {
                col.iter()
                    .map(|name| Some(SymbolicElement::new(name.as_ref())))
                    .collect()
            })
            .collect();
        Self {
            cells,
            cell_size: Vec2::new(CELL_WIDTH, CELL_HEIGHT),
            refreshes: 0,
        }
    }

    pub fn with_cell_size(mut self, size: Vec2) -> Self {
        self.cell_size = size;
        self
    }

    pub fn element(&self, column: usize, row: usize) -> Option<&SymbolicElement> {
        self.cells.get(column)?.get(row)?.as_ref()
    }

    /// Names in column-major order (`None` for empty cells)
    pub fn names(&self) -> Vec<Vec<Option<String>>> {
        self.cells
            .iter()
            .map(|col| col.iter().map(|c| c.as_ref().map(|e| e.name.clone())).collect())
            .collect()
    }

    pub fn is_fully_populated(&self) -> bool {
        self.cells.iter().flatten().all(|c| c.is_some())
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes
    }
}

impl ReelGrid for VecGrid {
    fn columns(&self) -> usize {
        self.cells.len()
    }

    fn rows(&self) -> usize {
        self.cells.first().map(|c| c.len()).unwrap_or(0)
    }

    fn cells(&self) -> Vec<Vec<CellView>> {
        self.cells
            .iter()
            .enumerate()
            .map(|(column, col)| {
                col.iter()
                    .enumerate()
                    .map(|(row, element)| CellView {
                        column,
                        row,
                        element: element.clone(),
                        position: self.cell_position(column, row),
                    })
                    .collect()
            })
            .collect()
    }

    fn cell_position(&self, column: usize, row: usize) -> Vec2 {
        // Row 0 is the top row; +y is up
        let half_cols = (self.columns() as f32 - 1.0) / 2.0;
        let half_rows = (self.rows() as f32 - 1.0) / 2.0;
        Vec2::new(
            (column as f32 - half_cols) * self.cell_size.x,
            (half_rows - row as f32) * self.cell_size.y,
        )
    }

    fn detach_element(&mut self, column: usize, row: usize) -> Option<SymbolicElement> {
        self.cells.get_mut(column)?.get_mut(row)?.take()
    }

    fn set_cell_element(&mut self, column: usize, row: usize, element: SymbolicElement) {
        match self.cells.get_mut(column).and_then(|c| c.get_mut(row)) {
            Some(cell) => *cell = Some(element),
            None => log::warn!("set_cell_element outside grid at ({column}, {row})"),
        }
    }

    fn refresh_visuals(&mut self) {
        self.refreshes += 1;
    }
}
