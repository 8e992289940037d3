use crate::filament::{FilamentArena, FilamentId};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CombId(pub u32);

impl CombId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Filaments found at one sampled column, regularly spaced by one interline.
///
/// Ordinates are strictly increasing. A comb is never modified once the
/// sampling pass is over.
#[derive(Clone, Debug, Serialize)]
pub struct Comb {
    pub id: CombId,
    /// Sampling column index.
    pub col: usize,
    /// Abscissa of the sampling column.
    pub x: i32,
    filaments: Vec<FilamentId>,
    ys: Vec<f64>,
}

impl Comb {
    pub(crate) fn new(id: CombId, col: usize, x: i32) -> Self {
        Self {
            id,
            col,
            x,
            filaments: Vec::new(),
            ys: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, filament: FilamentId, y: f64) {
        debug_assert!(self.ys.last().map_or(true, |&last| last < y));
        self.filaments.push(filament);
        self.ys.push(y);
    }

    pub fn count(&self) -> usize {
        self.filaments.len()
    }

    pub fn filament(&self, index: usize) -> FilamentId {
        self.filaments[index]
    }

    pub fn filaments(&self) -> &[FilamentId] {
        &self.filaments
    }

    pub fn y(&self, index: usize) -> f64 {
        self.ys[index]
    }

    /// Index of the member sharing the ancestor of `filament`.
    pub fn index_of(&self, arena: &FilamentArena, filament: FilamentId) -> Option<usize> {
        let target = arena.ancestor(filament);
        self.filaments
            .iter()
            .position(|&f| f == filament)
            .or_else(|| {
                self.filaments
                    .iter()
                    .position(|&f| arena.ancestor(f) == target)
            })
    }
}
