use crate::filament::{FilamentArena, FilamentId};
use crate::types::Rect;
use nalgebra::Point2;
use serde::Serialize;
use std::cell::OnceCell;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Staff candidate: filaments indexed by their relative line position.
///
/// Positions grow with ordinate. A cluster merged into another one keeps a
/// `parent` link and no longer owns meaningful lines.
#[derive(Clone, Debug)]
pub struct LineCluster {
    pub id: ClusterId,
    /// Seed filament the cluster was grown from.
    pub seed: FilamentId,
    pub(crate) parent: Option<ClusterId>,
    pub(crate) lines: BTreeMap<i32, FilamentId>,
    bounds: OnceCell<Rect>,
    true_length: OnceCell<i32>,
}

impl LineCluster {
    pub(crate) fn new(id: ClusterId, seed: FilamentId) -> Self {
        Self {
            id,
            seed,
            parent: None,
            lines: BTreeMap::new(),
            bounds: OnceCell::new(),
            true_length: OnceCell::new(),
        }
    }

    pub fn parent(&self) -> Option<ClusterId> {
        self.parent
    }

    pub fn size(&self) -> usize {
        self.lines.len()
    }

    pub fn is_one_line(&self) -> bool {
        self.lines.len() == 1
    }

    /// Line filaments, top to bottom.
    pub fn lines(&self) -> impl Iterator<Item = FilamentId> + '_ {
        self.lines.values().copied()
    }

    /// `(position, filament)` pairs, top to bottom.
    pub fn entries(&self) -> impl Iterator<Item = (i32, FilamentId)> + '_ {
        self.lines.iter().map(|(&pos, &fil)| (pos, fil))
    }

    pub fn positions(&self) -> Vec<i32> {
        self.lines.keys().copied().collect()
    }

    pub fn first_line(&self) -> Option<FilamentId> {
        self.lines.values().next().copied()
    }

    pub fn last_line(&self) -> Option<FilamentId> {
        self.lines.values().next_back().copied()
    }

    pub(crate) fn first_pos(&self) -> i32 {
        self.lines.keys().next().copied().unwrap_or(0)
    }

    pub(crate) fn invalidate(&mut self) {
        self.bounds = OnceCell::new();
        self.true_length = OnceCell::new();
    }

    pub fn bounds(&self, arena: &FilamentArena) -> Rect {
        *self.bounds.get_or_init(|| {
            self.lines
                .values()
                .map(|&f| arena.resolved(f).bounds())
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default()
        })
    }

    pub fn center(&self, arena: &FilamentArena) -> Point2<f64> {
        let b = self.bounds(arena);
        Point2::new((b.x + b.width / 2) as f64, (b.y + b.height / 2) as f64)
    }

    /// Mean true length of the lines.
    pub fn true_length(&self, arena: &FilamentArena) -> i32 {
        *self.true_length.get_or_init(|| {
            if self.lines.is_empty() {
                return 0;
            }
            let sum: i32 = self
                .lines
                .values()
                .map(|&f| arena.resolved(f).true_length())
                .sum();
            sum / self.lines.len() as i32
        })
    }

    pub fn starts(&self, arena: &FilamentArena) -> Vec<Option<Point2<f64>>> {
        self.lines
            .values()
            .map(|&f| Some(arena.resolved(f).start_point()))
            .collect()
    }

    pub fn stops(&self, arena: &FilamentArena) -> Vec<Option<Point2<f64>>> {
        self.lines
            .values()
            .map(|&f| Some(arena.resolved(f).stop_point()))
            .collect()
    }

    /// Point of every line at abscissa `x`, top to bottom.
    ///
    /// A line not covering `x` is shifted from a neighbour line that covers
    /// both `x` and the line end, or else extrapolated along `slope` when `x`
    /// lies within `x_margin` of the line end. Remaining holes are `None`.
    pub fn points_at(
        &self,
        arena: &FilamentArena,
        x: f64,
        x_margin: i32,
        slope: f64,
    ) -> Vec<Option<Point2<f64>>> {
        let within = |f: FilamentId, at: f64| {
            let fil = arena.resolved(f);
            at >= fil.start_coord() as f64 && at <= fil.stop_coord() as f64
        };

        self.lines
            .iter()
            .map(|(&pos, &line)| {
                let fil = arena.resolved(line);
                if within(line, x) {
                    return Some(Point2::new(x, fil.y_at(x)));
                }
                let end = if x <= fil.start_point().x {
                    fil.start_point()
                } else {
                    fil.stop_point()
                };
                let neighbour = [-1, 1].iter().find_map(|dir| {
                    let other = *self.lines.get(&(pos + dir))?;
                    if within(other, x) && within(other, end.x) {
                        let o = arena.resolved(other);
                        Some(o.y_at(x) + fil.y_at(end.x) - o.y_at(end.x))
                    } else {
                        None
                    }
                });
                let y = neighbour.or_else(|| {
                    let dx = x - end.x;
                    (dx.abs() <= x_margin as f64).then(|| end.y + dx * slope)
                });
                y.map(|y| Point2::new(x, y))
            })
            .collect()
    }

    /// Remove the top or bottom line, whichever is shorter, until the cluster
    /// holds at most `max_count` lines, then renumber from 0.
    ///
    /// A 6-line result also loses an outer line much shorter than the inner
    /// ones (a 5-line staff plus a ledger-like line). Returns removed lines.
    pub(crate) fn trim(
        &mut self,
        arena: &FilamentArena,
        max_count: usize,
        min_tablature_length_ratio: f64,
    ) -> Vec<FilamentId> {
        let true_length = |f: FilamentId| arena.resolved(f).true_length();
        let mut removed = Vec::new();

        while self.lines.len() > max_count {
            let (Some((&top_pos, &top)), Some((&bot_pos, &bot))) =
                (self.lines.first_key_value(), self.lines.last_key_value())
            else {
                break;
            };
            if true_length(top) < true_length(bot) {
                self.lines.remove(&top_pos);
                removed.push(top);
            } else {
                self.lines.remove(&bot_pos);
                removed.push(bot);
            }
        }

        if self.lines.len() == 6 {
            let lengths: Vec<(i32, i32)> = self
                .lines
                .iter()
                .map(|(&pos, &f)| (pos, true_length(f)))
                .collect();
            let inner = &lengths[1..lengths.len() - 1];
            let mean = inner.iter().map(|l| l.1).sum::<i32>() as f64 / inner.len() as f64;
            let min_length = (min_tablature_length_ratio * mean).round() as i32;
            let (top_pos, top_len) = lengths[0];
            let (bot_pos, bot_len) = lengths[lengths.len() - 1];
            let victim = if top_len < bot_len {
                (top_len < min_length).then_some(top_pos)
            } else {
                (bot_len < min_length).then_some(bot_pos)
            };
            if let Some(line) = victim.and_then(|pos| self.lines.remove(&pos)) {
                removed.push(line);
            }
        }

        self.renumber();
        removed
    }

    /// Shift positions so that the first line sits at position 0.
    pub(crate) fn renumber(&mut self) {
        let first = self.first_pos();
        if first != 0 {
            self.lines = std::mem::take(&mut self.lines)
                .into_iter()
                .map(|(pos, fil)| (pos - first, fil))
                .collect();
        }
        self.invalidate();
    }
}
