use crate::types::{Orientation, Rect};
use nalgebra::Point2;
use serde::Serialize;
use std::cell::OnceCell;

/// Identifier of a section, unique within one sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

/// Consecutive foreground pixels along the section orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Run {
    pub start: i32,
    pub length: i32,
}

impl Run {
    pub fn new(start: i32, length: i32) -> Self {
        Self { start, length }
    }

    /// Last coordinate covered by the run.
    pub fn stop(&self) -> i32 {
        self.start + self.length - 1
    }

    /// Common length with `other`; zero or negative when disjoint.
    pub fn overlap(&self, other: &Run) -> i32 {
        self.stop().min(other.stop()) - self.start.max(other.start) + 1
    }

    pub fn contains(&self, coord: i32) -> bool {
        coord >= self.start && coord <= self.stop()
    }
}

/// Runs on consecutive lines, starting at `first_pos`.
///
/// For a horizontal section `first_pos` is the ordinate of the first run and
/// run coordinates are abscissae; the roles swap for vertical sections.
#[derive(Clone, Debug, Serialize)]
pub struct Section {
    pub id: SectionId,
    pub orientation: Orientation,
    pub first_pos: i32,
    pub runs: Vec<Run>,
    #[serde(skip)]
    bounds: OnceCell<Rect>,
    #[serde(skip)]
    weight: OnceCell<i32>,
}

impl Section {
    pub fn new(id: SectionId, orientation: Orientation, first_pos: i32, runs: Vec<Run>) -> Self {
        Self {
            id,
            orientation,
            first_pos,
            runs,
            bounds: OnceCell::new(),
            weight: OnceCell::new(),
        }
    }

    /// Horizontal section made of `thickness` identical runs.
    pub fn horizontal_bar(id: u32, x: i32, y: i32, length: i32, thickness: i32) -> Self {
        let runs = (0..thickness).map(|_| Run::new(x, length)).collect();
        Self::new(SectionId(id), Orientation::Horizontal, y, runs)
    }

    /// Vertical section made of `thickness` identical runs.
    pub fn vertical_bar(id: u32, x: i32, y: i32, length: i32, thickness: i32) -> Self {
        let runs = (0..thickness).map(|_| Run::new(y, length)).collect();
        Self::new(SectionId(id), Orientation::Vertical, x, runs)
    }

    /// Iterate over `(pos, run)` pairs.
    pub fn lines(&self) -> impl Iterator<Item = (i32, &Run)> + '_ {
        self.runs
            .iter()
            .enumerate()
            .map(move |(i, run)| (self.first_pos + i as i32, run))
    }

    fn compute_bounds(&self) -> Rect {
        if self.runs.is_empty() {
            return Rect::default();
        }
        let min = self.runs.iter().map(|r| r.start).min().unwrap_or(0);
        let max = self.runs.iter().map(Run::stop).max().unwrap_or(0);
        let last_pos = self.first_pos + self.runs.len() as i32 - 1;
        match self.orientation {
            Orientation::Horizontal => Rect::from_corners(min, self.first_pos, max, last_pos),
            Orientation::Vertical => Rect::from_corners(self.first_pos, min, last_pos, max),
        }
    }

    pub fn bounds(&self) -> Rect {
        *self.bounds.get_or_init(|| self.compute_bounds())
    }

    /// Number of foreground pixels.
    pub fn weight(&self) -> i32 {
        *self
            .weight
            .get_or_init(|| self.runs.iter().map(|r| r.length).sum())
    }

    /// Extent along the given orientation.
    pub fn length(&self, orientation: Orientation) -> i32 {
        let b = self.bounds();
        match orientation {
            Orientation::Horizontal => b.width,
            Orientation::Vertical => b.height,
        }
    }

    /// Number of runs, i.e. extent across the section orientation.
    pub fn thickness(&self) -> i32 {
        self.runs.len() as i32
    }

    pub fn centroid(&self) -> Point2<f64> {
        let mut sum_along = 0.0;
        let mut sum_across = 0.0;
        let mut weight = 0.0;
        for (pos, run) in self.lines() {
            let len = run.length as f64;
            sum_along += len * (run.start as f64 + (run.length - 1) as f64 / 2.0);
            sum_across += len * pos as f64;
            weight += len;
        }
        if weight == 0.0 {
            return Point2::origin();
        }
        let (along, across) = (sum_along / weight, sum_across / weight);
        match self.orientation {
            Orientation::Horizontal => Point2::new(along, across),
            Orientation::Vertical => Point2::new(across, along),
        }
    }

    /// Lowest and highest positions of the runs covering `coord`.
    ///
    /// For a horizontal section `coord` is an abscissa and the result is an
    /// ordinate range; for a vertical one the roles swap.
    pub fn span_at(&self, coord: i32) -> Option<(i32, i32)> {
        let mut span: Option<(i32, i32)> = None;
        for (pos, run) in self.lines() {
            if run.contains(coord) {
                span = Some(match span {
                    None => (pos, pos),
                    Some((lo, hi)) => (lo.min(pos), hi.max(pos)),
                });
            }
        }
        span
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (pos, coord) = match self.orientation {
            Orientation::Horizontal => (y, x),
            Orientation::Vertical => (x, y),
        };
        let idx = pos - self.first_pos;
        if idx < 0 || idx as usize >= self.runs.len() {
            return false;
        }
        self.runs[idx as usize].contains(coord)
    }

    /// True if at least one pixel lies inside `rect`.
    pub fn intersects(&self, rect: &Rect) -> bool {
        if !self.bounds().intersects(rect) {
            return false;
        }
        self.lines().any(|(pos, run)| match self.orientation {
            Orientation::Horizontal => {
                pos >= rect.y
                    && pos <= rect.bottom()
                    && run.start <= rect.right()
                    && run.stop() >= rect.x
            }
            Orientation::Vertical => {
                pos >= rect.x
                    && pos <= rect.right()
                    && run.start <= rect.bottom()
                    && run.stop() >= rect.y
            }
        })
    }

    /// Number of pixels inside `rect`.
    pub fn weight_in(&self, rect: &Rect) -> i32 {
        self.lines()
            .map(|(pos, run)| {
                let (pos_lo, pos_hi, lo, hi) = match self.orientation {
                    Orientation::Horizontal => (rect.y, rect.bottom(), rect.x, rect.right()),
                    Orientation::Vertical => (rect.x, rect.right(), rect.y, rect.bottom()),
                };
                if pos < pos_lo || pos > pos_hi {
                    return 0;
                }
                (run.stop().min(hi) - run.start.max(lo) + 1).max(0)
            })
            .sum()
    }

    /// Pixel adjacency (8-connectivity) with a section of the same orientation.
    /// Sections of different orientations are compared by their bounds.
    pub fn touches(&self, other: &Section) -> bool {
        if !self.bounds().grow(1, 1).intersects(&other.bounds()) {
            return false;
        }
        if self.orientation != other.orientation {
            return true;
        }
        self.lines().any(|(pos, run)| {
            other.lines().any(|(opos, orun)| {
                (pos - opos).abs() <= 1 && run.start <= orun.stop() + 1 && orun.start <= run.stop() + 1
            })
        })
    }
}
