use super::options::LagParams;
use super::section::{Run, Section, SectionId};
use crate::image::PixelSource;
use crate::types::Orientation;
use log::debug;

/// Horizontal and vertical sections of one sheet.
#[derive(Clone, Debug, Default)]
pub struct Lags {
    pub horizontal: Vec<Section>,
    pub vertical: Vec<Section>,
}

impl Lags {
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.horizontal
            .iter()
            .chain(self.vertical.iter())
            .find(|s| s.id == id)
    }
}

/// Extract vertical sections from long vertical runs, then horizontal
/// sections from the remaining foreground pixels.
pub(crate) fn build_lags<P: PixelSource + ?Sized>(source: &P, params: &LagParams) -> Lags {
    let width = source.width().max(0);
    let height = source.height().max(0);
    let mut consumed = vec![false; (width as usize) * (height as usize)];

    let mut columns = Vec::with_capacity(width as usize);
    for x in 0..width {
        let runs = extract_runs(height, params.min_vertical_run, |y| source.is_fore(x, y));
        for run in &runs {
            for y in run.start..=run.stop() {
                consumed[(y * width + x) as usize] = true;
            }
        }
        columns.push(runs);
    }

    let mut rows = Vec::with_capacity(height as usize);
    for y in 0..height {
        rows.push(extract_runs(width, params.min_horizontal_run, |x| {
            source.is_fore(x, y) && !consumed[(y * width + x) as usize]
        }));
    }

    let mut next_id = 0u32;
    let horizontal = aggregate(Orientation::Horizontal, &rows, params, &mut next_id);
    let vertical = aggregate(Orientation::Vertical, &columns, params, &mut next_id);
    debug!(
        "lags: {} horizontal sections, {} vertical sections",
        horizontal.len(),
        vertical.len()
    );
    Lags {
        horizontal,
        vertical,
    }
}

/// Runs of `is_fore` along `0..extent` that are at least `min_length` long.
fn extract_runs(extent: i32, min_length: i32, is_fore: impl Fn(i32) -> bool) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut start = None;
    for c in 0..=extent {
        let fore = c < extent && is_fore(c);
        match (fore, start) {
            (true, None) => start = Some(c),
            (false, Some(s)) => {
                if c - s >= min_length {
                    runs.push(Run::new(s, c - s));
                }
                start = None;
            }
            _ => {}
        }
    }
    runs
}

/// Aggregate runs of consecutive lines into sections.
///
/// A run extends the section of a run on the previous line only when both
/// overlap nothing else and their lengths are compatible.
fn aggregate(
    orientation: Orientation,
    lines: &[Vec<Run>],
    params: &LagParams,
    next_id: &mut u32,
) -> Vec<Section> {
    let mut pending: Vec<(i32, Vec<Run>)> = Vec::new();
    let mut prev: Vec<(Run, usize)> = Vec::new();

    for (pos, runs) in lines.iter().enumerate() {
        let mut current = Vec::with_capacity(runs.len());
        for run in runs {
            let overlapping: Vec<&(Run, usize)> =
                prev.iter().filter(|(p, _)| p.overlap(run) > 0).collect();
            let joined = match overlapping.as_slice() {
                [(p, idx)] => {
                    let back = runs.iter().filter(|r| r.overlap(p) > 0).count();
                    let (lo, hi) = (p.length.min(run.length), p.length.max(run.length));
                    (back == 1 && hi as f64 <= lo as f64 * params.max_length_ratio)
                        .then_some(*idx)
                }
                _ => None,
            };
            let idx = match joined {
                Some(idx) => {
                    pending[idx].1.push(*run);
                    idx
                }
                None => {
                    pending.push((pos as i32, vec![*run]));
                    pending.len() - 1
                }
            };
            current.push((*run, idx));
        }
        prev = current;
    }

    pending
        .into_iter()
        .map(|(first_pos, runs)| {
            let id = SectionId(*next_id);
            *next_id += 1;
            Section::new(id, orientation, first_pos, runs)
        })
        .collect()
}
