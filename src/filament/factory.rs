use super::options::FilamentParams;
use super::{Filament, FilamentArena, FilamentId};
use crate::sections::Section;
use crate::types::Orientation;
use log::debug;

/// Builds long horizontal filaments out of horizontal sections.
///
/// Each thin and long enough section seeds one filament; filaments are then
/// joined when they follow each other (small abscissa gap, or overlap) with a
/// consistent ordinate at the junction.
#[derive(Clone, Debug)]
pub struct FilamentFactory {
    params: FilamentParams,
}

impl FilamentFactory {
    pub(crate) fn new(params: FilamentParams) -> Self {
        Self { params }
    }

    /// Populate `arena` and return the ids of the resulting root filaments.
    pub fn build(&self, arena: &mut FilamentArena, sections: &[Section]) -> Vec<FilamentId> {
        let p = &self.params;
        let mut ids: Vec<FilamentId> = sections
            .iter()
            .filter(|s| {
                s.orientation == Orientation::Horizontal
                    && s.length(Orientation::Horizontal) >= p.min_section_length
                    && s.thickness() <= p.max_thickness
            })
            .map(|s| arena.create(Orientation::Horizontal, p.step, vec![s.clone()]))
            .collect();
        let seeds = ids.len();

        loop {
            ids.retain(|&id| arena.is_root(id));
            ids.sort_by_key(|&id| arena.get(id).start_coord());
            let mut merged = false;
            for i in 0..ids.len() {
                let host = ids[i];
                if !arena.is_root(host) {
                    continue;
                }
                for &guest in &ids[i + 1..] {
                    if !arena.is_root(guest) {
                        continue;
                    }
                    let gap = arena.get(guest).start_coord() - arena.get(host).stop_coord() - 1;
                    if gap > p.max_gap {
                        break;
                    }
                    if self.can_join(arena, host, guest) {
                        arena.include(host, guest);
                        merged = true;
                    }
                }
            }
            if !merged {
                break;
            }
        }

        ids.retain(|&id| arena.is_root(id) && arena.get(id).true_length() >= p.min_filament_length);
        debug!("filaments: {} seeds -> {} filaments", seeds, ids.len());
        ids
    }

    fn can_join(&self, arena: &FilamentArena, host: FilamentId, guest: FilamentId) -> bool {
        let a: &Filament = arena.get(host);
        let b: &Filament = arena.get(guest);
        let lo = a.start_coord().max(b.start_coord());
        let hi = a.stop_coord().min(b.stop_coord());
        let gap = lo - hi - 1;
        if gap > self.params.max_gap {
            return false;
        }
        let mid = (lo + hi) as f64 / 2.0;
        let dy = (a.y_at(mid) - b.y_at(mid)).abs();
        if dy > self.params.max_junction_dy {
            return false;
        }
        if gap < 0 {
            let x = mid.round() as i32;
            if arena.thickness_at(x, &[host, guest]) > self.params.max_thickness {
                return false;
            }
        }
        true
    }
}
