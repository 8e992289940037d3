use super::{Filament, FilamentId};
use crate::sections::Section;
use crate::types::{Orientation, Rect};

/// Builds the vertical filament of a barline-like stroke.
///
/// Sections intersecting the core rectangle form the filament kernel, which
/// is then grown with touching sections located in the lookup rectangle.
#[derive(Clone, Debug)]
pub struct BarFilamentBuilder<'a> {
    sections: Vec<&'a Section>,
    step: i32,
}

impl<'a> BarFilamentBuilder<'a> {
    /// Use vertical sections no wider than `max_width`.
    pub fn new(sections: &'a [Section], max_width: i32, step: i32) -> Self {
        let mut sections: Vec<&Section> = sections
            .iter()
            .filter(|s| s.orientation == Orientation::Vertical && s.bounds().width <= max_width)
            .collect();
        sections.sort_by_key(|s| s.bounds().x);
        Self { sections, step }
    }

    pub fn build(&self, id: FilamentId, core: &Rect, lookup: &Rect) -> Option<Filament> {
        let mut members: Vec<&Section> = self
            .sections
            .iter()
            .copied()
            .filter(|s| s.intersects(core))
            .collect();
        if members.is_empty() {
            return None;
        }

        let mut candidates: Vec<&Section> = self
            .sections
            .iter()
            .copied()
            .filter(|s| s.intersects(lookup) && !members.iter().any(|m| m.id == s.id))
            .collect();
        loop {
            let before = members.len();
            candidates.retain(|c| {
                if members.iter().any(|m| m.touches(c)) {
                    members.push(*c);
                    false
                } else {
                    true
                }
            });
            if members.len() == before {
                break;
            }
        }

        Some(Filament::new(
            id,
            Orientation::Vertical,
            self.step,
            members.into_iter().cloned().collect(),
        ))
    }
}
