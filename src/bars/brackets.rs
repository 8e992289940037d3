//! Bracket ends (serifs) and bracket middles.

use super::peak::{PeakFlags, PeakId};
use super::BarsRetriever;
use crate::filament::Filament;
use crate::image::PixelSource;
use crate::sections::{Section, SectionId};
use crate::types::{Orientation, Rect, VerticalSide};
use log::debug;
use nalgebra::Point2;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Split sections into groups of mutually touching sections.
fn touching_groups(mut sections: Vec<Section>) -> Vec<Vec<Section>> {
    let mut groups = Vec::new();
    while let Some(seed) = sections.pop() {
        let mut group = vec![seed];
        while let Some(index) = sections
            .iter()
            .position(|s| group.iter().any(|g| g.touches(s)))
        {
            group.push(sections.swap_remove(index));
        }
        groups.push(group);
    }
    groups
}

fn group_weight(group: &[Section]) -> i32 {
    group.iter().map(Section::weight).sum()
}

fn group_centroid(group: &[Section]) -> Point2<f64> {
    let weight = group_weight(group) as f64;
    if weight == 0.0 {
        return Point2::origin();
    }
    let sum = group
        .iter()
        .fold(nalgebra::Vector2::zeros(), |acc, s| acc + s.centroid().coords * s.weight() as f64);
    Point2::from(sum / weight)
}

/// Keep the groups closest to `vertex` until their cumulated weight
/// reaches `min_weight`; all of them if it never does.
fn closest_groups(mut groups: Vec<Vec<Section>>, vertex: Point2<f64>, min_weight: i32) -> Vec<Vec<Section>> {
    if groups.len() <= 1 {
        return groups;
    }
    groups.sort_by(|a, b| {
        let (da, db) = (
            (group_centroid(a) - vertex).norm(),
            (group_centroid(b) - vertex).norm(),
        );
        da.partial_cmp(&db).unwrap_or(Ordering::Equal)
    });
    let mut total = 0;
    for i in 0..groups.len() {
        total += group_weight(&groups[i]);
        if total >= min_weight {
            groups.truncate(i + 1);
            break;
        }
    }
    groups
}

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Flag as bracket ends the wide enough peaks left of the start peak
    /// that barely extend beyond the staff and carry a serif.
    pub(super) fn detect_bracket_ends(&mut self) {
        let half_line = self.half_line();
        for staves in self.multi_staff_systems() {
            for staff in staves {
                let Some(i_start) = self.projectors[staff].start_peak_index(&self.graph) else {
                    continue;
                };
                let peaks = self.projectors[staff].peaks().to_vec();
                for i in (0..i_start).rev() {
                    let peak = peaks[i];
                    if self.graph.peak(peak).is_brace() {
                        break;
                    }
                    if self.graph.peak(peak).width() < self.params.min_bracket_width {
                        continue;
                    }
                    let right = peaks[i + 1];
                    for side in VerticalSide::ALL {
                        let extension = self.graph.peak(peak).extension(side, half_line);
                        if extension > self.params.max_bracket_extension as f64 {
                            continue;
                        }
                        if let Some(serif) = self.serif_of(peak, right, side) {
                            debug!("bars: staff#{} {:?} bracket end {}", staff + 1, side, self.graph.peak(peak));
                            self.graph.peak_mut(peak).set_bracket_end(side, serif);
                        }
                    }
                }
            }
        }
    }

    /// Serif filament found right of the `side` end of `peak`, if heavy
    /// enough.
    fn serif_of(&mut self, peak: PeakId, right: PeakId, side: VerticalSide) -> Option<Filament> {
        let half_line = (self.scale.max_line_thickness as f64 / 2.0).ceil() as i32;
        let bar = self.graph.peak(peak);
        let (width, height) = (self.params.serif_roi_width, self.params.serif_roi_height);
        let y = match side {
            VerticalSide::Top => bar.top - half_line - height,
            VerticalSide::Bottom => bar.bottom + half_line,
        };
        let roi = Rect::new(bar.stop + 1, y, width, height);

        let excluded: HashSet<SectionId> = [bar, self.graph.peak(right)]
            .into_iter()
            .filter_map(|p| p.filament.as_ref())
            .flat_map(|f| f.sections().iter().map(|s| s.id))
            .collect();
        let sections: Vec<Section> = self
            .lags
            .horizontal
            .iter()
            .chain(&self.lags.vertical)
            .filter(|s| !excluded.contains(&s.id) && s.intersects(&roi))
            .cloned()
            .collect();
        if sections.is_empty() {
            return None;
        }

        let vertex = Point2::new(
            roi.x as f64,
            match side {
                VerticalSide::Top => roi.bottom() as f64,
                VerticalSide::Bottom => roi.y as f64,
            },
        );
        let groups = closest_groups(touching_groups(sections), vertex, self.params.serif_min_weight);
        let id = self.next_filament_id();
        let serif = Filament::new(
            id,
            Orientation::Horizontal,
            1,
            groups.into_iter().flatten().collect(),
        );
        if serif.weight() < self.params.serif_min_weight {
            debug!(
                "bars: serif of peak {:?} too light {} vs {}",
                peak,
                serif.weight(),
                self.params.serif_min_weight
            );
            return None;
        }
        Some(serif)
    }

    /// Follow connections down from each bracket top and flag the peaks met
    /// as bracket middles, until a bracket bottom.
    pub(super) fn detect_bracket_middles(&mut self) {
        for staves in self.multi_staff_systems() {
            for staff in staves {
                let tops: Vec<PeakId> = self.projectors[staff]
                    .peaks()
                    .iter()
                    .copied()
                    .filter(|&p| self.graph.peak(p).is_bracket_end(VerticalSide::Top))
                    .collect();
                'tops: for top in tops {
                    let mut peak = top;
                    loop {
                        let below: Vec<PeakId> = self
                            .graph
                            .outgoing(peak)
                            .into_iter()
                            .filter(|e| e.is_connection())
                            .map(|e| e.bottom)
                            .collect();
                        let mut next = None;
                        for bottom in below {
                            if self.graph.peak(bottom).is_bracket_end(VerticalSide::Bottom) {
                                continue 'tops;
                            }
                            self.graph.peak_mut(bottom).set(PeakFlags::BRACKET_MIDDLE);
                            next = Some(bottom);
                        }
                        match next {
                            Some(n) => peak = n,
                            None => break,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_sections_are_grouped() {
        let sections = vec![
            Section::horizontal_bar(1, 10, 10, 8, 2),
            Section::horizontal_bar(2, 18, 11, 6, 2),
            Section::horizontal_bar(3, 60, 10, 5, 2),
        ];
        let mut sizes: Vec<usize> = touching_groups(sections).iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn closest_groups_stop_at_min_weight() {
        let near = vec![Section::horizontal_bar(1, 10, 10, 10, 2)];
        let far = vec![Section::horizontal_bar(2, 40, 30, 10, 2)];
        let vertex = Point2::new(10.0, 10.0);

        let kept = closest_groups(vec![far.clone(), near.clone()], vertex, 15);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0][0].id, SectionId(1));

        let kept = closest_groups(vec![far, near], vertex, 100);
        assert_eq!(kept.len(), 2);
    }
}
