//! Peaks: candidate vertical strokes found in a staff projection.

use crate::filament::Filament;
use crate::grade::GradeImpacts;
use crate::sig::InterId;
use crate::skew::Skew;
use crate::types::{HorizontalSide, Rect, VerticalSide};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PeakId(pub u32);

impl PeakId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Attributes of a peak, as a bitset.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PeakFlags(u16);

impl PeakFlags {
    pub const THIN: Self = Self(1 << 0);
    pub const THICK: Self = Self(1 << 1);
    pub const BRACE: Self = Self(1 << 2);
    pub const BRACE_TOP: Self = Self(1 << 3);
    pub const BRACE_MIDDLE: Self = Self(1 << 4);
    pub const BRACE_BOTTOM: Self = Self(1 << 5);
    pub const BRACKET_TOP: Self = Self(1 << 6);
    pub const BRACKET_MIDDLE: Self = Self(1 << 7);
    pub const BRACKET_BOTTOM: Self = Self(1 << 8);
    pub const CCLEF_ONE: Self = Self(1 << 9);
    pub const CCLEF_TWO: Self = Self(1 << 10);
    pub const CCLEF_TAIL: Self = Self(1 << 11);
    pub const STAFF_LEFT_END: Self = Self(1 << 12);
    pub const STAFF_RIGHT_END: Self = Self(1 << 13);

    const NAMES: [&'static str; 14] = [
        "THIN",
        "THICK",
        "BRACE",
        "BRACE_TOP",
        "BRACE_MIDDLE",
        "BRACE_BOTTOM",
        "BRACKET_TOP",
        "BRACKET_MIDDLE",
        "BRACKET_BOTTOM",
        "CCLEF_ONE",
        "CCLEF_TWO",
        "CCLEF_TAIL",
        "STAFF_LEFT_END",
        "STAFF_RIGHT_END",
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for PeakFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for PeakFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, n)| *n)
            .collect();
        write!(f, "{{{}}}", names.join("|"))
    }
}

/// Impacts of a bar peak.
pub const PEAK_IMPACT_NAMES: &[&str] = &["core", "gap", "start", "stop", "left", "right"];
pub const PEAK_IMPACT_WEIGHTS: &[f64] = &[1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

/// A candidate vertical stroke within one staff.
///
/// Geometry is fixed at creation: abscissae `start..=stop`, ordinates of the
/// first and last staff lines at the peak middle. Attributes evolve while
/// the grid is being assembled.
#[derive(Clone, Debug, Serialize)]
pub struct Peak {
    pub id: PeakId,
    /// Index of the staff in the sheet staff list.
    pub staff: usize,
    pub top: i32,
    pub bottom: i32,
    pub start: i32,
    pub stop: i32,
    pub flags: PeakFlags,
    pub impacts: Option<GradeImpacts>,
    /// Deskewed abscissa of the peak center.
    pub x_dsk: f64,
    #[serde(skip)]
    pub filament: Option<Filament>,
    /// Serif filaments of a bracket end, per vertical side.
    #[serde(skip)]
    pub serifs: [Option<Filament>; 2],
    pub column: Option<u32>,
    pub inter: Option<InterId>,
}

impl Peak {
    pub fn new(
        staff: usize,
        top: i32,
        bottom: i32,
        start: i32,
        stop: i32,
        impacts: Option<GradeImpacts>,
        skew: &Skew,
    ) -> Self {
        let mid = (start + stop) as f64 / 2.0;
        let y = (top + bottom) as f64 / 2.0;
        Self {
            id: PeakId(0),
            staff,
            top,
            bottom,
            start,
            stop,
            flags: PeakFlags::empty(),
            impacts,
            x_dsk: skew.deskewed(mid, y).x,
            filament: None,
            serifs: [None, None],
            column: None,
            inter: None,
        }
    }

    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }

    /// Integer middle abscissa.
    pub fn mid(&self) -> i32 {
        (self.start + self.stop) / 2
    }

    pub fn ordinate(&self, side: VerticalSide) -> i32 {
        match side {
            VerticalSide::Top => self.top,
            VerticalSide::Bottom => self.bottom,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.start, self.top, self.stop, self.bottom)
    }

    pub fn grade(&self) -> f64 {
        self.impacts.as_ref().map_or(0.0, GradeImpacts::grade)
    }

    pub fn is(&self, flag: PeakFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set(&mut self, flag: PeakFlags) {
        self.flags.insert(flag);
    }

    pub fn unset(&mut self, flag: PeakFlags) {
        self.flags.remove(flag);
    }

    pub fn is_brace(&self) -> bool {
        self.flags.intersects(
            PeakFlags::BRACE | PeakFlags::BRACE_TOP | PeakFlags::BRACE_MIDDLE | PeakFlags::BRACE_BOTTOM,
        )
    }

    pub fn is_bracket(&self) -> bool {
        self.flags
            .intersects(PeakFlags::BRACKET_TOP | PeakFlags::BRACKET_MIDDLE | PeakFlags::BRACKET_BOTTOM)
    }

    pub fn is_bracket_end(&self, side: VerticalSide) -> bool {
        self.is(match side {
            VerticalSide::Top => PeakFlags::BRACKET_TOP,
            VerticalSide::Bottom => PeakFlags::BRACKET_BOTTOM,
        })
    }

    pub fn set_bracket_end(&mut self, side: VerticalSide, serif: Filament) {
        let (flag, slot) = match side {
            VerticalSide::Top => (PeakFlags::BRACKET_TOP, 0),
            VerticalSide::Bottom => (PeakFlags::BRACKET_BOTTOM, 1),
        };
        self.set(flag);
        self.serifs[slot] = Some(serif);
    }

    pub fn is_brace_end(&self, side: VerticalSide) -> bool {
        self.is(match side {
            VerticalSide::Top => PeakFlags::BRACE_TOP,
            VerticalSide::Bottom => PeakFlags::BRACE_BOTTOM,
        })
    }

    pub fn is_staff_end(&self, side: HorizontalSide) -> bool {
        self.is(staff_end_flag(side))
    }

    pub fn set_staff_end(&mut self, side: HorizontalSide) {
        self.set(staff_end_flag(side));
    }

    /// Vertical extension of the bar stick beyond the staff on `side`,
    /// half a line thickness being tolerated. Zero without stick.
    pub fn extension(&self, side: VerticalSide, half_line: f64) -> f64 {
        let Some(fil) = &self.filament else {
            return 0.0;
        };
        let b = fil.bounds();
        match side {
            VerticalSide::Top => self.top as f64 - half_line - b.y as f64,
            VerticalSide::Bottom => b.bottom() as f64 - half_line - self.bottom as f64,
        }
    }

    /// True when abscissa ranges overlap.
    pub fn overlaps(&self, other: &Peak) -> bool {
        self.start.max(other.start) <= self.stop.min(other.stop)
    }
}

fn staff_end_flag(side: HorizontalSide) -> PeakFlags {
    match side {
        HorizontalSide::Left => PeakFlags::STAFF_LEFT_END,
        HorizontalSide::Right => PeakFlags::STAFF_RIGHT_END,
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Peak#{}(staff#{} x:{}-{} y:{}-{} {:?})",
            self.id.0,
            self.staff + 1,
            self.start,
            self.stop,
            self.top,
            self.bottom,
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_behave_as_a_set() {
        let mut flags = PeakFlags::empty();
        flags.insert(PeakFlags::THICK | PeakFlags::STAFF_LEFT_END);
        assert!(flags.contains(PeakFlags::THICK));
        assert!(!flags.contains(PeakFlags::THIN));
        flags.remove(PeakFlags::THICK);
        assert!(!flags.intersects(PeakFlags::THICK));
        assert_eq!(format!("{flags:?}"), "{STAFF_LEFT_END}");
    }

    #[test]
    fn peak_kinds() {
        let mut peak = Peak::new(0, 100, 180, 50, 53, None, &Skew::default());
        assert_eq!(peak.width(), 4);
        assert!((peak.x_dsk - 51.5).abs() < 1e-9);
        assert!(!peak.is_brace());
        peak.set(PeakFlags::BRACE_BOTTOM);
        assert!(peak.is_brace());
        assert!(peak.is_brace_end(VerticalSide::Bottom));
        peak.set_staff_end(HorizontalSide::Left);
        assert!(peak.is_staff_end(HorizontalSide::Left));
        assert_eq!(peak.extension(VerticalSide::Top, 1.0), 0.0);
    }
}
