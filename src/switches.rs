use serde::{Deserialize, Serialize};

/// Book-level switches altering what the grid stage looks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSwitches {
    /// Staves are 6-line tablatures.
    pub six_string_tablatures: bool,
    /// Staves are 4-line tablatures (ignored when six-string is set).
    pub four_string_tablatures: bool,
    /// One-line (percussion) staves may exist.
    pub one_line_staves: bool,
    /// Every system holds a single part.
    pub force_single_part: bool,
    /// Every staff is its own part, even within a braced pair.
    pub force_separate_parts: bool,
    /// Beams may cover stems ending on staff lines (used by later stages).
    pub beam_umbrella: bool,
    /// Expected barline height on one-line staves.
    pub one_line_barline_height: BarlineHeight,
}

/// Barline height around a one-line staff, in interlines.
///
/// The `*Then*` variants allow the very first barline of the staff to be
/// only half as high as the following ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarlineHeight {
    #[default]
    Four,
    TwoThenFour,
    Two,
    OneThenTwo,
}

impl BarlineHeight {
    /// Height of standard barlines, in interlines.
    pub fn count(self) -> i32 {
        match self {
            BarlineHeight::Four | BarlineHeight::TwoThenFour => 4,
            BarlineHeight::Two | BarlineHeight::OneThenTwo => 2,
        }
    }

    /// True when the first barline may be half high.
    pub fn has_half_start(self) -> bool {
        matches!(self, BarlineHeight::TwoThenFour | BarlineHeight::OneThenTwo)
    }
}

impl ProcessingSwitches {
    /// Line counts expected for standard clusters.
    pub fn comb_sizes(&self) -> std::collections::BTreeSet<usize> {
        let mut sizes = std::collections::BTreeSet::new();
        if self.six_string_tablatures {
            sizes.insert(6);
        } else if self.four_string_tablatures {
            sizes.insert(4);
        } else {
            sizes.insert(5);
        }
        if self.one_line_staves {
            sizes.insert(1);
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comb_sizes_follow_switches() {
        let mut switches = ProcessingSwitches::default();
        assert_eq!(switches.comb_sizes().into_iter().collect::<Vec<_>>(), vec![5]);
        switches.four_string_tablatures = true;
        switches.one_line_staves = true;
        assert_eq!(switches.comb_sizes().into_iter().collect::<Vec<_>>(), vec![1, 4]);
        switches.six_string_tablatures = true;
        assert_eq!(switches.comb_sizes().into_iter().collect::<Vec<_>>(), vec![1, 6]);
    }

    #[test]
    fn barline_height_parses_from_json() {
        let switches: ProcessingSwitches =
            serde_json::from_str(r#"{"one_line_barline_height": "one_then_two"}"#).unwrap();
        assert_eq!(switches.one_line_barline_height, BarlineHeight::OneThenTwo);
        assert_eq!(switches.one_line_barline_height.count(), 2);
        assert!(switches.one_line_barline_height.has_half_start());
        assert!(!BarlineHeight::default().has_half_start());
    }
}
