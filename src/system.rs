//! Systems, parts and part groups.

use crate::sig::Sig;
use crate::staff::StaffId;
use serde::Serialize;
use std::fmt;

/// Symbol gathering the staves of a part group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSymbol {
    Bracket,
    Square,
    Brace,
}

/// Staff range sharing one bracket, square or brace symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartGroup {
    /// Nesting level, 1 being the closest to the staves.
    pub level: usize,
    pub symbol: GroupSymbol,
    /// Barlines are connected below the first staff.
    pub connected_below: bool,
    pub first_staff: StaffId,
    pub last_staff: StaffId,
}

impl PartGroup {
    pub fn new(level: usize, symbol: GroupSymbol, connected_below: bool, first_staff: StaffId) -> Self {
        Self {
            level,
            symbol,
            connected_below,
            first_staff,
            last_staff: first_staff,
        }
    }

    pub fn staff_count(&self) -> usize {
        (self.last_staff.0 - self.first_staff.0 + 1) as usize
    }

    pub fn contains(&self, staff: StaffId) -> bool {
        self.first_staff <= staff && staff <= self.last_staff
    }
}

impl fmt::Display for PartGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PartGroup({:?} level:{} staves:{}-{})",
            self.symbol, self.level, self.first_staff.0, self.last_staff.0
        )
    }
}

/// Staves played by one instrument.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Part {
    /// 1-based rank within the system.
    pub id: u32,
    pub staves: Vec<StaffId>,
    /// Two staves drawn as one 11-line grand staff.
    pub merged: bool,
}

impl Part {
    pub fn first_staff(&self) -> Option<StaffId> {
        self.staves.first().copied()
    }

    pub fn last_staff(&self) -> Option<StaffId> {
        self.staves.last().copied()
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.staves.iter().map(|s| s.0.to_string()).collect();
        write!(f, "Part#{}[{}]", self.id, ids.join(","))
    }
}

/// Staves played together, with their parts, groups and interpretations.
#[derive(Clone, Debug, Serialize)]
pub struct SystemInfo {
    /// 1-based rank in the sheet.
    pub id: u32,
    /// Indices in the sheet staff list, top down.
    pub staves: Vec<usize>,
    pub parts: Vec<Part>,
    pub groups: Vec<PartGroup>,
    pub sig: Sig,
}

impl SystemInfo {
    pub fn new(id: u32, staves: Vec<usize>) -> Self {
        Self {
            id,
            staves,
            parts: Vec::new(),
            groups: Vec::new(),
            sig: Sig::new(),
        }
    }

    pub fn is_multi_staff(&self) -> bool {
        self.staves.len() > 1
    }

    pub fn first_staff(&self) -> Option<usize> {
        self.staves.first().copied()
    }

    pub fn last_staff(&self) -> Option<usize> {
        self.staves.last().copied()
    }

    /// Position of a sheet staff within the system.
    pub fn position_of(&self, staff: usize) -> Option<usize> {
        self.staves.iter().position(|&s| s == staff)
    }

    pub fn contains(&self, staff: usize) -> bool {
        self.staves.contains(&staff)
    }
}

impl fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "System#{}({} staves)", self.id, self.staves.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_spans_staves() {
        let mut group = PartGroup::new(1, GroupSymbol::Brace, true, StaffId(3));
        assert_eq!(group.staff_count(), 1);
        group.last_staff = StaffId(4);
        assert_eq!(group.staff_count(), 2);
        assert!(group.contains(StaffId(4)));
        assert!(!group.contains(StaffId(5)));
        assert_eq!(group.to_string(), "PartGroup(Brace level:1 staves:3-4)");
    }

    #[test]
    fn system_positions() {
        let system = SystemInfo::new(2, vec![4, 5, 6]);
        assert!(system.is_multi_staff());
        assert_eq!(system.position_of(5), Some(1));
        assert_eq!(system.first_staff(), Some(4));
        assert_eq!(system.last_staff(), Some(6));
        assert!(!system.contains(3));
    }
}
