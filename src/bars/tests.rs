use super::*;
use crate::filament::Filament;
use crate::image::BinaryImage;
use crate::sections::{build_lags, LagOptions, LagParams, Lags, Section};
use crate::staff::{Staff, StaffId, StaffLine};
use crate::system::{GroupSymbol, PartGroup};
use crate::types::{Orientation, Rect, VerticalSide};

const INTERLINE: i32 = 20;
const LEFT: i32 = 40;
const RIGHT: i32 = 258;
const STAFF_TOPS: [i32; 2] = [50, 200];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scale() -> Scale {
    Scale::new(INTERLINE, 2.0)
}

/// Two five-line staves, one above the other.
fn two_staves() -> (BinaryImage, StaffManager) {
    let mut img = BinaryImage::new(300, 340);
    let mut staves = Vec::new();
    for (s, &top) in STAFF_TOPS.iter().enumerate() {
        let mut lines = Vec::new();
        for i in 0..5 {
            let y = top + i * INTERLINE;
            let id = (s * 5) as u32 + i as u32;
            img.fill_rect(Rect::new(LEFT, y, RIGHT - LEFT + 1, 2));
            let section = Section::horizontal_bar(id, LEFT, y, RIGHT - LEFT + 1, 2);
            let fil = Filament::new(FilamentId(id), Orientation::Horizontal, 10, vec![section]);
            lines.push(StaffLine::from_filament(&fil));
        }
        staves.push(Staff::new(StaffId(s as u32 + 1), LEFT as f64, RIGHT as f64, INTERLINE, lines));
    }
    (img, StaffManager::new(staves))
}

/// Two staves joined by barlines at both ends.
fn connected_staves() -> (BinaryImage, StaffManager) {
    let (mut img, staves) = two_staves();
    let height = STAFF_TOPS[1] + 4 * INTERLINE + 2 - STAFF_TOPS[0];
    img.fill_rect(Rect::new(LEFT, STAFF_TOPS[0], 3, height));
    img.fill_rect(Rect::new(RIGHT - 1, STAFF_TOPS[0], 3, height));
    (img, staves)
}

fn lags_of(img: &BinaryImage) -> Lags {
    build_lags(img, &LagParams::new(&LagOptions::default(), &scale()))
}

/// Run every phase but keep the retriever for inspection.
fn run_phases<'a>(img: &'a BinaryImage, lags: &'a Lags, staves: StaffManager) -> BarsRetriever<'a, BinaryImage> {
    let mut retriever =
        BarsRetriever::new(img, lags, staves, Skew::default(), scale(), BarsSettings::default()).with_filament_base(100);
    retriever.run().unwrap();
    retriever
}

/// Parts of each system cover its staves in order, without gap or overlap.
fn assert_parts_partition_staves(retriever: &BarsRetriever<'_, BinaryImage>) {
    for system in &retriever.systems {
        let expected: Vec<StaffId> = system.staves.iter().map(|&s| retriever.staves.staves()[s].id).collect();
        let covered: Vec<StaffId> = system.parts.iter().flat_map(|p| p.staves.iter().copied()).collect();
        assert_eq!(covered, expected, "parts of system#{}", system.id);
    }
}

fn retrieve(img: &BinaryImage, staves: StaffManager) -> Result<BarsOutcome> {
    let lags = build_lags(img, &LagParams::new(&LagOptions::default(), &scale()));
    BarsRetriever::new(img, &lags, staves, Skew::default(), scale(), BarsSettings::default())
        .with_filament_base(100)
        .process()
}

#[test]
fn no_staff_means_no_system() {
    init_logger();
    let img = BinaryImage::new(100, 100);
    let err = retrieve(&img, StaffManager::default()).unwrap_err();
    assert!(matches!(err, GridError::NoSystems { staves: 0 }));
}

#[test]
fn connected_barlines_join_staves() {
    init_logger();
    let (mut img, staves) = two_staves();
    let height = STAFF_TOPS[1] + 4 * INTERLINE + 2 - STAFF_TOPS[0];
    img.fill_rect(Rect::new(LEFT, STAFF_TOPS[0], 3, height));
    img.fill_rect(Rect::new(RIGHT - 1, STAFF_TOPS[0], 3, height));

    let outcome = retrieve(&img, staves).unwrap();
    assert_eq!(outcome.systems.len(), 1);
    assert_eq!(outcome.systems[0].staves, vec![0, 1]);
    assert_eq!(outcome.system_of(1), Some(0));
}

#[test]
fn staff_barlines_keep_staves_apart() {
    init_logger();
    let (mut img, staves) = two_staves();
    for &top in &STAFF_TOPS {
        img.fill_rect(Rect::new(LEFT, top, 3, 4 * INTERLINE + 2));
        img.fill_rect(Rect::new(RIGHT - 1, top, 3, 4 * INTERLINE + 2));
    }

    let outcome = retrieve(&img, staves).unwrap();
    assert_eq!(outcome.systems.len(), 2);
    assert_eq!(outcome.systems[0].staves, vec![0]);
    assert_eq!(outcome.systems[1].staves, vec![1]);
    assert_eq!(outcome.system_of(1), Some(1));
}

#[test]
fn true_brace_group_becomes_one_part() {
    init_logger();
    let (img, staves) = connected_staves();
    let lags = lags_of(&img);
    let mut retriever = run_phases(&img, &lags, staves);
    assert_parts_partition_staves(&retriever);

    let mut brace = PartGroup::new(1, GroupSymbol::Brace, true, StaffId(1));
    brace.last_staff = StaffId(2);
    for separate in [false, true] {
        retriever.settings.switches.force_separate_parts = separate;
        retriever.systems[0].parts.clear();
        retriever.systems[0].groups = vec![brace.clone()];
        retriever.create_parts();

        let system = &retriever.systems[0];
        if separate {
            assert_eq!(system.parts.len(), 2);
            assert_eq!(system.groups, vec![brace.clone()]);
        } else {
            assert_eq!(system.parts.len(), 1);
            assert_eq!(system.parts[0].staves, vec![StaffId(1), StaffId(2)]);
            assert!(!system.parts[0].merged);
            assert!(system.groups.is_empty());
        }
        assert_parts_partition_staves(&retriever);
    }
}

#[test]
fn serifed_bracket_makes_bracket_group() {
    init_logger();
    let (mut img, staves) = connected_staves();
    let (x, width) = (28, 6);
    let top = STAFF_TOPS[0] - 6;
    let bottom = STAFF_TOPS[1] + 4 * INTERLINE + 1 + 6;
    img.fill_rect(Rect::new(x, top, width, bottom - top + 1));
    img.fill_rect(Rect::new(x + width, top, 50, 2));
    img.fill_rect(Rect::new(x + width, bottom - 1, 50, 2));
    let lags = lags_of(&img);
    let retriever = run_phases(&img, &lags, staves);

    let bracket = |staff: usize| {
        retriever.projectors[staff]
            .peaks()
            .iter()
            .map(|&p| retriever.graph.peak(p))
            .find(|p| p.stop < LEFT)
            .unwrap()
    };
    let (upper, lower) = (bracket(0), bracket(1));
    assert!(upper.is_bracket_end(VerticalSide::Top));
    assert!(!upper.is_bracket_end(VerticalSide::Bottom));
    assert!(lower.is_bracket_end(VerticalSide::Bottom));
    assert!(!lower.is_bracket_end(VerticalSide::Top));
    assert!(upper.is(PeakFlags::BRACKET_TOP) && lower.is(PeakFlags::BRACKET_BOTTOM));

    let system = &retriever.systems[0];
    assert_eq!(system.groups.len(), 1);
    let group = &system.groups[0];
    assert_eq!(group.symbol, GroupSymbol::Bracket);
    assert_eq!((group.first_staff, group.last_staff), (StaffId(1), StaffId(2)));
    assert_eq!(system.parts.len(), 2);
    assert_parts_partition_staves(&retriever);
}
