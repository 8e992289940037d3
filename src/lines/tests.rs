use super::clusters::best_match;
use super::*;
use crate::sections::Section;
use crate::types::Orientation;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Arena of straight 2-pixel thick horizontal filaments.
struct Lines {
    arena: FilamentArena,
    ids: Vec<FilamentId>,
}

impl Lines {
    fn new() -> Self {
        Self {
            arena: FilamentArena::new(),
            ids: Vec::new(),
        }
    }

    fn add(&mut self, x: i32, y: i32, length: i32) -> FilamentId {
        let section = Section::horizontal_bar(self.ids.len() as u32, x, y, length, 2);
        let id = self.arena.create(Orientation::Horizontal, 10, vec![section]);
        self.ids.push(id);
        id
    }

    fn staff(&mut self, ys: [i32; 5]) -> Vec<FilamentId> {
        ys.iter().map(|&y| self.add(100, y, 801)).collect()
    }
}

fn scale() -> Scale {
    Scale::new(20, 2.0).with_interline_range(18, 22)
}

fn retriever(switches: &ProcessingSwitches, scale: Scale) -> LinesRetriever {
    LinesRetriever::new(
        &LinesOptions::default(),
        &ClusterOptions::default(),
        switches,
        scale,
        1000,
    )
}

#[test]
fn two_noisy_staves_give_two_clusters() {
    init_logger();
    let mut lines = Lines::new();
    let top = lines.staff([100, 121, 140, 159, 180]);
    let bottom = lines.staff([300, 319, 341, 360, 380]);

    let outcome = retriever(&ProcessingSwitches::default(), scale())
        .retrieve(&mut lines.arena, lines.ids.clone())
        .expect("staves");

    let staves = outcome.staves.staves();
    assert_eq!(staves.len(), 2);
    assert!(staves.iter().all(|s| s.line_count() == 5));
    let first: Vec<FilamentId> = staves[0].lines().iter().map(|l| l.filament).collect();
    let second: Vec<FilamentId> = staves[1].lines().iter().map(|l| l.filament).collect();
    assert_eq!(first, top);
    assert_eq!(second, bottom);
    assert_eq!(staves[0].id, StaffId(1));
    assert!((staves[0].left() - 100.0).abs() < 1e-9);
    assert!((staves[0].right() - 900.0).abs() < 1e-9);
    assert!(outcome.discarded.is_empty());
    assert!(outcome.comb_count > 0);
    assert_eq!(outcome.skew.slope(), 0.0);
}

#[test]
fn trimmed_cluster_positions_are_contiguous() {
    init_logger();
    let mut lines = Lines::new();
    // Created bottom-up so that the seed line sits at the bottom.
    let staff: Vec<FilamentId> = [180, 160, 140, 120, 100]
        .iter()
        .map(|&y| lines.add(100, y, 801))
        .collect();
    let extra = lines.add(300, 80, 301);

    let mut arena = lines.arena.clone();
    let params = ClusterParams::new(&ClusterOptions::default(), &scale(), &scale().interline);
    let outcome = ClustersRetriever::new(
        &mut arena,
        lines.ids.clone(),
        Skew::from_slope(0.0),
        params,
        scale().interline,
        1000,
        3,
        BTreeSet::from([5]),
        false,
    )
    .retrieve();

    assert_eq!(outcome.clusters.len(), 1);
    let cluster = &outcome.clusters[0];
    assert_eq!(cluster.positions(), vec![0, 1, 2, 3, 4]);
    let mut expected = staff.clone();
    expected.reverse();
    assert_eq!(cluster.lines().collect::<Vec<_>>(), expected);
    assert_eq!(outcome.discarded, vec![extra]);
}

#[test]
fn clustering_is_repeatable() {
    let mut lines = Lines::new();
    lines.staff([100, 120, 141, 160, 180]);
    lines.staff([400, 420, 440, 461, 480]);
    lines.add(500, 700, 200);

    let run = |lines: &Lines| {
        let mut arena = lines.arena.clone();
        let outcome = retriever(&ProcessingSwitches::default(), scale())
            .retrieve(&mut arena, lines.ids.clone())
            .expect("staves");
        let counts: Vec<usize> = outcome
            .staves
            .staves()
            .iter()
            .map(Staff::line_count)
            .collect();
        (counts, outcome.discarded)
    };
    let first = run(&lines);
    assert_eq!(first.0, vec![5, 5]);
    assert_eq!(first, run(&lines));
}

#[test]
fn too_few_filaments_is_fatal() {
    let mut lines = Lines::new();
    lines.add(100, 100, 500);
    lines.add(100, 120, 500);
    lines.add(100, 140, 500);
    let err = retriever(&ProcessingSwitches::default(), scale())
        .retrieve(&mut lines.arena, lines.ids.clone())
        .unwrap_err();
    assert!(matches!(err, GridError::NoStaffLines { kept: 3, min: 5 }));
    assert!(err.is_sheet_removal());
}

#[test]
fn one_line_staves_away_from_standard_staves() {
    init_logger();
    let mut lines = Lines::new();
    lines.staff([100, 120, 140, 160, 180]);
    let far = lines.add(100, 600, 801);
    let near = lines.add(100, 215, 801);
    let switches = ProcessingSwitches {
        one_line_staves: true,
        ..ProcessingSwitches::default()
    };

    let outcome = retriever(&switches, scale())
        .retrieve(&mut lines.arena, lines.ids.clone())
        .expect("staves");

    let staves = outcome.staves.staves();
    assert_eq!(staves.len(), 2);
    assert_eq!(staves[0].line_count(), 5);
    assert!(staves[1].is_one_line());
    assert_eq!(staves[1].first_line().filament, far);
    assert_eq!(outcome.discarded, vec![near]);
}

#[test]
fn small_interline_staff_found_in_second_pass() {
    init_logger();
    let mut lines = Lines::new();
    lines.staff([100, 120, 140, 160, 180]);
    lines.staff([400, 412, 424, 436, 448]);
    let scale = scale().with_small_interline(InterlineScale::with_range(11, 12, 13));

    let outcome = retriever(&ProcessingSwitches::default(), scale)
        .retrieve(&mut lines.arena, lines.ids.clone())
        .expect("staves");

    let staves = outcome.staves.staves();
    assert_eq!(staves.len(), 2);
    assert!(!staves[0].is_small());
    assert!(staves[1].is_small());
    assert_eq!(staves[1].interline(), 12);
    assert_eq!(staves[1].line_count(), 5);
}

#[test]
fn best_match_finds_line_shift() {
    let one = [Some(10.0), Some(30.0), Some(50.0)];
    let two = [Some(30.5), Some(50.5), None];
    let (dist, delta) = best_match(&one, &two);
    assert_eq!(delta, Some(-1));
    assert!((dist - 0.5).abs() < 1e-9);

    let (dist, delta) = best_match(&[None], &[Some(1.0)]);
    assert_eq!(delta, None);
    assert_eq!(dist, f64::MAX);
}

#[test]
fn comb_index_resolves_ancestors() {
    let mut lines = Lines::new();
    let a = lines.add(0, 10, 50);
    let b = lines.add(0, 30, 50);
    let c = lines.add(60, 30, 50);
    let mut comb = Comb::new(CombId(0), 1, 20);
    comb.append(a, 10.5);
    comb.append(c, 30.5);
    assert_eq!(comb.index_of(&lines.arena, c), Some(1));
    assert_eq!(comb.index_of(&lines.arena, b), None);
    lines.arena.include(b, c);
    assert_eq!(comb.index_of(&lines.arena, b), Some(1));
}
