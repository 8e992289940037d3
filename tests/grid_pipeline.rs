mod common;

use common::synthetic_score::{scale, SyntheticScore, INTERLINE, LEFT, RIGHT};
use staff_grid::image::BinaryImage;
use staff_grid::types::Rect;
use staff_grid::{GridBuilder, GridError, GridParams, GridReport, Scale};

const WIDTH: usize = 1000;
const HEIGHT: usize = 450;
const TOPS: [i32; 2] = [100, 250];
/// Barlines sit inside the staff lines, away from both staff ends.
const BAR_LEFT: i32 = LEFT + INTERLINE;
const BAR_RIGHT: i32 = RIGHT - INTERLINE - 3;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn builder() -> GridBuilder {
    GridBuilder::new(GridParams::default())
}

fn bars(score: SyntheticScore, first: usize, last: usize) -> SyntheticScore {
    score.barline(BAR_LEFT, first, last).barline(BAR_RIGHT, first, last)
}

fn two_staves() -> SyntheticScore {
    SyntheticScore::new(WIDTH, HEIGHT).staff(TOPS[0]).staff(TOPS[1])
}

#[test]
fn empty_image_is_rejected() {
    init_logger();
    let err = builder().process(&BinaryImage::new(0, 0), scale()).unwrap_err();
    assert_eq!(err, GridError::EmptyImage { width: 0, height: 0 });
}

#[test]
fn invalid_scale_is_rejected() {
    init_logger();
    let image = two_staves().build();
    let err = builder().process(&image, Scale::new(2, 2.0)).unwrap_err();
    assert!(matches!(err, GridError::InvalidScale(_)));
}

#[test]
fn blank_page_has_no_music() {
    init_logger();
    let image = BinaryImage::new(WIDTH, HEIGHT);
    let err = builder().process(&image, scale()).unwrap_err();
    assert!(err.is_sheet_removal());
}

#[test]
fn single_staff_gives_one_system() {
    init_logger();
    let image = bars(SyntheticScore::new(WIDTH, 250).staff(TOPS[0]), 0, 0).build();
    let grid = builder().process(&image, scale()).expect("grid");

    assert_eq!(grid.staves.len(), 1);
    assert_eq!(grid.staves.staves()[0].line_count(), 5);
    assert_eq!(grid.systems.len(), 1);
    assert_eq!(grid.systems[0].staves, vec![0]);
    assert_eq!(grid.systems[0].parts.len(), 1);
    assert!(!grid.staff_peaks[0].is_empty());
}

#[test]
fn connected_barlines_give_one_system_with_two_parts() {
    init_logger();
    let image = bars(two_staves(), 0, 1).build();
    let grid = builder().process(&image, scale()).expect("grid");

    assert_eq!(grid.staves.len(), 2);
    assert_eq!(grid.systems.len(), 1);
    assert_eq!(grid.systems[0].staves, vec![0, 1]);
    assert_eq!(grid.systems[0].parts.len(), 2);
    assert_eq!(grid.system_of(1), Some(0));
}

#[test]
fn forced_single_part_gathers_the_system() {
    init_logger();
    let image = bars(two_staves(), 0, 1).build();
    let mut params = GridParams::default();
    params.switches.force_single_part = true;
    let grid = GridBuilder::new(params).process(&image, scale()).expect("grid");

    assert_eq!(grid.systems.len(), 1);
    let parts = &grid.systems[0].parts;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].staves.len(), 2);
}

#[test]
fn joining_stroke_is_a_connection() {
    init_logger();
    let image = two_staves().end_barlines(0, 1).build();
    let grid = builder().process(&image, scale()).expect("grid");

    let joined = grid.graph.connections().into_iter().any(|e| {
        let (top, bottom) = (grid.graph.peak(e.top), grid.graph.peak(e.bottom));
        top.staff == 0 && bottom.staff == 1 && top.start <= LEFT && LEFT <= top.stop
    });
    assert!(joined);
    assert_eq!(grid.systems.len(), 1);
}

#[test]
fn c_clef_strokes_are_purged() {
    init_logger();
    let mut score = SyntheticScore::new(WIDTH, 250).staff(TOPS[0]).end_barlines(0, 0);
    let height = score.staff_bottom(0) - TOPS[0];
    score.image.fill_rect(Rect::new(LEFT + 30, TOPS[0], 8, height));
    score.image.fill_rect(Rect::new(LEFT + 41, TOPS[0], 3, height));
    let grid = builder().process(&score.build(), scale()).expect("grid");

    let starts: Vec<i32> = grid.staff_peaks[0].iter().map(|&p| grid.graph.peak(p).start).collect();
    assert!(starts.contains(&LEFT));
    assert!(starts.iter().all(|&x| !(LEFT + 25..=LEFT + 50).contains(&x)), "{starts:?}");
}

#[test]
fn separate_barlines_give_two_systems() {
    init_logger();
    let score = bars(bars(two_staves(), 0, 0), 1, 1);
    let grid = builder().process(&score.build(), scale()).expect("grid");

    assert_eq!(grid.systems.len(), 2);
    assert_eq!(grid.systems[0].staves, vec![0]);
    assert_eq!(grid.systems[1].staves, vec![1]);
    assert_eq!(grid.system_of(1), Some(1));
}

#[test]
fn batch_drops_failed_sheets_and_keeps_indices() {
    init_logger();
    let good = bars(two_staves(), 0, 1).build();
    let sheets = vec![
        (BinaryImage::new(WIDTH, HEIGHT), scale()),
        (good, scale()),
        (BinaryImage::new(0, 0), scale()),
    ];
    let grids = builder().process_batch(&sheets);

    assert_eq!(grids.len(), 1);
    assert_eq!(grids[0].0, 1);
    assert_eq!(grids[0].1.systems.len(), 1);
}

#[test]
fn report_serializes_staves_and_systems() {
    init_logger();
    let image = bars(two_staves(), 0, 1).build();
    let grid = builder().process(&image, scale()).expect("grid");
    let report = GridReport::from_grid(&grid);

    assert_eq!(report.staves.len(), 2);
    assert_eq!(report.systems.len(), 1);
    assert_eq!(report.systems[0].staves, vec![1, 2]);

    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["input"]["interline"], 20);
    assert_eq!(json["staves"][0]["lineCount"], 5);
    assert!(json["systems"][0]["columnCount"].is_number());
    assert!(json["timings"]["totalMs"].is_number());
}
