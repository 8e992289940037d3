use super::*;
use crate::bars::options::ProjectorOptions;
use crate::filament::{Filament, FilamentId};
use crate::image::BinaryImage;
use crate::scale::Scale;
use crate::sections::Section;
use crate::staff::{StaffId, StaffLine};
use crate::types::{Orientation, Rect};

const INTERLINE: i32 = 20;
const FIRST_LINE_Y: i32 = 50;
const WIDTH: usize = 300;
const HEIGHT: usize = 200;

/// Five two-pixel lines drawn from `left` to `right`, plus the matching staff.
fn staff_image(left: i32, right: i32) -> (BinaryImage, Staff) {
    let mut img = BinaryImage::new(WIDTH, HEIGHT);
    let mut lines = Vec::new();
    for i in 0..5 {
        let y = FIRST_LINE_Y + i * INTERLINE;
        img.fill_rect(Rect::new(left, y, right - left + 1, 2));
        let section = Section::horizontal_bar(i as u32, left, y, right - left + 1, 2);
        let fil = Filament::new(FilamentId(i as u32), Orientation::Horizontal, 10, vec![section]);
        lines.push(StaffLine::from_filament(&fil));
    }
    let staff = Staff::new(StaffId(1), left as f64, right as f64, INTERLINE, lines);
    (img, staff)
}

fn projector() -> StaffProjector {
    let scale = Scale::new(INTERLINE, 2.0);
    let params = ProjectorParams::new(&ProjectorOptions::default(), &scale, INTERLINE, false, 0, false);
    StaffProjector::new(0, params, WIDTH as i32, HEIGHT as i32)
}

fn run(img: &BinaryImage, staff: &Staff) -> (StaffProjector, PeakGraph) {
    let mut graph = PeakGraph::new();
    let mut projector = projector();
    projector.process(staff, img, &Skew::default(), &mut graph);
    (projector, graph)
}

#[test]
fn empty_staff_has_no_peak() {
    let (img, staff) = staff_image(40, 259);
    let (projector, graph) = run(&img, &staff);

    assert!(projector.peaks().is_empty());
    assert_eq!(graph.peak_count(), 0);
    assert_eq!(projector.value(100), 8);
    assert_eq!(projector.value(20), 0);
    assert_eq!(projector.blanks(), &[Blank { start: 0, stop: 39 }, Blank { start: 260, stop: 299 }]);
    assert_eq!(projector.start_peak_index(&graph), None);
}

#[test]
fn barline_yields_one_peak() {
    let (mut img, staff) = staff_image(40, 259);
    img.fill_rect(Rect::new(100, FIRST_LINE_Y, 3, 82));
    let (projector, graph) = run(&img, &staff);

    assert_eq!(projector.peaks().len(), 1);
    let peak = graph.peak(projector.peaks()[0]);
    assert_eq!((peak.start, peak.stop), (100, 102));
    assert_eq!((peak.top, peak.bottom), (51, 131));
    assert_eq!(peak.staff, 0);
    assert!(peak.grade() > MIN_INTER_GRADE);
    assert_eq!(projector.value(101), 80);
    assert_eq!(projector.derivative(100), 72);
    assert_eq!(projector.derivative_threshold(), 10);
}

#[test]
fn short_stem_is_not_a_peak() {
    let (mut img, staff) = staff_image(40, 259);
    img.fill_rect(Rect::new(150, FIRST_LINE_Y, 2, 41));
    let (projector, _) = run(&img, &staff);

    assert!(projector.value(150) < 50);
    assert!(projector.peaks().is_empty());
}

#[test]
fn gapped_bar_is_rejected() {
    let (mut img, staff) = staff_image(40, 259);
    img.fill_rect(Rect::new(100, FIRST_LINE_Y, 3, 22));
    img.fill_rect(Rect::new(100, 90, 3, 42));
    let (projector, _) = run(&img, &staff);

    assert!(projector.value(101) >= 50);
    assert!(projector.peaks().is_empty());
}

#[test]
fn standard_blank_lookup() {
    let (img, staff) = staff_image(40, 259);
    let (projector, _) = run(&img, &staff);

    assert!(projector.has_standard_blank(0, 30));
    assert!(!projector.has_standard_blank(100, 200));
    assert!(!projector.has_standard_blank(30, 30));
    assert_eq!(
        projector.select_blank(HorizontalSide::Left, 100, 10),
        Some(Blank { start: 0, stop: 39 })
    );
    assert_eq!(projector.select_blank(HorizontalSide::Left, 100, 50), None);
}

#[test]
fn right_end_snaps_to_final_barline() {
    let (mut img, mut staff) = staff_image(40, 258);
    img.fill_rect(Rect::new(257, FIRST_LINE_Y, 3, 82));
    let (projector, mut graph) = run(&img, &staff);

    assert_eq!(projector.peaks().len(), 1);
    let last = projector.peaks()[0];
    assert_eq!((graph.peak(last).start, graph.peak(last).stop), (257, 259));

    projector.refine_right_end(&mut staff, &mut graph);
    assert_eq!(staff.right(), 258.0);
    assert!(graph.peak(last).is_staff_end(HorizontalSide::Right));
}

#[test]
fn right_end_without_barline_stops_before_blank() {
    let (img, mut staff) = staff_image(40, 259);
    let (projector, mut graph) = run(&img, &staff);

    projector.refine_right_end(&mut staff, &mut graph);
    assert_eq!(staff.right(), 259.0);
}

#[test]
fn peak_list_edits_follow_graph() {
    let (mut img, staff) = staff_image(40, 259);
    img.fill_rect(Rect::new(100, FIRST_LINE_Y, 3, 82));
    let (mut projector, mut graph) = run(&img, &staff);
    let bar = projector.peaks()[0];

    let brace = Peak::new(0, 51, 131, 60, 66, None, &Skew::default());
    let inserted = projector.insert_peak(&mut graph, brace, bar);
    assert_eq!(projector.peaks(), &[inserted, bar]);
    assert_eq!(projector.index_of(bar), Some(1));

    projector.set_brace_peak(Some(inserted));
    projector.remove_peak(&mut graph, inserted);
    assert_eq!(projector.brace_peak(), None);
    assert!(!graph.contains(inserted));
    assert_eq!(projector.last_peak(), Some(bar));
}

#[test]
fn peaks_are_ordered_and_disjoint() {
    let (mut img, staff) = staff_image(40, 259);
    for x in [80, 140, 200] {
        img.fill_rect(Rect::new(x, FIRST_LINE_Y, 3, 82));
    }
    let (projector, graph) = run(&img, &staff);

    let peaks: Vec<&Peak> = projector.peaks().iter().map(|&p| graph.peak(p)).collect();
    assert_eq!(peaks.len(), 3);
    assert!(peaks.iter().all(|p| p.start <= p.stop));
    assert!(peaks.windows(2).all(|w| w[0].stop < w[1].start));
    let starts: Vec<i32> = peaks.iter().map(|p| p.start).collect();
    assert_eq!(starts, vec![80, 140, 200]);
}

#[test]
fn one_line_staff_accepts_half_high_opening_bar() {
    let line_y = 100;
    let (left, right) = (40, 259);
    let mut img = BinaryImage::new(WIDTH, HEIGHT);
    img.fill_rect(Rect::new(left, line_y, right - left + 1, 2));
    let section = Section::horizontal_bar(0, left, line_y, right - left + 1, 2);
    let fil = Filament::new(FilamentId(0), Orientation::Horizontal, 10, vec![section]);
    let staff = Staff::new(StaffId(1), left as f64, right as f64, INTERLINE, vec![StaffLine::from_filament(&fil)]);

    // Opening bar and a later stroke, both half high, then a full bar.
    img.fill_rect(Rect::new(60, 70, 3, 40));
    img.fill_rect(Rect::new(150, 70, 3, 40));
    img.fill_rect(Rect::new(200, 61, 3, 80));

    let scale = Scale::new(INTERLINE, 2.0);
    let params = ProjectorParams::new(&ProjectorOptions::default(), &scale, INTERLINE, true, 4, true);
    assert_eq!(params.bar_threshold, 50);
    let mut projector = StaffProjector::new(0, params, WIDTH as i32, HEIGHT as i32);
    let mut graph = PeakGraph::new();
    projector.process(&staff, &img, &Skew::default(), &mut graph);

    assert_eq!(projector.value(151), 40);
    let spans: Vec<(i32, i32)> = projector
        .peaks()
        .iter()
        .map(|&p| (graph.peak(p).start, graph.peak(p).stop))
        .collect();
    assert_eq!(spans, vec![(60, 62), (200, 202)]);
}
