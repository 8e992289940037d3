use super::*;
use crate::image::BinaryImage;
use crate::scale::Scale;
use crate::types::{Orientation, Rect};

fn params() -> LagParams {
    LagParams::new(&LagOptions::default(), &Scale::new(20, 2.0))
}

#[test]
fn long_vertical_runs_are_taken_out_of_horizontal_lines() {
    let mut img = BinaryImage::new(200, 100);
    // A staff-like line crossed by a barline.
    img.fill_rect(Rect::new(10, 40, 180, 2));
    img.fill_rect(Rect::new(100, 10, 3, 60));

    let lags = build_lags(&img, &params());

    assert_eq!(lags.vertical.len(), 1);
    let bar = &lags.vertical[0];
    assert_eq!(bar.orientation, Orientation::Vertical);
    assert_eq!(bar.bounds(), Rect::new(100, 10, 3, 60));
    assert_eq!(bar.weight(), 180);

    // The line is split on both sides of the barline.
    assert_eq!(lags.horizontal.len(), 2);
    let left = lags
        .horizontal
        .iter()
        .find(|s| s.bounds().x == 10)
        .expect("left part");
    assert_eq!(left.bounds(), Rect::new(10, 40, 90, 2));
    assert_eq!(left.thickness(), 2);
}

#[test]
fn short_horizontal_runs_are_ignored() {
    let mut img = BinaryImage::new(50, 20);
    img.fill_rect(Rect::new(5, 5, 10, 1));
    img.fill_rect(Rect::new(20, 5, 20, 1));
    let lags = build_lags(&img, &params());
    assert_eq!(lags.horizontal.len(), 1);
    assert_eq!(lags.horizontal[0].bounds().x, 20);
}

#[test]
fn incompatible_run_lengths_start_a_new_section() {
    let mut img = BinaryImage::new(200, 20);
    img.fill_rect(Rect::new(10, 5, 100, 1));
    img.fill_rect(Rect::new(10, 6, 30, 1));
    let lags = build_lags(&img, &params());
    assert_eq!(lags.horizontal.len(), 2);
}

#[test]
fn section_queries() {
    let s = Section::horizontal_bar(7, 10, 50, 40, 3);
    assert_eq!(s.bounds(), Rect::new(10, 50, 40, 3));
    assert_eq!(s.span_at(20), Some((50, 52)));
    assert_eq!(s.span_at(60), None);
    assert!(s.contains(49, 52));
    assert!(!s.contains(50, 52));
    assert!(s.intersects(&Rect::new(45, 45, 10, 6)));
    assert_eq!(s.weight_in(&Rect::new(45, 45, 10, 7)), 10);
    let c = s.centroid();
    assert!((c.x - 29.5).abs() < 1e-9 && (c.y - 51.0).abs() < 1e-9);

    let other = Section::horizontal_bar(8, 50, 53, 10, 1);
    assert!(s.touches(&other));
    let far = Section::horizontal_bar(9, 52, 53, 10, 1);
    assert!(!s.touches(&far));
}
