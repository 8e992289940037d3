use super::fit::fit_quadratic;
use super::*;
use crate::scale::Scale;
use crate::sections::{Run, SectionId};

fn hline(id: u32, x: i32, y: i32, len: i32) -> Section {
    Section::horizontal_bar(id, x, y, len, 2)
}

#[test]
fn polyline_follows_sections_and_extrapolates() {
    let mut arena = FilamentArena::new();
    let id = arena.create(Orientation::Horizontal, 20, vec![hline(0, 100, 50, 201)]);
    let fil = arena.get(id);
    assert_eq!(fil.length(), 201);
    assert_eq!(fil.true_length(), 201);
    assert!((fil.y_at(150.0) - 50.5).abs() < 1e-9);
    assert!((fil.y_at(0.0) - 50.5).abs() < 1e-9);
    assert!((fil.mean_thickness() - 2.0).abs() < 1e-9);
    assert!(fil.curvature_radius().is_infinite());
    assert!(fil.rotation() < 1e-9);
}

#[test]
fn true_length_ignores_holes() {
    let mut arena = FilamentArena::new();
    let a = arena.create(Orientation::Horizontal, 10, vec![hline(0, 0, 10, 50)]);
    let b = arena.create(Orientation::Horizontal, 10, vec![hline(1, 80, 10, 20)]);
    let root = arena.include(a, b);
    assert_eq!(root, a);
    let fil = arena.get(a);
    assert_eq!(fil.length(), 100);
    assert_eq!(fil.true_length(), 70);
}

#[test]
fn ancestry_is_compressed_and_acyclic() {
    let mut arena = FilamentArena::new();
    let ids: Vec<FilamentId> = (0..4)
        .map(|i| arena.create(Orientation::Horizontal, 10, vec![hline(i, 10 * i as i32, 0, 8)]))
        .collect();
    arena.include(ids[1], ids[0]);
    arena.include(ids[2], ids[1]);
    arena.include(ids[3], ids[2]);
    assert_eq!(arena.ancestor(ids[0]), ids[3]);
    assert_eq!(arena.find(ids[0]), ids[3]);
    // Merging into itself or into a descendant never creates a cycle.
    assert_eq!(arena.include(ids[0], ids[3]), ids[3]);
    assert_eq!(arena.roots(), vec![ids[3]]);
    assert_eq!(arena.resolved(ids[1]).sections().len(), 4);
}

#[test]
fn thickness_of_compound() {
    let mut arena = FilamentArena::new();
    let a = arena.create(Orientation::Horizontal, 10, vec![hline(0, 0, 10, 50)]);
    let b = arena.create(Orientation::Horizontal, 10, vec![hline(1, 20, 13, 50)]);
    assert_eq!(arena.thickness_at(30, &[a, b]), 5);
    assert_eq!(arena.thickness_at(5, &[a, b]), 2);
    assert_eq!(arena.thickness_at(200, &[a, b]), 0);
}

#[test]
fn factory_joins_collinear_pieces() {
    let scale = Scale::new(20, 2.0);
    let factory = FilamentFactory::new(FilamentParams::new(&FilamentOptions::default(), &scale));
    let sections = vec![
        hline(0, 100, 200, 300),
        hline(1, 410, 200, 300),
        // Another line one interline below.
        hline(2, 100, 220, 300),
        // Too short to seed anything.
        hline(3, 900, 400, 10),
    ];
    let mut arena = FilamentArena::new();
    let ids = factory.build(&mut arena, &sections);
    assert_eq!(ids.len(), 2);
    let long = ids
        .iter()
        .map(|&id| arena.get(id))
        .find(|f| f.length() > 500)
        .expect("joined filament");
    assert_eq!(long.start_coord(), 100);
    assert_eq!(long.stop_coord(), 709);
    assert_eq!(long.true_length(), 600);
}

#[test]
fn bar_builder_extends_into_lookup_area() {
    let sections = vec![
        Section::vertical_bar(0, 50, 100, 80, 3),
        // Serif-like piece touching the bar top, outside the core.
        Section::new(
            SectionId(1),
            Orientation::Vertical,
            53,
            vec![Run::new(96, 6), Run::new(96, 6)],
        ),
        // Unrelated stem further right.
        Section::vertical_bar(2, 80, 100, 80, 2),
    ];
    let builder = BarFilamentBuilder::new(&sections, 6, 20);
    let core = Rect::new(49, 110, 5, 60);
    let lookup = core.grow(5, 40);
    let fil = builder
        .build(FilamentId(0), &core, &lookup)
        .expect("bar filament");
    assert_eq!(fil.sections().len(), 2);
    assert_eq!(fil.bounds(), Rect::new(50, 96, 5, 84));
    assert!((fil.x_at(140.0) - 51.0).abs() < 1e-9);

    let empty = Rect::new(10, 10, 3, 3);
    assert!(builder.build(FilamentId(1), &empty, &empty.grow(0, 5)).is_none());
}

#[test]
fn quadratic_fit_recovers_parabola() {
    let samples: Vec<(f64, f64)> = (0..20)
        .map(|i| {
            let t = i as f64;
            (t, 3.0 + 0.5 * (t - 9.5) + 0.25 * (t - 9.5) * (t - 9.5))
        })
        .collect();
    let [c0, c1, c2] = fit_quadratic(&samples).expect("fit");
    assert!((c0 - 3.0).abs() < 1e-6);
    assert!((c1 - 0.5).abs() < 1e-6);
    assert!((c2 - 0.25).abs() < 1e-6);
}
