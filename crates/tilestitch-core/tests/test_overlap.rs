use std::collections::HashMap;
use std::sync::Arc;

use approx::assert_relative_eq;
use tilestitch_core::overlap::{overlap_fraction, overlapping_pairs, overlaps};
use tilestitch_core::view::{AttributeValue, GroupedView, ViewDescription, ViewId, ViewSetup};

const CUBE: [usize; 3] = [10, 10, 10];

#[test]
fn test_offset_cubes_overlap() {
    assert!(overlaps(&CUBE, &[0.0, 0.0, 0.0], &CUBE, &[5.0, 5.0, 5.0]));
    assert_relative_eq!(
        overlap_fraction(&CUBE, &[0.0, 0.0, 0.0], &CUBE, &[5.0, 5.0, 5.0]),
        0.125
    );
}

#[test]
fn test_touching_cubes_do_not_overlap() {
    assert!(!overlaps(&CUBE, &[0.0, 0.0, 0.0], &CUBE, &[10.0, 0.0, 0.0]));
    assert!(!overlaps(&CUBE, &[0.0, 0.0, 0.0], &CUBE, &[20.0, 0.0, 0.0]));
    assert_eq!(
        overlap_fraction(&CUBE, &[0.0, 0.0, 0.0], &CUBE, &[10.0, 0.0, 0.0]),
        0.0
    );
}

#[test]
fn test_overlap_is_symmetric() {
    let placements = [
        [0.0, 0.0, 0.0],
        [9.5, 0.0, 0.0],
        [-3.0, 7.0, 2.0],
        [10.0, 10.0, 10.0],
    ];
    for a in &placements {
        for b in &placements {
            assert_eq!(overlaps(&CUBE, a, &CUBE, b), overlaps(&CUBE, b, &CUBE, a));
        }
    }
}

fn single(setup: u32) -> GroupedView {
    GroupedView::single(ViewDescription::new(
        AttributeValue::new(0),
        Arc::new(ViewSetup {
            id: setup,
            channel: AttributeValue::new(0),
            illumination: AttributeValue::new(0),
            angle: AttributeValue::new(0),
            tile: AttributeValue::new(setup),
            size: CUBE.to_vec(),
        }),
    ))
}

#[test]
fn test_overlapping_pairs_respect_fixed_and_grouped_views() {
    let views: Vec<GroupedView> = (0..4).map(single).collect();
    let sizes: HashMap<ViewId, Vec<usize>> =
        views.iter().map(|v| (v.id(), CUBE.to_vec())).collect();
    // All four cubes overlap each other
    let translations: HashMap<ViewId, Vec<f64>> = views
        .iter()
        .enumerate()
        .map(|(i, v)| (v.id(), vec![i as f64 * 2.0, 0.0, 0.0]))
        .collect();

    let all = overlapping_pairs(&sizes, &translations, &views, &[], &[]).unwrap();
    assert_eq!(all.len(), 6);

    let fixed = [views[0].id(), views[1].id()];
    let grouped = vec![vec![views[2].id(), views[3].id()]];
    let pairs = overlapping_pairs(&sizes, &translations, &views, &fixed, &grouped).unwrap();

    assert_eq!(pairs.len(), 4);
    for (a, b) in &pairs {
        assert!(!(fixed.contains(&a.id()) && fixed.contains(&b.id())));
        assert!(!(a.id() == views[2].id() && b.id() == views[3].id()));
    }
}

#[test]
fn test_overlapping_pairs_require_known_views() {
    let views: Vec<GroupedView> = (0..2).map(single).collect();
    let sizes = HashMap::from([(views[0].id(), CUBE.to_vec())]);
    let translations: HashMap<ViewId, Vec<f64>> =
        views.iter().map(|v| (v.id(), vec![0.0; 3])).collect();

    assert!(overlapping_pairs(&sizes, &translations, &views, &[], &[]).is_err());
}
