use super::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn seg(offset: u64, len: u32) -> Segment {
    Segment::new(offset, len)
}

#[test]
fn test_order_is_offset_then_longest_first() {
    let mut index = SegmentIndex::new();
    index.insert(seg(10, 5), 0).unwrap();
    index.insert(seg(10, 20), 0).unwrap();
    index.insert(seg(5, 1), 0).unwrap();
    index.insert(seg(10, 10), 0).unwrap();

    let order: Vec<_> = index.iter().collect();
    assert_eq!(order, vec![seg(5, 1), seg(10, 20), seg(10, 10), seg(10, 5)]);
    assert_eq!(index.first(), Some(seg(5, 1)));
}

#[test]
fn test_random_inserts_stay_ordered() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut index = SegmentIndex::new();
    for _ in 0..500 {
        let offset = rng.random_range(0..1000u64);
        let len = rng.random_range(1..64u32);
        index.insert(seg(offset, len), 0).unwrap();

        let all: Vec<_> = index.iter().collect();
        for pair in all.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.offset < b.offset || (a.offset == b.offset && a.len > b.len), "{a:?} before {b:?}");
        }
    }
}

#[test]
fn test_exact_duplicate_is_not_inserted() {
    let mut index = SegmentIndex::new();
    assert_eq!(index.insert(seg(100, 10), 0).unwrap(), InsertOutcome::NoOverlap);
    assert_eq!(
        index.insert(seg(100, 10), 0).unwrap(),
        InsertOutcome::ExactDuplicate(seg(100, 10))
    );
    assert_eq!(index.len(), 1);

    // Same start, different length is a distinct segment.
    assert_eq!(index.insert(seg(100, 4), 0).unwrap(), InsertOutcome::Overlap);
    assert_eq!(index.len(), 2);
}

#[test]
fn test_segment_before_base_is_rejected() {
    let mut index = SegmentIndex::new();
    let err = index.insert(seg(10, 10), 20).unwrap_err();
    assert_eq!(
        err,
        Error::SegmentBeforeBase {
            start: 10,
            end: 20,
            base: 20
        }
    );
    assert!(index.is_empty());

    // Partly before the base is accepted.
    assert!(index.insert(seg(15, 10), 20).is_ok());
}

#[test]
fn test_overlap_detection_both_sides() {
    let mut index = SegmentIndex::new();
    assert_eq!(index.insert(seg(0, 10), 0).unwrap(), InsertOutcome::NoOverlap);
    assert_eq!(index.insert(seg(20, 10), 0).unwrap(), InsertOutcome::NoOverlap);
    // Touching is not overlapping.
    assert_eq!(index.insert(seg(10, 10), 0).unwrap(), InsertOutcome::NoOverlap);

    assert_eq!(index.insert(seg(25, 10), 0).unwrap(), InsertOutcome::Overlap);
    assert_eq!(index.insert(seg(40, 5), 0).unwrap(), InsertOutcome::NoOverlap);
    assert_eq!(index.insert(seg(38, 3), 0).unwrap(), InsertOutcome::Overlap);
}

#[test]
fn test_backward_scan_finds_long_earlier_segment() {
    let mut index = SegmentIndex::new();
    index.insert(seg(0, 100), 0).unwrap();
    index.insert(seg(10, 5), 0).unwrap();
    index.insert(seg(20, 5), 0).unwrap();

    let probe = seg(50, 5);
    let before: Vec<_> = index.overlapping_before(&probe).collect();
    assert_eq!(before, vec![seg(0, 100)]);

    let probe = seg(12, 10);
    let before: Vec<_> = index.overlapping_before(&probe).collect();
    assert_eq!(before, vec![seg(10, 5), seg(0, 100)]);
    let after: Vec<_> = index.overlapping_after(&probe).collect();
    assert_eq!(after, vec![seg(20, 5)]);
}

#[test]
fn test_remove_and_clear() {
    let mut index = SegmentIndex::new();
    index.insert(seg(0, 10), 0).unwrap();
    index.insert(seg(10, 10), 0).unwrap();
    assert!(index.remove(&seg(0, 10)));
    assert!(!index.remove(&seg(0, 10)));
    assert_eq!(index.first(), Some(seg(10, 10)));
    assert_eq!(index.right_edge(), 20);

    index.clear();
    assert!(index.is_empty());
    assert_eq!(index.first(), None);
}
