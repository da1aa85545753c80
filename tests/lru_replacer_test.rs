use karstdb::storage::buffer::LruReplacer;

#[test]
fn test_victims_come_out_in_unpin_order() {
    let replacer = LruReplacer::new(10);
    replacer.unpin(1);
    replacer.unpin(2);
    replacer.unpin(3);

    assert_eq!(replacer.size(), 3);
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_pin_removes_frame_from_candidates() {
    let replacer = LruReplacer::new(10);
    replacer.unpin(1);
    replacer.unpin(2);
    replacer.unpin(3);

    replacer.pin(2);
    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_pin_of_untracked_frame_is_a_noop() {
    let replacer = LruReplacer::new(10);
    replacer.unpin(4);
    replacer.pin(9);
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.victim(), Some(4));
}

#[test]
fn test_redundant_unpin_keeps_first_position() {
    let replacer = LruReplacer::new(10);
    replacer.unpin(5);
    replacer.unpin(6);
    replacer.unpin(5);
    assert_eq!(replacer.victim(), Some(5));
    assert_eq!(replacer.victim(), Some(6));
}

#[test]
fn test_capacity_is_bounded_by_pool_size() {
    let replacer = LruReplacer::new(3);
    for frame in 0..5 {
        replacer.unpin(frame);
    }
    assert_eq!(replacer.size(), 3);
    assert_eq!(replacer.victim(), Some(0));
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), None);
}
