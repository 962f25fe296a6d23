use super::*;

#[test]
fn find_index_reference_points() {
    let t = [100.0, 500.0, 900.0];
    assert_eq!(find_index(&t, 0.0), None);
    assert_eq!(find_index(&t, 100.0), Some(0));
    assert_eq!(find_index(&t, 450.0), Some(0));
    assert_eq!(find_index(&t, 500.0), Some(1));
    assert_eq!(find_index(&t, 5000.0), Some(2));
}

#[test]
fn find_index_on_empty_table_is_none() {
    assert_eq!(find_index(&[], 1000.0), None);
    assert_eq!(TimestampTable::default().find_index(0.0), None);
}

#[test]
fn find_index_matches_linear_scan() {
    let t: Vec<f64> = vec![0.0, 0.0, 40.0, 41.0, 41.0, 1000.0, 1200.5];
    for q in [-1.0, 0.0, 1.0, 40.0, 40.9, 41.0, 999.0, 1000.0, 1200.5, 9999.0] {
        let expected = t.iter().rposition(|&ts| ts <= q);
        assert_eq!(find_index(&t, q), expected, "query {q}");
    }
}

#[test]
fn table_rejects_unsorted_or_non_finite_input() {
    assert!(TimestampTable::new(vec![1.0, 0.5]).is_err());
    assert!(TimestampTable::new(vec![0.0, f64::NAN]).is_err());
    let table = TimestampTable::new(vec![10.0, 20.0]).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(1), Some(20.0));
    assert_eq!(table.find_index(15.0), Some(0));
}

#[test]
fn index_cache_keeps_one_lookup_in_flight() {
    let mut cache = IndexCache::new(17.0);
    let mut dispatched = Vec::new();

    let got = cache
        .lookup(1000.0, |t| {
            dispatched.push(t);
            Ok(RequestId(1))
        })
        .unwrap();
    assert_eq!(got, None);

    // Far away, but a lookup is already outstanding.
    let got = cache
        .lookup(5000.0, |t| {
            dispatched.push(t);
            Ok(RequestId(2))
        })
        .unwrap();
    assert_eq!(got, None);
    assert_eq!(dispatched, vec![1000.0]);
    assert_eq!(cache.in_flight(), Some(RequestId(1)));
}

#[test]
fn index_cache_reuses_answers_within_window() {
    let mut cache = IndexCache::new(17.0);
    cache.lookup(1000.0, |_| Ok(RequestId(7))).unwrap();
    assert!(cache.resolve(RequestId(7), Some(3)));

    let mut calls = 0;
    let got = cache
        .lookup(1016.0, |_| {
            calls += 1;
            Ok(RequestId(8))
        })
        .unwrap();
    assert_eq!(got, Some(3));
    assert_eq!(calls, 0);

    // Outside the window: returns the previous answer and starts a new lookup.
    let got = cache
        .lookup(1017.0, |_| {
            calls += 1;
            Ok(RequestId(9))
        })
        .unwrap();
    assert_eq!(got, Some(3));
    assert_eq!(calls, 1);
    assert_eq!(cache.in_flight(), Some(RequestId(9)));
}

#[test]
fn index_cache_ignores_stale_answers() {
    let mut cache = IndexCache::default();
    cache.lookup(0.0, |_| Ok(RequestId(1))).unwrap();
    assert!(!cache.resolve(RequestId(99), Some(5)));
    assert_eq!(cache.cached(), None);
    assert!(cache.resolve(RequestId(1), Some(0)));
    assert_eq!(cache.cached(), Some(0));
}

#[test]
fn invalidate_forces_a_new_lookup() {
    let mut cache = IndexCache::default();
    cache.lookup(0.0, |_| Ok(RequestId(1))).unwrap();
    cache.resolve(RequestId(1), Some(0));
    cache.invalidate();

    let mut calls = 0;
    cache
        .lookup(1.0, |_| {
            calls += 1;
            Ok(RequestId(2))
        })
        .unwrap();
    assert_eq!(calls, 1);
}

#[test]
fn dispatch_errors_leave_nothing_in_flight() {
    let mut cache = IndexCache::default();
    let res = cache.lookup(0.0, |_| Err(SublayError::initialization("gone")));
    assert!(res.is_err());
    assert_eq!(cache.in_flight(), None);
}
