// Set shapes of both engines through the public API.
//
// The set variants share every algorithm with their map counterparts;
// these tests pin the key-only surface and the engines' differing
// duplicate policies.
use dual_hashmap::{ChainedHashSet, InsertError, ProbeHashSet};

// Test: probing set duplicate policy.
// Assumes: the probing engine treats a present key as a hard error.
// Verifies: DuplicateKey, unchanged membership.
#[test]
fn probe_set_duplicate_is_hard_error() {
    let mut s: ProbeHashSet<String> = ProbeHashSet::new();
    s.insert("x".to_string()).unwrap();
    assert_eq!(s.insert("x".to_string()), Err(InsertError::DuplicateKey));
    assert_eq!(s.len(), 1);
    assert!(s.contains("x"));
}

// Test: chained set duplicate policy.
// Assumes: the chained engine reports rather than errors.
// Verifies: (false, handle-to-existing), unchanged membership.
#[test]
fn chained_set_duplicate_is_soft_reject() {
    let mut s: ChainedHashSet<String> = ChainedHashSet::new();
    let (newly, _) = s.insert("x".to_string());
    assert!(newly);
    let (newly, h) = s.insert("x".to_string());
    assert!(!newly);
    assert_eq!(s.key_at(h), Some(&"x".to_string()));
    assert_eq!(s.len(), 1);
}

// Test: membership and removal across growth, both engines.
// Assumes: growth thresholds are 0.8 (probing) and 0.75 (chained).
// Verifies: all members survive resizes; removal booleans are accurate.
#[test]
fn sets_survive_growth() {
    let mut p: ProbeHashSet<u64> = ProbeHashSet::new();
    let mut c: ChainedHashSet<u64> = ChainedHashSet::new();
    for k in 0..100 {
        p.insert(k).unwrap();
        c.insert(k);
    }
    for k in 0..100 {
        assert!(p.contains(&k));
        assert!(c.contains(&k));
    }
    assert!(p.remove(&50));
    assert!(!p.remove(&50));
    assert!(c.remove(&50));
    assert!(!c.remove(&50));
    assert_eq!(p.len(), 99);
    assert_eq!(c.len(), 99);
}

// Test: iteration parity with membership.
// Assumes: order is an implementation artifact.
// Verifies: each member appears exactly once in both set shapes.
#[test]
fn set_iteration_matches_membership() {
    let mut p: ProbeHashSet<u32> = ProbeHashSet::new();
    let mut c: ChainedHashSet<u32> = ChainedHashSet::new();
    for k in [5u32, 9, 2, 7] {
        p.insert(k).unwrap();
        c.insert(k);
    }
    let mut pk: Vec<u32> = p.iter().copied().collect();
    let mut ck: Vec<u32> = c.iter().copied().collect();
    pk.sort_unstable();
    ck.sort_unstable();
    assert_eq!(pk, vec![2, 5, 7, 9]);
    assert_eq!(ck, vec![2, 5, 7, 9]);
}

// Test: handle-based removal returns the owned key.
// Verifies: both engines resolve then retire the handle.
#[test]
fn handle_removal_returns_key() {
    let mut p: ProbeHashSet<String> = ProbeHashSet::new();
    let hp = p.insert("p".to_string()).unwrap();
    assert_eq!(p.remove_at(hp), Some("p".to_string()));
    assert_eq!(p.remove_at(hp), None);

    let mut c: ChainedHashSet<String> = ChainedHashSet::new();
    let (_, hc) = c.insert("c".to_string());
    assert_eq!(c.remove_at(hc), Some("c".to_string()));
    assert_eq!(c.remove_at(hc), None);
}
