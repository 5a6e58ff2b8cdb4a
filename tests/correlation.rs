use clienthello_fp::correlation::{ClientKey, CorrelationStore};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn key(last_octet: u8, port: u16) -> ClientKey {
    ClientKey::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, last_octet)), port)
}

#[test]
fn test_insert_then_get() {
    let store = CorrelationStore::new();
    assert!(store.is_empty());

    assert!(store.try_insert(key(1, 50000), Instant::now(), &[0x16, 0x03, 0x01]));
    assert_eq!(store.get(&key(1, 50000)), Some(vec![0x16, 0x03, 0x01]));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_get_does_not_remove() {
    let store = CorrelationStore::new();
    store.try_insert(key(1, 50000), Instant::now(), &[0x16]);

    assert!(store.get(&key(1, 50000)).is_some());
    assert!(store.get(&key(1, 50000)).is_some());
}

#[test]
fn test_first_insert_wins() {
    let store = CorrelationStore::new();
    let first = Instant::now();

    assert!(store.try_insert(key(1, 50000), first, &[0x16, 0x01]));
    assert!(!store.try_insert(key(1, 50000), first + Duration::from_secs(1), &[0x16, 0x02]));

    let entry = store.get_entry(&key(1, 50000)).expect("entry present");
    assert_eq!(entry.client_hello, vec![0x16, 0x01]);
    assert_eq!(entry.captured_at, first);
}

#[test]
fn test_keys_differ_by_address_and_port() {
    let store = CorrelationStore::new();
    let now = Instant::now();

    assert!(store.try_insert(key(1, 50000), now, &[1]));
    assert!(store.try_insert(key(1, 50001), now, &[2]));
    assert!(store.try_insert(key(2, 50000), now, &[3]));
    assert_eq!(store.len(), 3);
    assert_eq!(store.get(&key(2, 50000)), Some(vec![3]));
    assert_eq!(store.get(&key(3, 50000)), None);
}

#[test]
fn test_sweep_removes_only_expired_entries() {
    let store = CorrelationStore::new();
    let now = Instant::now() + Duration::from_secs(60);

    store.try_insert(key(1, 1), now - Duration::from_secs(31), &[1]);
    store.try_insert(key(2, 2), now - Duration::from_secs(1), &[2]);

    assert_eq!(store.sweep_at(now, Duration::from_secs(30)), 1);
    assert_eq!(store.get(&key(1, 1)), None);
    assert_eq!(store.get(&key(2, 2)), Some(vec![2]));
}

#[test]
fn test_sweep_keeps_entry_at_exact_window() {
    let store = CorrelationStore::new();
    let now = Instant::now() + Duration::from_secs(60);
    store.try_insert(key(1, 1), now - Duration::from_secs(30), &[1]);

    assert_eq!(store.sweep_at(now, Duration::from_secs(30)), 0);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_sweep_with_window_older_than_clock_keeps_everything() {
    let store = CorrelationStore::new();
    let now = Instant::now();
    store.try_insert(key(1, 1), now, &[1]);

    assert_eq!(store.sweep_at(now, Duration::MAX), 0);
    assert_eq!(store.get(&key(1, 1)), Some(vec![1]));
}

#[test]
fn test_key_reusable_after_sweep() {
    let store = CorrelationStore::new();
    let now = Instant::now() + Duration::from_secs(60);

    store.try_insert(key(1, 1), now - Duration::from_secs(45), &[1]);
    store.sweep_at(now, Duration::from_secs(30));
    assert!(store.try_insert(key(1, 1), now, &[2]));
    assert_eq!(store.get(&key(1, 1)), Some(vec![2]));
}

#[test]
fn test_ipv4_mapped_addresses_share_a_key() {
    let mapped = SocketAddr::new(IpAddr::V6(Ipv4Addr::new(192, 0, 2, 1).to_ipv6_mapped()), 443);
    assert_eq!(ClientKey::from(mapped), key(1, 443));

    let v6 = ClientKey::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 443);
    assert_ne!(v6, ClientKey::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 443));
    assert_eq!(key(1, 443).to_string(), "192.0.2.1:443");
}

#[test]
fn test_concurrent_inserts_single_winner() {
    let store = Arc::new(CorrelationStore::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0u8..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.try_insert(key(9, 40000), Instant::now(), &[i])
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|handle| handle.join().expect("insert thread"))
        .filter(|inserted| *inserted)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_concurrent_readers_and_sweeper() {
    let store = Arc::new(CorrelationStore::new());
    let base = Instant::now();
    for port in 0..100 {
        store.try_insert(key(1, port), base, &[0x16]);
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for port in 0..100 {
                    if let Some(bytes) = store.get(&key(1, port)) {
                        assert_eq!(bytes, vec![0x16]);
                    }
                }
            })
        })
        .collect();

    store.sweep_at(base + Duration::from_secs(31), Duration::from_secs(30));
    for reader in readers {
        reader.join().expect("reader thread");
    }
    assert!(store.is_empty());
}
