//! Membership Module Tests
//!
//! ## Test Scopes
//! - **Peer Identity**: value equality and hashing of peer addresses.
//! - **Table Logic**: category balancing, borrow/return accounting, eviction.
//! - **Service**: the registry protocol end to end over localhost TCP.

#[cfg(test)]
mod tests {
    use crate::config::ClusterConfig;
    use crate::error::ClusterError;
    use crate::membership::client::RegistryClient;
    use crate::membership::service::RegistryService;
    use crate::membership::table::RegistryTable;
    use crate::membership::types::PeerAddress;
    use crate::storage::partitioner::{Category, all_categories};
    use std::collections::{HashMap, HashSet};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn peer(n: u16) -> PeerAddress {
        PeerAddress::new(Ipv4Addr::new(127, 0, 0, 1), 7000 + n)
    }

    fn table() -> RegistryTable {
        RegistryTable::new(all_categories())
    }

    fn load(table: &RegistryTable, p: &PeerAddress) -> u32 {
        table.entry(p).map(|e| e.load).unwrap()
    }

    // ============================================================
    // PEER ADDRESS TESTS
    // ============================================================

    #[test]
    fn test_peer_address_value_identity() {
        let a = PeerAddress::new(Ipv4Addr::new(10, 1, 2, 3), 80);
        let b = PeerAddress::new(Ipv4Addr::new(10, 1, 2, 3), 80);
        let c = PeerAddress::new(Ipv4Addr::new(10, 1, 2, 3), 81);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<PeerAddress> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.to_string(), "10.1.2.3:80");
    }

    #[test]
    fn test_peer_address_advertised() {
        let bound = "0.0.0.0:4000".parse().unwrap();
        let advertised = PeerAddress::advertised(bound, Ipv4Addr::new(192, 168, 1, 5)).unwrap();
        assert_eq!(advertised, PeerAddress::new(Ipv4Addr::new(192, 168, 1, 5), 4000));

        let bound = "127.0.0.1:4001".parse().unwrap();
        let advertised = PeerAddress::advertised(bound, Ipv4Addr::new(192, 168, 1, 5)).unwrap();
        assert_eq!(advertised, PeerAddress::new(Ipv4Addr::LOCALHOST, 4001));

        assert!(PeerAddress::advertised("[::1]:80".parse().unwrap(), Ipv4Addr::LOCALHOST).is_err());
    }

    // ============================================================
    // REGISTRATION TESTS
    // ============================================================

    #[test]
    fn test_register_balances_categories() {
        let mut table = table();
        let now = Instant::now();
        let categories = all_categories();

        for k in 0..40u16 {
            table.register(peer(k), now);

            let sizes: Vec<usize> = categories.iter().map(|c| table.member_count(c)).collect();
            let max = *sizes.iter().max().unwrap();
            let min = *sizes.iter().min().unwrap();
            assert!(max - min <= 1, "imbalance after {} registrations: {:?}", k + 1, sizes);
        }
        assert_eq!(table.len(), 40);
    }

    #[test]
    fn test_register_fills_in_category_order() {
        let mut table = table();
        let now = Instant::now();

        let assigned: Vec<Category> = (0..6).map(|k| table.register(peer(k), now)).collect();
        assert_eq!(assigned, all_categories());
        assert_eq!(table.register(peer(6), now), all_categories()[0]);
    }

    #[test]
    fn test_reregister_replaces_entry() {
        let mut table = table();
        let now = Instant::now();

        table.register(peer(1), now);
        table.borrow_any(1).unwrap();
        table.register(peer(1), now);

        assert_eq!(table.len(), 1);
        assert_eq!(load(&table, &peer(1)), 0);
    }

    // ============================================================
    // BORROW / RETURN TESTS
    // ============================================================

    #[test]
    fn test_borrow_any_spreads_load() {
        let mut table = table();
        let now = Instant::now();
        for k in 0..3 {
            table.register(peer(k), now);
        }

        let borrowed = table.borrow_any(6).unwrap();
        assert_eq!(borrowed.len(), 6);

        let mut per_peer: HashMap<PeerAddress, usize> = HashMap::new();
        for p in &borrowed {
            *per_peer.entry(*p).or_insert(0) += 1;
        }
        assert_eq!(per_peer.len(), 3);
        assert!(per_peer.values().all(|&n| n == 2));
    }

    #[test]
    fn test_borrow_any_zero_and_empty() {
        let mut table = table();
        assert!(table.borrow_any(0).unwrap().is_empty());
        assert!(matches!(
            table.borrow_any(2),
            Err(ClusterError::NoHelper { category: None })
        ));
    }

    #[test]
    fn test_borrow_in_category_picks_least_loaded_member() {
        let mut table = table();
        let now = Instant::now();
        // 12 peers: two per category
        for k in 0..12 {
            table.register(peer(k), now);
        }
        let category = all_categories()[2].clone();

        let first = table.borrow_one_in_category(&category).unwrap();
        let second = table.borrow_one_in_category(&category).unwrap();
        assert_ne!(first, second);
        assert_eq!(table.entry(&first).unwrap().category, category);
        assert_eq!(table.entry(&second).unwrap().category, category);
    }

    #[test]
    fn test_borrow_in_empty_category_is_explicit() {
        let mut table = table();
        table.register(peer(0), Instant::now());
        let empty = all_categories()[5].clone();

        match table.borrow_one_in_category(&empty) {
            Err(ClusterError::NoHelper { category }) => assert_eq!(category, Some(empty)),
            other => panic!("expected NoHelper, got {:?}", other),
        }
    }

    #[test]
    fn test_borrow_one_per_category_skips_empty() {
        let mut table = table();
        let now = Instant::now();
        for k in 0..4 {
            table.register(peer(k), now);
        }

        let borrowed = table.borrow_one_per_category();
        assert_eq!(borrowed.len(), 4);
        let unique: HashSet<_> = borrowed.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_borrow_return_conservation() {
        let mut table = table();
        let now = Instant::now();
        for k in 0..6 {
            table.register(peer(k), now);
        }

        let mut expected: HashMap<PeerAddress, i64> = HashMap::new();
        for round in 0..5 {
            for p in table.borrow_any(4).unwrap() {
                *expected.entry(p).or_insert(0) += 1;
            }
            for p in table.borrow_one_per_category() {
                *expected.entry(p).or_insert(0) += 1;
            }
            // Return some of what was borrowed
            let to_return: Vec<PeerAddress> = expected
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(p, _)| *p)
                .take(round + 1)
                .collect();
            for p in to_return {
                let category = table.entry(&p).unwrap().category.clone();
                assert!(table.return_helper(&p, &category));
                *expected.get_mut(&p).unwrap() -= 1;
            }
        }

        for (p, n) in &expected {
            assert!(*n >= 0);
            assert_eq!(load(&table, p) as i64, *n);
        }
    }

    #[test]
    fn test_return_never_negative_and_unknown_is_noop() {
        let mut table = table();
        let category = table.register(peer(1), Instant::now());

        assert!(table.return_helper(&peer(1), &category));
        assert_eq!(load(&table, &peer(1)), 0);

        assert!(!table.return_helper(&peer(99), &category));
        assert!(!table.return_helper(&peer(1), &Category::new("elsewhere")));
    }

    // ============================================================
    // LIVENESS TESTS
    // ============================================================

    #[test]
    fn test_eviction_removes_stale_peers() {
        let mut table = table();
        let start = Instant::now();
        let threshold = Duration::from_secs(10);

        table.register(peer(1), start);
        table.register(peer(2), start);

        // peer 2 keeps beating, peer 1 goes silent
        assert!(table.heartbeat(&peer(2), start + Duration::from_secs(8)));

        assert!(table.evict_dead(start + Duration::from_secs(9), threshold).is_empty());

        let evicted = table.evict_dead(start + Duration::from_secs(11), threshold);
        assert_eq!(evicted, vec![peer(1)]);
        assert!(!table.contains(&peer(1)));
        assert!(table.contains(&peer(2)));

        // never lent out again
        for _ in 0..5 {
            assert_eq!(table.borrow_any(1).unwrap(), vec![peer(2)]);
        }
        let category_of_1 = all_categories()[0].clone();
        assert!(table.borrow_one_in_category(&category_of_1).is_err());
    }

    #[test]
    fn test_heartbeat_for_unknown_peer_is_noop() {
        let mut table = table();
        let now = Instant::now();

        assert!(!table.heartbeat(&peer(5), now));
        assert!(table.is_empty());
        assert!(table.evict_dead(now + Duration::from_secs(60), Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_returned_after_eviction_is_noop() {
        let mut table = table();
        let start = Instant::now();
        let category = table.register(peer(1), start);
        table.borrow_any(1).unwrap();

        table.evict_dead(start + Duration::from_secs(30), Duration::from_secs(10));
        assert!(!table.return_helper(&peer(1), &category));
    }

    #[test]
    fn test_category_summary() {
        let mut table = table();
        let now = Instant::now();
        for k in 0..7 {
            table.register(peer(k), now);
        }
        table.borrow_one_in_category(&all_categories()[0]).unwrap();

        let summary = table.category_summary();
        assert_eq!(summary.len(), 6);
        assert_eq!(summary[0].members, 2);
        assert_eq!(summary[0].total_load, 1);
        assert_eq!(summary[5].members, 1);
    }

    // ============================================================
    // SERVICE TESTS (localhost TCP)
    // ============================================================

    async fn start_registry(dir: &std::path::Path) -> Arc<RegistryService> {
        let config = Arc::new(ClusterConfig {
            working_dir: dir.join("working"),
            registry_info_path: dir.join("registry_info"),
            ..ClusterConfig::default()
        });
        let registry = RegistryService::new("127.0.0.1:0".parse().unwrap(), config)
            .await
            .unwrap();
        registry.clone().start().await.unwrap();
        registry
    }

    #[tokio::test]
    async fn test_service_register_borrow_return() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start_registry(dir.path()).await;
        let client = RegistryClient::new(registry.local_peer);

        let first = client.register(peer(1)).await.unwrap();
        let second = client.register(peer(2)).await.unwrap();
        assert_eq!(first, all_categories()[0]);
        assert_eq!(second, all_categories()[1]);

        let borrowed = client.borrow_any(2).await.unwrap();
        assert_eq!(borrowed.len(), 2);

        let in_first = client.borrow_one_in_category(&first).await.unwrap();
        assert_eq!(in_first, peer(1));

        let per_category = client.borrow_one_per_category().await.unwrap();
        assert_eq!(per_category.len(), 2);

        client.return_helper(peer(1), &first).await.unwrap();
        client.heartbeat(peer(1)).await.unwrap();

        // fire-and-forget calls land after the connection closes; poll briefly
        let mut settled = false;
        for _ in 0..50 {
            let members = registry.members().await;
            let load = members
                .iter()
                .find(|m| m.peer == peer(1).to_string())
                .map(|m| m.load);
            if load == Some(2) {
                settled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(settled, "return was not applied");
    }

    #[tokio::test]
    async fn test_service_no_helper_crosses_the_wire() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start_registry(dir.path()).await;
        let client = RegistryClient::new(registry.local_peer);

        let err = client.borrow_any(3).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClusterError>(),
            Some(ClusterError::NoHelper { .. })
        ));

        let err = client
            .borrow_one_in_category(&all_categories()[0])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClusterError>(),
            Some(ClusterError::NoHelper { .. })
        ));

        assert!(client.borrow_one_per_category().await.unwrap().is_empty());
        assert!(client.borrow_any(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_publishes_discovery_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = start_registry(dir.path()).await;

        let published = crate::transport::discovery::lookup(&dir.path().join("registry_info"))
            .await
            .unwrap();
        assert_eq!(published, registry.local_peer);
    }

    #[tokio::test]
    async fn test_status_endpoint_lists_members() {
        use crate::membership::status;
        use crate::membership::types::{CategorySnapshot, MemberSnapshot};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempfile::tempdir().unwrap();
        let registry = start_registry(dir.path()).await;
        registry.register(peer(1)).await;
        registry.register(peer(2)).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(status::serve(registry.clone(), listener));

        async fn get(addr: std::net::SocketAddr, path: &str) -> String {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let request = format!(
                "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
                path
            );
            stream.write_all(request.as_bytes()).await.unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
            let (_, body) = response.split_once("\r\n\r\n").unwrap();
            body.to_string()
        }

        let members: Vec<MemberSnapshot> =
            serde_json::from_str(&get(addr, "/members").await).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].peer, peer(1).to_string());
        assert_eq!(members[0].category, all_categories()[0]);

        let categories: Vec<CategorySnapshot> =
            serde_json::from_str(&get(addr, "/categories").await).unwrap();
        assert_eq!(categories.len(), 6);
        assert_eq!(categories.iter().map(|c| c.members).sum::<usize>(), 2);
    }
}
