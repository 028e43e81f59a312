//! Orchestrator Module Tests
//!
//! ## Test Scopes
//! - **Phase Loop**: the attempt bound, recovery on a later round, repeat and broken callbacks.
//! - **Indexing Helpers**: segment listing and document naming.
//! - **Searching**: keywords without a category, and a category without workers.

#[cfg(test)]
mod tests {
    use crate::config::ClusterConfig;
    use crate::error::ClusterError;
    use crate::membership::client::RegistryClient;
    use crate::membership::service::RegistryService;
    use crate::membership::types::PeerAddress;
    use crate::orchestrator::indexing::{document_name, list_segments, run_indexing};
    use crate::orchestrator::phase::{CallbackEndpoint, Phase, run_phase};
    use crate::orchestrator::searching::run_search;
    use crate::transport::messenger::Messenger;
    use anyhow::Result;
    use std::net::Ipv4Addr;
    use std::path::Path;
    use std::time::Duration;
    use tokio::net::TcpStream;

    /// Replies to its own dispatches (from `answer_from` on) by sending each
    /// key `repeat` times, optionally preceded by a connection that sends nothing.
    struct ScriptedPhase {
        callback: PeerAddress,
        answer_from: Option<u32>,
        repeat: usize,
        broken_first: bool,
        attempts: Vec<u32>,
        dispatched: Vec<Vec<String>>,
        received: usize,
    }

    impl ScriptedPhase {
        fn new(callback: PeerAddress, answer_from: Option<u32>) -> Self {
            Self {
                callback,
                answer_from,
                repeat: 1,
                broken_first: false,
                attempts: Vec::new(),
                dispatched: Vec::new(),
                received: 0,
            }
        }
    }

    impl Phase for ScriptedPhase {
        type Key = String;

        const NAME: &'static str = "scripted";

        async fn dispatch(&mut self, keys: &[String], attempt: u32) {
            self.attempts.push(attempt);
            self.dispatched.push(keys.to_vec());

            if !self.answer_from.is_some_and(|first| attempt >= first) {
                return;
            }

            let callback = self.callback;
            let keys = keys.to_vec();
            let repeat = self.repeat;
            let broken_first = self.broken_first;
            tokio::spawn(async move {
                if broken_first {
                    drop(Messenger::connect(callback).await.unwrap());
                }
                for key in &keys {
                    for _ in 0..repeat {
                        let mut messenger = Messenger::connect(callback).await.unwrap();
                        messenger.send_string(key).await.unwrap();
                        messenger.flush().await.unwrap();
                    }
                }
            });
        }

        async fn receive(&mut self, messenger: &mut Messenger<TcpStream>) -> Result<String> {
            let key = messenger.receive_string().await?;
            self.received += 1;
            Ok(key)
        }
    }

    fn local_config() -> ClusterConfig {
        ClusterConfig {
            advertise_host: Ipv4Addr::LOCALHOST,
            ..ClusterConfig::default()
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ============================================================
    // PHASE LOOP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_phase_fails_after_exactly_max_attempts() {
        let endpoint = CallbackEndpoint::bind(&local_config()).await.unwrap();
        let mut phase = ScriptedPhase::new(endpoint.peer, None);

        let result = run_phase(
            &mut phase,
            &endpoint,
            &keys(&["s1", "s2"]),
            Duration::from_millis(40),
            3,
        )
        .await;

        match result {
            Err(ClusterError::RetryExhausted {
                attempts,
                remaining,
                ..
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(remaining, 2);
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
        assert_eq!(phase.attempts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_phase_recovers_on_later_attempt() {
        let endpoint = CallbackEndpoint::bind(&local_config()).await.unwrap();
        let mut phase = ScriptedPhase::new(endpoint.peer, Some(2));

        run_phase(
            &mut phase,
            &endpoint,
            &keys(&["s1", "s2", "s3"]),
            Duration::from_millis(200),
            3,
        )
        .await
        .unwrap();

        assert_eq!(phase.attempts, vec![1, 2]);
        // the retry carries exactly the unfinished keys, in dispatch order
        assert_eq!(phase.dispatched[1], keys(&["s1", "s2", "s3"]));
    }

    #[tokio::test]
    async fn test_phase_ignores_repeat_and_broken_callbacks() {
        let endpoint = CallbackEndpoint::bind(&local_config()).await.unwrap();
        let mut phase = ScriptedPhase::new(endpoint.peer, Some(1));
        phase.repeat = 3;
        phase.broken_first = true;

        run_phase(
            &mut phase,
            &endpoint,
            &keys(&["a", "b"]),
            Duration::from_secs(2),
            3,
        )
        .await
        .unwrap();

        // all three reports of "a" arrive before "b"; the repeats are harmless
        assert!(phase.received >= 4);
        assert_eq!(phase.attempts, vec![1]);
    }

    #[tokio::test]
    async fn test_phase_with_no_keys_is_done() {
        let endpoint = CallbackEndpoint::bind(&local_config()).await.unwrap();
        let mut phase = ScriptedPhase::new(endpoint.peer, None);

        run_phase(&mut phase, &endpoint, &[], Duration::from_millis(10), 3)
            .await
            .unwrap();
        assert!(phase.attempts.is_empty());
    }

    // ============================================================
    // INDEXING HELPER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_list_segments_files_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["part-2", "part-0", "part-1"] {
            tokio::fs::write(dir.path().join(name), "x").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("nested")).await.unwrap();

        let segments = list_segments(dir.path()).await.unwrap();
        let names: Vec<String> = segments
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, keys(&["part-0", "part-1", "part-2"]));
    }

    #[test]
    fn test_document_name_is_last_component() {
        assert_eq!(document_name(Path::new("/data/books/moby")).unwrap(), "moby");
        assert_eq!(document_name(Path::new("moby/")).unwrap(), "moby");
        assert!(document_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_document_name_rejects_separators() {
        for dir in ["/data/war,peace", "/data/two\nlines"] {
            let err = document_name(Path::new(dir)).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ClusterError>(),
                Some(ClusterError::InvalidDocumentName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_indexing_unsafe_name_fails_before_dispatch() {
        // ARRANGE: nothing listens at the registry address
        let work = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();
        let segment_dir = input.path().join("war,peace");
        tokio::fs::create_dir(&segment_dir).await.unwrap();
        tokio::fs::write(segment_dir.join("part-0"), "the cat").await.unwrap();
        let config = ClusterConfig {
            working_dir: work.path().to_path_buf(),
            ..local_config()
        };
        let registry = RegistryClient::new(PeerAddress::new(Ipv4Addr::LOCALHOST, 9));

        // ACT
        let err = run_indexing(registry, &config, &segment_dir, 7).await.unwrap_err();

        // ASSERT
        assert!(matches!(
            err.downcast_ref::<ClusterError>(),
            Some(ClusterError::InvalidDocumentName(_))
        ));
        assert!(!config.transaction_dir(7).exists());
    }

    #[tokio::test]
    async fn test_indexing_refuses_a_transaction_id_in_use() {
        // ARRANGE: another job already owns transaction 7
        let work = tempfile::tempdir().unwrap();
        let input = tempfile::tempdir().unwrap();
        let segment_dir = input.path().join("moby");
        tokio::fs::create_dir(&segment_dir).await.unwrap();
        tokio::fs::write(segment_dir.join("part-0"), "the cat").await.unwrap();
        let config = ClusterConfig {
            working_dir: work.path().to_path_buf(),
            ..local_config()
        };
        let busy = config.transaction_dir(7);
        tokio::fs::create_dir_all(&busy).await.unwrap();
        tokio::fs::write(busy.join("part-0"), "cat,1\n").await.unwrap();
        let registry = RegistryClient::new(PeerAddress::new(Ipv4Addr::LOCALHOST, 9));

        // ACT
        let result = run_indexing(registry, &config, &segment_dir, 7).await;

        // ASSERT: the other job's map output is untouched
        assert!(result.is_err());
        assert!(busy.join("part-0").exists());
    }

    // ============================================================
    // SEARCHING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_search_without_category_needs_no_workers() {
        // Nothing listens here; it must never be contacted.
        let registry = RegistryClient::new(PeerAddress::new(Ipv4Addr::LOCALHOST, 9));
        let config = local_config();

        let results = run_search(registry, &config, &keys(&["Hello", "--"]))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, postings)| postings.is_empty()));
    }

    #[tokio::test]
    async fn test_search_fails_when_category_has_no_worker() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClusterConfig {
            registry_info_path: dir.path().join("registry_info"),
            callback_timeout_ms: 40,
            ..local_config()
        };
        let registry = RegistryService::new("127.0.0.1:0".parse().unwrap(), config.clone().into())
            .await
            .unwrap();
        registry.clone().start().await.unwrap();

        let err = run_search(
            RegistryClient::new(registry.local_peer),
            &config,
            &keys(&["cat"]),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClusterError>(),
            Some(ClusterError::RetryExhausted { attempts: 3, .. })
        ));
    }
}
