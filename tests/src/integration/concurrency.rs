//! # Concurrency
//!
//! Many workers sharing one node. Optimistic transactions that lose a race
//! are retried by the node and finally answered with 409; nothing that was
//! answered with 200 may be lost, and the sequencer must keep the Merkle
//! history in step with the store.

#[cfg(test)]
mod tests {
    use lc_02_script_runtime::Script;
    use lc_03_script_dispatch::{Request, Response};
    use lc_04_commit_signatures::SeededNonceSource;
    use node_runtime::{handle_line, LedgerNode, NodeConfig};
    use serde_json::{json, Value};
    use shared_crypto::Ed25519KeyPair;
    use std::sync::Arc;

    const WORKERS: usize = 8;
    const REQUESTS_PER_WORKER: usize = 25;

    fn shared_node(retries: u32, interval: u64) -> Arc<LedgerNode<SeededNonceSource>> {
        let mut config = NodeConfig::default();
        config.partitions = 1;
        config.max_conflict_retries = retries;
        config.signing.signature_interval = interval;
        let node = LedgerNode::with_signer(
            config,
            Ed25519KeyPair::from_seed([2; 32]),
            SeededNonceSource::new(2),
        )
        .unwrap();
        node.install_script(
            "POST incr",
            &Script::from_program(&json!({"$let": [
                "k", {"$var": "args.body"},
                "n", {"$add": [{"$if": [{"$has": ["pub0", {"$var": "k"}]}, {"$get": ["pub0", {"$var": "k"}]}, 0]}, 1]},
                {"$do": [{"$put": ["pub0", {"$var": "k"}, {"$var": "n"}]}, {"result": {"$var": "n"}}]}
            ]})),
        )
        .unwrap();
        node.install_script(
            "GET read",
            &Script::from_program(&json!({"result": {"$get": ["pub0", {"$var": "args.body"}]}})),
        )
        .unwrap();
        Arc::new(node)
    }

    fn incr(key: &str) -> Request {
        Request::new("POST", "incr").with_body(json!(key))
    }

    fn read(node: &LedgerNode<SeededNonceSource>, key: &str) -> Value {
        match node.handle_request(&Request::new("GET", "read").with_body(json!(key))) {
            Response::Success(value) => value,
            other => panic!("read failed: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contended_counter_never_loses_acknowledged_writes() {
        let node = shared_node(2, 10);

        let mut handles = Vec::new();
        for _ in 0..WORKERS {
            let node = Arc::clone(&node);
            handles.push(tokio::task::spawn_blocking(move || {
                let mut statuses = Vec::new();
                for _ in 0..REQUESTS_PER_WORKER {
                    statuses.push(node.handle_request(&incr("shared")).status());
                }
                statuses
            }));
        }
        let mut succeeded = 0u64;
        let mut conflicted = 0u64;
        for handle in handles {
            for status in handle.await.unwrap() {
                match status {
                    200 => succeeded += 1,
                    409 => conflicted += 1,
                    other => panic!("unexpected status {other}"),
                }
            }
        }

        assert_eq!(succeeded + conflicted, (WORKERS * REQUESTS_PER_WORKER) as u64);
        assert_eq!(read(&node, "shared"), json!(succeeded));
        assert_eq!(node.stats().exhausted_retries, conflicted);

        let stats = node.stats();
        assert_eq!(stats.ledger_len, node.store().current_version());
        let report = node.audit().unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_disjoint_keys_never_conflict() {
        let node = shared_node(0, 7);

        let mut handles = Vec::new();
        for worker in 0..WORKERS {
            let node = Arc::clone(&node);
            handles.push(tokio::task::spawn_blocking(move || {
                let key = format!("worker-{worker}");
                for _ in 0..REQUESTS_PER_WORKER {
                    assert!(node.handle_request(&incr(&key)).is_success());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for worker in 0..WORKERS {
            assert_eq!(read(&node, &format!("worker-{worker}")), json!(REQUESTS_PER_WORKER));
        }
        let stats = node.stats();
        assert_eq!(stats.dispatch.conflicts, 0);
        // Two installs, every request, and one signature per seven entries.
        let requests = (WORKERS * REQUESTS_PER_WORKER) as u64;
        assert_eq!(stats.ledger_len, 2 + requests + stats.signatures_emitted);
        assert_eq!(stats.signatures_emitted, (2 + requests) / 7);
        assert!(node.audit().unwrap().is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_line_protocol_from_many_tasks() {
        let node = shared_node(5, 1_000);

        let mut handles = Vec::new();
        for worker in 0..WORKERS {
            let node = Arc::clone(&node);
            handles.push(tokio::task::spawn_blocking(move || {
                let line =
                    json!({"verb": "POST", "path": "/incr", "body": format!("line-{worker}")});
                handle_line(&node, &line.to_string())
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), json!({"status": 200, "result": 1}));
        }

        let reply = handle_line(&node, r#"{"admin":"sign"}"#);
        assert_eq!(reply["result"]["seqno"], json!(2 + WORKERS + 1));
        let reply = handle_line(&node, r#"{"admin":"audit"}"#);
        assert_eq!(reply["result"]["findings"], json!([]));
    }
}
