//! # Dispatch Flow
//!
//! Request → registry lookup → environment + handler script → outcome →
//! sequencer commit, exercised through a whole [`LedgerNode`].
//!
//! | Script ends with | Response | Ledger |
//! |------------------|----------|--------|
//! | `{"result": v}` or a bare value | 200 | one new entry |
//! | `{"error": {code, message}}` | `code` | unchanged |
//! | a fault (`$raise`, step limit, unknown table) | 500 | unchanged |

#[cfg(test)]
mod tests {
    use lc_02_script_runtime::Script;
    use lc_03_script_dispatch::{Request, Response, ResultPolicy};
    use lc_04_commit_signatures::SeededNonceSource;
    use node_runtime::{LedgerNode, NodeConfig};
    use serde_json::{json, Value};
    use shared_crypto::Ed25519KeyPair;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn node_with(config: NodeConfig) -> LedgerNode<SeededNonceSource> {
        LedgerNode::with_signer(
            config,
            Ed25519KeyPair::from_seed([3; 32]),
            SeededNonceSource::new(3),
        )
        .unwrap()
    }

    fn node() -> LedgerNode<SeededNonceSource> {
        let mut config = NodeConfig::default();
        config.partitions = 2;
        node_with(config)
    }

    fn install(node: &LedgerNode<SeededNonceSource>, key: &str, program: Value) {
        node.install_script(key, &Script::from_program(&program))
            .unwrap();
    }

    /// `POST put`: store `body.v` under `body.k` in `pub0`.
    /// `GET get`: read `body.k` from `pub0`.
    fn key_value_node() -> LedgerNode<SeededNonceSource> {
        let node = node();
        install(
            &node,
            "POST put",
            json!({"$do": [
                {"$put": ["pub0", {"$var": "args.body.k"}, {"$var": "args.body.v"}]},
                {"result": true}
            ]}),
        );
        install(
            &node,
            "GET get",
            json!({"result": {"$get": ["pub0", {"$var": "args.body.k"}]}}),
        );
        install(
            &node,
            "GET has",
            json!({"result": {"$has": ["pub0", {"$var": "args.body.k"}]}}),
        );
        node
    }

    fn put(k: &str, v: Value) -> Request {
        Request::new("POST", "/put").with_body(json!({"k": k, "v": v}))
    }

    fn get(verb_path: &str, k: &str) -> Request {
        Request::new("GET", verb_path).with_body(json!({ "k": k }))
    }

    // =============================================================================
    // SUCCESSFUL REQUESTS
    // =============================================================================

    #[test]
    fn test_write_is_visible_to_later_requests() {
        let node = key_value_node();
        let before = node.stats().ledger_len;

        assert_eq!(node.handle_request(&put("a", json!(7))), Response::Success(json!(true)));
        assert_eq!(node.handle_request(&get("/get", "a")), Response::Success(json!(7)));
        assert_eq!(node.stats().ledger_len, before + 1);
        assert_eq!(node.store().current_version(), before + 1);
    }

    #[test]
    fn test_read_only_request_adds_no_entry() {
        let node = key_value_node();
        let before = node.stats().ledger_len;
        assert_eq!(node.handle_request(&get("get", "missing")), Response::Success(Value::Null));
        assert_eq!(node.stats().ledger_len, before);
    }

    #[test]
    fn test_bare_value_passes_through() {
        let node = node();
        install(
            &node,
            "GET sum",
            json!({"$add": [{"$var": "args.body.0"}, {"$var": "args.body.1"}]}),
        );
        let response = node.handle_request(&Request::new("GET", "sum").with_body(json!([2, 3])));
        assert_eq!(response, Response::Success(json!(5)));
    }

    #[test]
    fn test_bare_key_answers_every_verb() {
        let node = node();
        install(&node, "ping", json!({"result": {"$var": "args.verb"}}));
        install(&node, "GET ping", json!({"result": "prefixed"}));

        // The bare key is looked up first.
        for verb in ["GET", "POST", "DELETE"] {
            assert_eq!(
                node.handle_request(&Request::new(verb, "/ping")),
                Response::Success(json!(verb))
            );
        }
    }

    #[test]
    fn test_environment_functions_are_callable() {
        let node = node();
        node.set_environment_script(&Script::from_program(&json!(
            {"$def": ["double", ["x"], {"$mul": [{"$var": "x"}, 2]}]}
        )))
        .unwrap();
        install(
            &node,
            "POST double",
            json!({"result": {"$call": ["double", {"$var": "args.body"}]}}),
        );

        let response = node.handle_request(&Request::new("POST", "double").with_body(json!(21)));
        assert_eq!(response, Response::Success(json!(42)));
    }

    #[test]
    fn test_environment_script_cannot_be_called() {
        let node = node();
        node.set_environment_script(&Script::from_program(&json!(null)))
            .unwrap();
        let response = node.handle_request(&Request::new("POST", "/__environment"));
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_error_codes_constant() {
        let node = node();
        install(
            &node,
            "GET missing",
            json!({"error": {"code": {"$var": "env.error_codes.NOT_FOUND"}, "message": "gone"}}),
        );
        assert_eq!(
            node.handle_request(&Request::new("GET", "missing")),
            Response::Failure {
                status: 404,
                message: "gone".into()
            }
        );
    }

    // =============================================================================
    // FAILED REQUESTS LEAVE NO TRACE
    // =============================================================================

    #[test]
    fn test_application_error_discards_writes() {
        let node = key_value_node();
        install(
            &node,
            "POST reject",
            json!({"$do": [
                {"$put": ["pub0", "x", 1]},
                {"error": {"code": 400, "message": "rejected"}}
            ]}),
        );
        let before = node.stats().ledger_len;

        let response = node.handle_request(&Request::new("POST", "reject"));
        assert_eq!(
            response.to_json(),
            json!({"status": 400, "error": {"code": 400, "message": "rejected"}})
        );
        assert_eq!(node.handle_request(&get("has", "x")), Response::Success(json!(false)));
        assert_eq!(node.stats().ledger_len, before);
    }

    #[test]
    fn test_faults_discard_writes() {
        let node = key_value_node();
        install(
            &node,
            "POST raise",
            json!({"$do": [{"$put": ["pub0", "x", 1]}, {"$raise": "boom"}]}),
        );
        install(&node, "POST unknown_table", json!({"$put": ["pub9", "x", 1]}));
        install(
            &node,
            "POST spin",
            json!({"$do": [
                {"$put": ["pub0", "x", 1]},
                {"$def": ["f", [], {"$call": ["f"]}]},
                {"$call": ["f"]}
            ]}),
        );
        let before = node.stats().ledger_len;

        for path in ["raise", "unknown_table", "spin"] {
            let response = node.handle_request(&Request::new("POST", path));
            assert_eq!(response, Response::internal_error(), "{path}");
        }
        assert_eq!(node.handle_request(&get("has", "x")), Response::Success(json!(false)));
        assert_eq!(node.stats().ledger_len, before);
        assert_eq!(node.stats().dispatch.faults, 3);
    }

    /// Writes `pub0.x`, then doubles an array `doublings` times.
    fn memory_bomb(doublings: usize) -> Value {
        let mut operands = vec![json!("x0"), json!([1])];
        for i in 1..=doublings {
            let prev = json!({"$var": format!("x{}", i - 1)});
            operands.push(json!(format!("x{i}")));
            operands.push(json!({"$concat": [prev.clone(), prev]}));
        }
        operands.push(json!({"result": {"$len": {"$var": format!("x{doublings}")}}}));
        json!({"$do": [{"$put": ["pub0", "x", 1]}, {"$let": operands}]})
    }

    /// Recurses with 50 nested `$do` levels per call.
    fn deep_recursion() -> Value {
        let mut body = json!({"$call": ["f", {"$sub": [{"$var": "n"}, 1]}]});
        for _ in 0..50 {
            body = json!({ "$do": [body] });
        }
        json!({"$do": [
            {"$put": ["pub0", "x", 1]},
            {"$def": ["f", ["n"], {"$if": [{"$le": [{"$var": "n"}, 0]}, 0, body]}]},
            {"$call": ["f", 1000]}
        ]})
    }

    #[test]
    fn test_resource_exhaustion_is_a_generic_fault() {
        let node = key_value_node();
        install(&node, "POST bomb", memory_bomb(40));
        install(&node, "POST deep", deep_recursion());
        let before = node.store().current_version();

        for path in ["bomb", "deep"] {
            let response = node.handle_request(&Request::new("POST", path));
            assert_eq!(response, Response::internal_error(), "{path}");
        }
        assert_eq!(node.store().current_version(), before);
        assert_eq!(node.handle_request(&get("has", "x")), Response::Success(json!(false)));
        assert_eq!(node.stats().dispatch.faults, 2);

        // The node keeps serving.
        assert_eq!(node.handle_request(&put("a", json!(1))), Response::Success(json!(true)));
    }

    #[test]
    fn test_result_policy() {
        let both = json!({"result": 1, "error": {"code": 400, "message": "no"}});

        let strict = node();
        install(&strict, "GET both", both.clone());
        assert_eq!(
            strict.handle_request(&Request::new("GET", "both")),
            Response::internal_error()
        );

        let mut config = NodeConfig::default();
        config.partitions = 1;
        config.dispatch.result_policy = ResultPolicy::Precedence;
        let lenient = node_with(config);
        install(&lenient, "GET both", both);
        assert_eq!(
            lenient.handle_request(&Request::new("GET", "both")).status(),
            400
        );
    }

    #[test]
    fn test_private_partitions_are_writable() {
        let node = node();
        install(
            &node,
            "POST secret",
            json!({"$do": [{"$put": ["priv1", "s", "hidden"]}, {"result": {"$get": ["priv1", "s"]}}]}),
        );
        assert_eq!(
            node.handle_request(&Request::new("POST", "secret")),
            Response::Success(json!("hidden"))
        );
    }
}
