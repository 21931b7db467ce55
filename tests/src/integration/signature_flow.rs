//! # Signature Flow
//!
//! Ledger entries → Merkle history → signature written at its own seqno →
//! third-party audit.
//!
//! ```text
//! commit(tx) ──digest──→ history.append ──→ sign(view) ──→ signatures[seqno]
//!                                                              │
//!                            SignatureAuditor ←── foreach ─────┘
//! ```

#[cfg(test)]
mod tests {
    use lc_01_versioned_store::{Store, Table};
    use lc_02_script_runtime::Script;
    use lc_03_script_dispatch::Request;
    use lc_04_commit_signatures::{
        AuditFinding, CommitSignatureProtocol, MerkleHistory, SeededNonceSource, SignatureAuditor,
        SignatureError, SignatureLog, SigningState,
    };
    use node_runtime::{LedgerNode, NodeConfig};
    use serde_json::json;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{Hash, TxId};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    type Signer = CommitSignatureProtocol<SeededNonceSource>;

    fn signer(seed: u8) -> Signer {
        CommitSignatureProtocol::new(
            Ed25519KeyPair::from_seed([seed; 32]),
            SeededNonceSource::new(seed as u64),
        )
    }

    /// A store with one data table, and the digests of `n` committed writes.
    fn ledger(n: u64) -> (Store, Table<u64, u64>, Vec<Hash>) {
        let store = Store::new();
        let table = store.create_table("data").unwrap();
        let digests = (1..=n)
            .map(|i| {
                let mut tx = store.begin();
                tx.put(&table, &i, &(i * 10)).unwrap();
                tx.commit().unwrap().receipt().unwrap().entry.digest()
            })
            .collect();
        (store, table, digests)
    }

    fn feed(signer: &mut Signer, digests: &[Hash]) {
        for (i, digest) in digests.iter().enumerate() {
            signer.append_entry(i as u64 + 1, digest).unwrap();
        }
    }

    fn counter_node(interval: u64) -> LedgerNode<SeededNonceSource> {
        let mut config = NodeConfig::default();
        config.partitions = 1;
        config.signing.signature_interval = interval;
        let node = LedgerNode::with_signer(
            config,
            Ed25519KeyPair::from_seed([8; 32]),
            SeededNonceSource::new(8),
        )
        .unwrap();
        node.install_script(
            "POST count",
            &Script::from_program(&json!({"$let": [
                "n", {"$add": [{"$if": [{"$has": ["pub0", "n"]}, {"$get": ["pub0", "n"]}, 0]}, 1]},
                {"$do": [{"$put": ["pub0", "n", {"$var": "n"}]}, {"result": {"$var": "n"}}]}
            ]})),
        )
        .unwrap();
        node
    }

    // =============================================================================
    // SIGNED ROOTS COVER THE LEDGER
    // =============================================================================

    #[test]
    fn test_every_entry_is_provable_under_signed_root() {
        let (store, _table, digests) = ledger(5);
        let log = SignatureLog::create(&store).unwrap();
        let mut signer = signer(1);
        feed(&mut signer, &digests);

        let signature = signer.sign(1).unwrap().unwrap();
        assert_eq!(signature.seqno, 6);
        signature.verify().unwrap();
        assert_eq!(signature.frontier().unwrap().root().unwrap(), signature.root);

        // The signature lands in the ledger at exactly its own seqno.
        let mut tx = store.begin();
        log.put(&mut tx, &signature).unwrap();
        let receipt = tx.commit_expecting(6).unwrap().receipt().cloned().unwrap();
        signer.append_entry(receipt.version, &receipt.entry.digest()).unwrap();

        let history = signer.history();
        for (i, digest) in digests.iter().enumerate() {
            let proof = history.inclusion_proof(i as u64).unwrap();
            // Proofs against the current tree need the current root...
            assert!(MerkleHistory::verify_inclusion(&proof, digest, &history.root()));
        }
        // ...and the signed root is the tree before the signature entry.
        assert_eq!(history.root_at(5), Some(signature.root));
        assert_eq!(
            MerkleHistory::from_digests(&digests).root(),
            signature.root
        );
    }

    #[test]
    fn test_signers_of_the_same_ledger_agree_on_roots() {
        let (_store, _table, digests) = ledger(7);
        let mut a = signer(1);
        let mut b = signer(2);
        feed(&mut a, &digests);
        feed(&mut b, &digests);

        let sig_a = a.sign(1).unwrap().unwrap();
        let sig_b = b.sign(1).unwrap().unwrap();
        assert_eq!(sig_a.root, sig_b.root);
        assert_ne!(sig_a.node(), sig_b.node());
        assert_ne!(sig_a.base.sig, sig_b.base.sig);

        let report = SignatureAuditor::new()
            .with_ledger(&digests)
            .audit([sig_a, sig_b]);
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!(report.nodes, 2);
    }

    #[test]
    fn test_commit_point_is_carried_in_signatures() {
        let (_store, _table, digests) = ledger(4);
        let mut signer = signer(4);
        feed(&mut signer, &digests[..2]);
        signer.observe_commit(TxId::new(1, 2)).unwrap();
        let first = signer.sign(1).unwrap().unwrap();
        assert_eq!(first.commit_id(), TxId::new(1, 2));

        assert!(matches!(
            signer.observe_commit(TxId::new(1, 9)),
            Err(SignatureError::CommitBeyondHistory { commit: 9, .. })
        ));
    }

    // =============================================================================
    // NODE SIGNATURE LOG AUDITS
    // =============================================================================

    #[test]
    fn test_node_signature_log_is_clean() {
        let node = counter_node(2);
        for _ in 0..5 {
            node.handle_request(&Request::new("POST", "count"));
        }
        let signatures = node.signatures().unwrap();
        assert_eq!(
            signatures.iter().map(|s| s.seqno).collect::<Vec<_>>(),
            vec![3, 6, 9]
        );
        for pair in signatures.windows(2) {
            let opened = pair[1].base.revealed_nonce.as_ref().unwrap();
            assert!(pair[0].base.hashed_nonce.is_opened_by(opened));
        }

        let report = node.audit().unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!(report.signatures_checked, 3);
        assert_eq!(node.stats().signing_state, "commit-known(9, commit=1.9)");
    }

    #[test]
    fn test_tampered_root_is_reported() {
        let node = counter_node(2);
        for _ in 0..5 {
            node.handle_request(&Request::new("POST", "count"));
        }
        let mut signatures = node.signatures().unwrap();
        signatures[1].root[0] ^= 0xff;

        let report = SignatureAuditor::new().audit(signatures);
        assert!(report.findings.iter().any(|f| matches!(
            f,
            AuditFinding::InvalidSignature { seqno: 6, .. }
        )));
    }

    #[test]
    fn test_withheld_signature_breaks_nonce_chain() {
        let node = counter_node(2);
        for _ in 0..5 {
            node.handle_request(&Request::new("POST", "count"));
        }
        let mut signatures = node.signatures().unwrap();
        signatures.remove(1);

        let report = SignatureAuditor::new().audit(signatures);
        assert!(report.findings.iter().any(AuditFinding::is_equivocation));
        assert!(report.findings.contains(&AuditFinding::NonceMismatch {
            node: node.node_id(),
            seqno: 9,
            previous_seqno: 3,
        }));
    }

    #[test]
    fn test_dedicated_reveal_replaces_in_signature_reveal() {
        let (_store, _table, digests) = ledger(4);
        let mut signer = signer(6);
        feed(&mut signer, &digests[..2]);
        let first = signer.sign(1).unwrap().unwrap();
        signer.append_entry(3, &[0xaa; 32]).unwrap();

        let reveal = signer.reveal_pending().unwrap().unwrap();
        assert_eq!(reveal.seqno, first.seqno);
        assert!(signer.reveal_pending().unwrap().is_none());

        signer.append_entry(4, &digests[3]).unwrap();
        let second = signer.sign(1).unwrap().unwrap();
        assert!(second.base.revealed_nonce.is_none());

        let signatures = vec![first, second];
        let with_reveal = SignatureAuditor::new()
            .with_reveals([reveal])
            .audit(signatures.clone());
        assert!(with_reveal.is_clean(), "{:?}", with_reveal.findings);

        let without = SignatureAuditor::new().audit(signatures);
        assert!(without
            .findings
            .iter()
            .any(|f| matches!(f, AuditFinding::MissingReveal { seqno: 5, previous_seqno: 3, .. })));
    }

    // =============================================================================
    // INTEGRITY FAULTS ARE TERMINAL
    // =============================================================================

    #[test]
    fn test_gap_in_ledger_halts_signer() {
        let (_store, _table, digests) = ledger(3);
        let mut signer = signer(7);
        signer.append_entry(1, &digests[0]).unwrap();

        let err = signer.append_entry(3, &digests[2]).unwrap_err();
        assert!(err.is_fatal());
        assert!(signer.is_halted());
        assert_eq!(signer.state(), SigningState::Halted);

        assert!(matches!(signer.sign(1), Err(SignatureError::Halted(_))));
        assert!(matches!(
            signer.append_entry(2, &digests[1]),
            Err(SignatureError::Halted(_))
        ));
    }
}
