//! # Signature Records
//!
//! Persisted evidence produced by a signing node.
//!
//! The signed payload is the bincode encoding of
//! `(SIGNATURE_DOMAIN, node, seqno, view, commit_seqno, commit_view, root, hashed_nonce)`.
//! The `tree` and `revealed_nonce` fields are outside the signature: the
//! tree is checked against `root`, and the revealed nonce against the
//! previous signature's commitment.

use serde::{Deserialize, Serialize};
use shared_crypto::{
    CryptoError, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature, HashedNonce, Nonce,
};
use shared_types::{Hash, NodeId, SeqNo, TxId, View};

use super::merkle::MerkleFrontier;
use crate::errors::{IntegrityFault, SignatureError};

/// Domain tag of commit-signature payloads.
pub const SIGNATURE_DOMAIN: &str = "ledger-core/commit-signature/v1";
/// Domain tag of nonce-reveal payloads.
pub const REVEAL_DOMAIN: &str = "ledger-core/nonce-reveal/v1";

/// Fields common to every node signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSignature {
    /// Ed25519 signature bytes.
    pub sig: Vec<u8>,
    /// Signer; the bytes are its verifying key.
    pub node: NodeId,
    /// Commitment to this round's nonce.
    pub hashed_nonce: HashedNonce,
    /// Pre-image of the previous round's commitment.
    pub revealed_nonce: Option<Nonce>,
}

impl NodeSignature {
    /// Verifying key of the signer.
    pub fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        Ed25519PublicKey::from_bytes(self.node.0)
    }

    /// Decoded signature.
    pub fn signature(&self) -> Result<Ed25519Signature, CryptoError> {
        Ed25519Signature::from_slice(&self.sig)
    }
}

/// Signature over the Merkle root of every ledger entry before `seqno`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimarySignature {
    /// Ledger position of this signature.
    pub seqno: SeqNo,
    /// View it was produced in.
    pub view: View,
    /// Highest seqno known to be committed when signing.
    pub commit_seqno: SeqNo,
    /// View of `commit_seqno`.
    pub commit_view: View,
    /// Root over entries `1..seqno`.
    pub root: Hash,
    /// Serialized [`MerkleFrontier`] folding to `root`.
    pub tree: Vec<u8>,
    /// Signer, signature and nonce fields.
    pub base: NodeSignature,
}

/// Fields a signature is produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SigningInputs {
    pub node: NodeId,
    pub seqno: SeqNo,
    pub view: View,
    pub commit: TxId,
    pub root: Hash,
}

impl SigningInputs {
    pub(crate) fn payload(&self, hashed_nonce: &HashedNonce) -> Result<Vec<u8>, SignatureError> {
        bincode::serialize(&(
            SIGNATURE_DOMAIN,
            self.node,
            self.seqno,
            self.view,
            self.commit.seqno,
            self.commit.view,
            self.root,
            hashed_nonce,
        ))
        .map_err(|e| SignatureError::Serialization(e.to_string()))
    }
}

impl PrimarySignature {
    pub(crate) fn inputs(&self) -> SigningInputs {
        SigningInputs {
            node: self.base.node,
            seqno: self.seqno,
            view: self.view,
            commit: self.commit_id(),
            root: self.root,
        }
    }

    /// Bytes covered by `base.sig`.
    pub fn payload(&self) -> Result<Vec<u8>, SignatureError> {
        self.inputs().payload(&self.base.hashed_nonce)
    }

    /// Check `base.sig` under the key named by `base.node`.
    pub fn verify(&self) -> Result<(), SignatureError> {
        let key = self.base.public_key()?;
        let sig = self.base.signature()?;
        key.verify(&self.payload()?, &sig)?;
        Ok(())
    }

    /// Decoded, shape-checked frontier.
    pub fn frontier(&self) -> Result<MerkleFrontier, IntegrityFault> {
        MerkleFrontier::from_bytes(&self.tree)
    }

    /// Position of this signature.
    pub fn tx_id(&self) -> TxId {
        TxId::new(self.view, self.seqno)
    }

    /// Commit point it carries.
    pub fn commit_id(&self) -> TxId {
        TxId::new(self.commit_view, self.commit_seqno)
    }

    /// Signer.
    pub fn node(&self) -> NodeId {
        self.base.node
    }
}

/// Disclosure of a pending nonce outside a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceReveal {
    /// Signer.
    pub node: NodeId,
    /// Seqno of the signature whose commitment this opens.
    pub seqno: SeqNo,
    /// The pre-image.
    pub nonce: Nonce,
    /// Signature over `(REVEAL_DOMAIN, node, seqno, nonce)`.
    pub sig: Vec<u8>,
}

impl NonceReveal {
    fn payload(node: &NodeId, seqno: SeqNo, nonce: &Nonce) -> Result<Vec<u8>, SignatureError> {
        bincode::serialize(&(REVEAL_DOMAIN, node, seqno, nonce))
            .map_err(|e| SignatureError::Serialization(e.to_string()))
    }

    pub(crate) fn sign(
        keys: &Ed25519KeyPair,
        node: NodeId,
        seqno: SeqNo,
        nonce: Nonce,
    ) -> Result<Self, SignatureError> {
        let sig = keys.sign(&Self::payload(&node, seqno, &nonce)?);
        Ok(Self {
            node,
            seqno,
            nonce,
            sig: sig.as_bytes().to_vec(),
        })
    }

    /// Check the reveal's own signature.
    pub fn verify(&self) -> Result<(), SignatureError> {
        let key = Ed25519PublicKey::from_bytes(self.node.0)?;
        let sig = Ed25519Signature::from_slice(&self.sig)?;
        key.verify(&Self::payload(&self.node, self.seqno, &self.nonce)?, &sig)?;
        Ok(())
    }

    /// True if the revealed nonce opens `hashed`.
    pub fn opens(&self, hashed: &HashedNonce) -> bool {
        hashed.is_opened_by(&self.nonce)
    }
}
