use shared_crypto::{HashedNonce, Nonce};

/// Signer-side hash-then-reveal state.
///
/// Signature `k` publishes `H(n_k)`. The pre-image `n_k` stays pending until
/// signature `k + 1` (or a dedicated reveal) discloses it.
#[derive(Debug, Clone, Default)]
pub struct NonceChain {
    pending: Option<Nonce>,
    hashed: Option<HashedNonce>,
}

impl NonceChain {
    /// Chain with nothing published yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit to `fresh`, returning the pending pre-image it replaces and the
    /// new commitment.
    pub fn advance(&mut self, fresh: Nonce) -> (Option<Nonce>, HashedNonce) {
        let revealed = self.pending.take();
        let hashed = fresh.commit();
        self.pending = Some(fresh);
        self.hashed = Some(hashed);
        (revealed, hashed)
    }

    /// Disclose the pending pre-image without committing to a new one.
    pub fn take_pending(&mut self) -> Option<Nonce> {
        self.pending.take()
    }

    /// Last published commitment.
    pub fn hashed(&self) -> Option<HashedNonce> {
        self.hashed
    }

    /// True if a pre-image is still undisclosed.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending pre-image, if any, must open the last commitment.
    pub fn is_consistent(&self) -> bool {
        match (&self.pending, &self.hashed) {
            (Some(nonce), Some(hashed)) => hashed.is_opened_by(nonce),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_pending(&mut self, nonce: Nonce) {
        self.pending = Some(nonce);
    }
}
