use crate::Transaction;

/// Decides whether a transaction may enter the pending pool.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction) -> bool;
}

/// Accepts every transaction. Provides no authenticity whatsoever.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _tx: &Transaction) -> bool {
        true
    }
}
