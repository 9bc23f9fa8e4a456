//! PhotoDNA is computed by an external service; this crate only defines
//! the client contract.

use async_trait::async_trait;
use mediascan_core::Result;

/// Remote PhotoDNA hashing collaborator.
///
/// Receives the raw content bytes for the duration of the call only and
/// returns the 144-byte robust hash. Transport failures should map to
/// `Error::Inference` or `Error::Io`.
#[async_trait]
pub trait PhotoDnaClient: Send + Sync {
    async fn compute_hash(&self, content: &[u8]) -> Result<Vec<u8>>;

    /// Service name for logging
    fn name(&self) -> &str {
        "photodna"
    }
}
