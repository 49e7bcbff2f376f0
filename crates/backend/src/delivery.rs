use async_trait::async_trait;
use eyre::Result;
use tracing::info;

/// Sends a verification code to an address.
///
/// Delivery is fire-and-forget from the session's point of view: an `Err`
/// is logged as a warning and never blocks verification.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, address: &str, code: &str) -> Result<()>;
}

/// Development sender that writes the code to the log instead of mailing it.
#[derive(Debug, Clone, Default)]
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send_code(&self, address: &str, code: &str) -> Result<()> {
        info!("Verification code for {}: {}", address, code);
        Ok(())
    }
}
