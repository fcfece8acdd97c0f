//! Outbound email transport.

use async_trait::async_trait;

use crate::error::Result;

/// A rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    /// Send one message. Errors are `PulseError::DeliveryFailed`.
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}
