//! # Timeouts
//!
//! Timeout constants shared by configuration defaults and the handshakes,
//! plus a wrapper that turns an elapsed [`tokio::time::timeout`] into
//! [`ProtocolError::Timeout`].

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Connect and disconnect handshake limit
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Time the server waits for clients to acknowledge shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Silence after which a peer is dropped
pub const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle time after which a keepalive is sent
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

/// Delay before an unacknowledged reliable packet is resent
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Sleep between polls while waiting on a handshake
pub const HANDSHAKE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Await `future` for at most `duration`
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_elapsed_maps_to_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        assert_eq!(
            with_timeout_error(async { Ok(7) }, Duration::from_secs(1))
                .await
                .unwrap(),
            7
        );
        let err = with_timeout_error(
            async { Err::<(), _>(ProtocolError::NotConnected) },
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(err, Err(ProtocolError::NotConnected)));
    }
}
