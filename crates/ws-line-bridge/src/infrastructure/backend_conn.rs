//! TCP connection management for the backend.
//!
//! Each browser WebSocket session gets its own TCP connection to the fixed
//! backend address.  The backend sees the bridge as an ordinary line-based
//! TCP client.
//!
//! # Closing
//!
//! When the browser goes away the backend socket is torn down *abortively*:
//! `SO_LINGER` is set to zero before the socket is dropped, so the kernel
//! discards unsent data and sends RST instead of the usual FIN handshake.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::application::BridgeError;

/// A connected backend socket.
///
/// The stream is kept whole (not split) so the relay can borrow it for the
/// session and the socket options remain reachable for [`abort`].
///
/// [`abort`]: BackendConnection::abort
pub struct BackendConnection {
    /// The backend TCP stream.
    pub stream: TcpStream,
    /// Address of the backend, for log messages.
    pub peer_addr: SocketAddr,
}

impl BackendConnection {
    /// Opens a new TCP connection to the backend at `addr`.
    ///
    /// When `connect_timeout` is set the attempt is abandoned after that long.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::BackendUnavailable`] if the connection is refused or
    ///   the address is unreachable.
    /// - [`BridgeError::BackendTimeout`] if `connect_timeout` elapses first.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ws_line_bridge::infrastructure::backend_conn::BackendConnection;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let addr = "127.0.0.1:12345".parse()?;
    /// let conn = BackendConnection::connect(addr, None).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(
        addr: SocketAddr,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, BridgeError> {
        let stream = bounded_connect(addr, connect_timeout, TcpStream::connect(addr)).await?;

        // Lines are small and latency-sensitive; don't let Nagle hold them.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY on backend socket: {e}");
        }

        Ok(Self {
            stream,
            peer_addr: addr,
        })
    }

    /// Terminates the connection abortively (RST, no flush).
    ///
    /// Consuming `self` makes a second abort impossible.
    pub fn abort(self) {
        #[allow(deprecated)]
        let linger = self.stream.set_linger(Some(Duration::ZERO));
        if let Err(e) = linger {
            // Dropping still closes the socket, just gracefully.
            debug!("could not set SO_LINGER on backend {}: {e}", self.peer_addr);
        }
        drop(self.stream);
    }
}

/// Awaits a connect attempt, giving up after `limit` if one is set.
async fn bounded_connect<F>(
    addr: SocketAddr,
    limit: Option<Duration>,
    attempt: F,
) -> Result<TcpStream, BridgeError>
where
    F: Future<Output = io::Result<TcpStream>>,
{
    let result = match limit {
        Some(after) => timeout(after, attempt)
            .await
            .map_err(|_| BridgeError::BackendTimeout { addr, after })?,
        None => attempt.await,
    };
    result.map_err(|source| BridgeError::BackendUnavailable { addr, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
