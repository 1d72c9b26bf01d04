//! MySQL client ownership and health state.
//!
//! The engine runs over exactly one session at a time. This module owns it:
//! establishing it, answering health checks, and dropping it when a cycle
//! reports the session stale. Retry policy lives in the supervisor, not here.

use crate::error::SyncError;
use mysql_async::{Conn, Opts, Pool};

/// The single MySQL session the sync engine runs over.
pub struct MySqlClient {
    pool: Pool,
    conn: Option<Conn>,
}

impl MySqlClient {
    pub fn new(opts: Opts) -> Self {
        MySqlClient {
            pool: Pool::new(opts),
            conn: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Establish the session. On failure the state stays disconnected and
    /// the error is returned to the caller; no retry happens here.
    pub async fn connect(&mut self) -> Result<(), SyncError> {
        match self.pool.get_conn().await {
            Ok(conn) => {
                self.conn = Some(conn);
                Ok(())
            }
            Err(e) => {
                self.conn = None;
                Err(SyncError::Connection(e))
            }
        }
    }

    /// Borrow the established session for one cycle.
    pub fn conn(&mut self) -> Result<&mut Conn, SyncError> {
        self.conn.as_mut().ok_or(SyncError::NotConnected)
    }

    /// Drop the session after a connection-invalidating error; the next
    /// supervisor tick will reconnect.
    pub fn invalidate(&mut self) {
        self.conn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MySqlClient {
        let opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname("localhost")
            .user(Some("easytrade"))
            .pass(Some("masterkey"))
            .db_name(Some("easytrade_db"))
            .into();
        MySqlClient::new(opts)
    }

    #[test]
    fn test_starts_disconnected() {
        let mut client = client();
        assert!(!client.is_connected());
        assert!(matches!(client.conn(), Err(SyncError::NotConnected)));
    }

    #[test]
    fn test_invalidate_is_safe_when_disconnected() {
        let mut client = client();
        client.invalidate();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        // Port 1 is never serving MySQL; the connect must fail fast.
        let opts = mysql_async::OptsBuilder::default()
            .ip_or_hostname("127.0.0.1")
            .tcp_port(1)
            .user(Some("easytrade"))
            .pass(Some("masterkey"))
            .db_name(Some("easytrade_db"))
            .into();
        let mut client = MySqlClient::new(opts);

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, SyncError::Connection(_)));
        assert!(err.invalidates_connection());
        assert!(!client.is_connected());
    }
}
