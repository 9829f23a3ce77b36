//! Trait abstraction over the link to the remote collector

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a transport send
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The local send or write call failed
    #[error("send failed: {0}")]
    Send(String),

    /// The peer closed the stream or accepted no bytes
    #[error("transport closed")]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WriteZero | std::io::ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Send(e.to_string()),
        }
    }
}

/// Link carrying log records to the collector.
///
/// Success only means the bytes left this device; no transport reports
/// whether the collector received them.
#[async_trait]
pub trait Transport: Send {
    /// Send one record.
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Push out anything the transport still holds.
    async fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Human-readable destination, for logs.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload).await
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_mapping() {
        let closed: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(closed, TransportError::Closed);

        let zero: TransportError = io::Error::new(io::ErrorKind::WriteZero, "zero").into();
        assert_eq!(zero, TransportError::Closed);

        let other: TransportError = io::Error::new(io::ErrorKind::Other, "unreachable").into();
        assert!(matches!(other, TransportError::Send(msg) if msg.contains("unreachable")));
    }

    #[tokio::test]
    async fn test_boxed_transport_forwards() {
        let mock = mocks::ScriptedTransport::new();
        let mut boxed: Box<dyn Transport> = Box::new(mock.clone());

        boxed.send(b"hello\n").await.unwrap();
        boxed.flush().await.unwrap();

        assert_eq!(mock.sent(), vec![b"hello\n".to_vec()]);
        assert_eq!(mock.flushes(), 1);
        assert_eq!(boxed.describe(), "mock");
    }
}
