//! Network printer (raw TCP)
//!
//! Most thermal printers accept raw ESC/POS on TCP port 9100. The whole
//! job goes out in one `write_all` on one connection.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

use super::Printer;
use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const TRANSPORT: TransportKind = TransportKind::Socket;

/// Network printer (TCP port 9100)
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl NetworkPrinter {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(30),
        }
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::Configuration(format!("Invalid address: {}", addr)))?;
        Ok(Self::new(addr))
    }

    /// Set connection timeout (also used by [`Printer::is_online`])
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline for sending the job once connected
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    async fn connect(&self) -> PrintResult<TcpStream> {
        tokio::time::timeout(self.connect_timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout {
                transport: TRANSPORT,
                after: self.connect_timeout,
            })?
            .map_err(|e| PrintError::transport(TRANSPORT, format!("{}: {}", self.addr, e)))
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");
        let mut stream = self.connect().await?;

        info!("Connected, sending {} bytes", data.len());
        let send = async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        };

        tokio::time::timeout(self.write_timeout, send)
            .await
            .map_err(|_| PrintError::Timeout {
                transport: TRANSPORT,
                after: self.write_timeout,
            })?
            .map_err(|e| PrintError::transport(TRANSPORT, format!("Write failed: {}", e)))?;

        info!("Print job sent successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn is_online(&self) -> bool {
        match self.connect().await {
            Ok(_) => {
                info!("Printer online");
                true
            }
            Err(e) => {
                warn!(error = %e, "Printer offline");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_from_addr() {
        let printer = NetworkPrinter::from_addr("192.168.1.100:9100").unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        let result = NetworkPrinter::from_addr("invalid");
        assert!(matches!(result, Err(PrintError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_print_sends_all_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        NetworkPrinter::new(addr).print(&data).await.unwrap();

        assert_eq!(server.await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_offline_printer() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let printer = NetworkPrinter::new(addr).with_timeout(Duration::from_millis(500));
        assert!(!printer.is_online().await);

        let err = printer.print(b"x").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }
}
