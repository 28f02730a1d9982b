use std::io;
use std::net::SocketAddrV4;

use async_trait::async_trait;
use tokio::net::TcpStream;

/// Opens a TCP connection to decide whether a port accepts connections.
///
/// Implementations need not enforce a deadline themselves; the port probe
/// engine wraps every call in its own hard timeout.
#[async_trait]
pub trait PortConnector: Send + Sync {
    async fn connect(&self, addr: SocketAddrV4) -> io::Result<()>;
}

/// Full three-way handshake through the OS stack. Needs no privileges.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl PortConnector for TcpConnector {
    async fn connect(&self, addr: SocketAddrV4) -> io::Result<()> {
        let _stream: TcpStream = TcpStream::connect(addr).await?;
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
