//! UDP link carrying mode messages.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::config::OscConfig;
use crate::osc::wire::encode_mode;
use crate::osc::{Mode, OscError};

/// Largest datagram accepted from the peer.
const MAX_DATAGRAM: usize = 1536;

/// Sends outbound modes and yields raw inbound datagrams.
pub trait ModeTransport: Send {
    fn send(&mut self, mode: Mode) -> Result<(), OscError>;

    /// Next pending datagram, or `None` when nothing is waiting.
    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, OscError>;
}

/// Client socket to a fixed peer plus a non-blocking server socket.
pub struct UdpModeLink {
    client: UdpSocket,
    server: UdpSocket,
    remote: SocketAddr,
    buffer: Vec<u8>,
}

impl UdpModeLink {
    pub fn from_config(config: &OscConfig) -> Result<Self, OscError> {
        let listen = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.listen_port);
        Self::bind(&config.remote_host, config.remote_port, listen)
    }

    /// Resolves the peer once and binds both sockets.
    ///
    /// # Parameters
    ///
    /// - `remote_host`: Host name or address of the peer
    /// - `remote_port`: Port the peer listens on
    /// - `listen`: Local address for inbound datagrams (port 0 picks one)
    ///
    /// # Errors
    ///
    /// - [`OscError::Resolve`] when `remote_host:remote_port` does not resolve
    /// - [`OscError::Io`] when a socket cannot be bound or configured
    pub fn bind(remote_host: &str, remote_port: u16, listen: SocketAddr) -> Result<Self, OscError> {
        let target = format!("{remote_host}:{remote_port}");
        let remote = target
            .to_socket_addrs()
            .map_err(|_| OscError::Resolve(target.clone()))?
            .next()
            .ok_or_else(|| OscError::Resolve(target.clone()))?;

        let client_addr = match remote {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let client = UdpSocket::bind(client_addr)?;

        let server = UdpSocket::bind(listen)?;
        server.set_nonblocking(true)?;

        log::info!(
            "OSC link: sending to {}, listening on {}",
            remote,
            server.local_addr()?
        );

        Ok(Self {
            client,
            server,
            remote,
            buffer: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, OscError> {
        Ok(self.server.local_addr()?)
    }
}

impl ModeTransport for UdpModeLink {
    fn send(&mut self, mode: Mode) -> Result<(), OscError> {
        let bytes = encode_mode(mode)?;
        self.client.send_to(&bytes, self.remote)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Vec<u8>>, OscError> {
        match self.server.recv_from(&mut self.buffer) {
            Ok((len, from)) => {
                log::debug!("OSC: {} bytes from {}", len, from);
                Ok(Some(self.buffer[..len].to_vec()))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    fn recv_within(link: &mut UdpModeLink, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(bytes) = link.try_recv().unwrap() {
                return Some(bytes);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_empty_server_returns_none() {
        let mut link = UdpModeLink::bind("127.0.0.1", 9, loopback()).unwrap();
        assert!(link.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_send_reaches_peer() {
        let mut receiver = UdpModeLink::bind("127.0.0.1", 9, loopback()).unwrap();
        let port = receiver.local_addr().unwrap().port();
        let mut sender = UdpModeLink::bind("127.0.0.1", port, loopback()).unwrap();

        sender.send(Mode::Ar).unwrap();

        let bytes = recv_within(&mut receiver, Duration::from_secs(2)).unwrap();
        assert_eq!(bytes, encode_mode(Mode::Ar).unwrap());
    }
}
