use std::{
    io,
    net::{SocketAddr, UdpSocket},
};

use crate::family::AddressFamily;

/// A connectionless transport that can send a datagram to an address.
///
/// The client sends every packet through a single `DatagramSink`. Delivery is best-effort: implementations report
/// errors, but the client never retries.
pub trait DatagramSink: Send {
    /// Sends `payload` as a single datagram to `addr`, returning the number of bytes sent.
    ///
    /// # Errors
    ///
    /// If the transport reports an error, it is returned as-is.
    fn send_to(&self, payload: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl DatagramSink for UdpSocket {
    fn send_to(&self, payload: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, addr)
    }
}

/// Opens a UDP socket bound to an ephemeral port on the unspecified address of `family`.
pub(crate) fn bind_udp(family: AddressFamily) -> io::Result<UdpSocket> {
    UdpSocket::bind(SocketAddr::new(family.unspecified(), 0))
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::{bind_udp, DatagramSink};
    use crate::family::AddressFamily;

    #[test]
    fn udp_socket_sends_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let socket = bind_udp(AddressFamily::Ipv4).unwrap();
        let sink: &dyn DatagramSink = &socket;
        let sent = sink.send_to(b"foo:1|c", receiver.local_addr().unwrap()).unwrap();
        assert_eq!(sent, 7);

        let mut buf = [0; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"foo:1|c");
    }
}
