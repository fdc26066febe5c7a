use crate::statistics::{Reporter, Stats};

use std::{io, net::SocketAddr};

use bytes::Bytes;
use codec::address::Address;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

/// The transport-level acknowledgement every receiver sends back.
pub const ACK: &[u8; 3] = b"ACK";

/// An outbound connection to one peer: a FIFO of encoded packets and the
/// socket they get flushed through.
pub struct Link {
    pub address: Address,
    pub is_register: bool,
    out_buf: Vec<Bytes>,
    socket: TcpStream,
}

impl Link {
    pub async fn connect(address: Address, is_register: bool) -> io::Result<Self> {
        let socket = TcpStream::connect(SocketAddr::from(address)).await?;

        // Packets are small and latency matters more than throughput on
        // these links.
        socket.set_nodelay(true)?;

        Ok(Self {
            address,
            is_register,
            out_buf: Vec::new(),
            socket,
        })
    }

    pub fn enqueue(&mut self, bytes: Bytes) {
        self.out_buf.push(bytes);
    }

    /// Sends the buffered packets in FIFO order, waiting for the remote
    /// `ACK` after each one. A reply that is not `ACK` is tolerated with a
    /// warning; an I/O error aborts the flush, drops whatever was still
    /// queued, and tells the owning stream to evict this link.
    pub async fn flush(&mut self, reporter: &Reporter) -> io::Result<()> {
        for bytes in self.out_buf.drain(..) {
            self.socket.write_all(&bytes).await?;

            let mut reply = [0u8; 3];
            self.socket.read_exact(&mut reply).await?;
            if &reply != ACK {
                log::warn!(
                    "transport reply is not ACK: addr={}, reply={:?}",
                    self.address,
                    reply
                );
            }

            reporter.send(
                &self.address,
                &[Stats::SendBytes(bytes.len()), Stats::SendPkts(1)],
            );
        }

        Ok(())
    }
}
