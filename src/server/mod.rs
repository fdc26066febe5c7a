pub mod link;
pub mod stream;

use self::{link::ACK, stream::Stream};

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use codec::HEADER_SIZE;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

/// Upper bound for one framed packet; a connection declaring more than
/// this is assumed hostile or corrupt and is dropped.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Binds the overlay listener and spawns the accept loop. Returns the
/// actually bound address so port 0 binds resolve before the peer
/// computes its canonical address.
pub async fn start(listen: SocketAddr, stream: &Arc<Stream>) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind(listen).await?;
    let local_addr = listener.local_addr()?;

    let stream = stream.clone();
    tokio::spawn(async move {
        while let Ok((socket, address)) = listener.accept().await {
            log::info!("tcp socket accept: addr={address}, interface={local_addr}");

            let stream = stream.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(socket, &stream).await {
                    log::info!("tcp socket disconnect: addr={address}, err={e}");
                } else {
                    log::info!("tcp socket disconnect: addr={address}");
                }
            });
        }

        log::error!("tcp server close: interface={local_addr}");
    });

    log::info!("overlay listening: listen={local_addr}");

    Ok(local_addr)
}

/// Reads framed packets off one inbound connection, pushing each into
/// the shared inbound queue and answering `ACK` synchronously, until the
/// remote closes or misbehaves.
async fn serve_connection(mut socket: TcpStream, stream: &Stream) -> anyhow::Result<()> {
    socket.set_nodelay(true)?;

    let mut buffer = BytesMut::with_capacity(MAX_PACKET_SIZE);
    loop {
        if socket.read_buf(&mut buffer).await? == 0 {
            return Ok(());
        }

        // One read can carry several packets, or a fraction of one. Cut
        // off complete frames; whatever remains waits for more bytes.
        while buffer.len() >= HEADER_SIZE {
            let size = match codec::packet_size(&buffer) {
                Ok(size) if size <= MAX_PACKET_SIZE => size,
                _ => anyhow::bail!("oversized packet, size={}", buffer.len()),
            };

            if buffer.len() < size {
                break;
            }

            stream.push_inbound(buffer.split_to(size).freeze());
            socket.write_all(ACK).await?;
        }
    }
}
