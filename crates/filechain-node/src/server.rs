use filechain_core::Fingerprint;
use filechain_storage::FileStore;
use std::net::SocketAddr;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::watch,
};
use tracing::{debug, error, info, warn};

use crate::{
    constants::ACK_READY,
    protocol::{copy_exact, read_line, write_line, FileHeader, Request, Response},
    NodeConfig, NodeError, Result,
};

/// Serves stored files to peers. Owns no chain state.
#[derive(Clone)]
pub(crate) struct FileServer {
    pub(crate) node_id: String,
    pub(crate) store: FileStore,
    pub(crate) config: NodeConfig,
}

impl FileServer {
    /// Accept loop; one task per inbound connection until `shutdown` flips.
    pub(crate) async fn listen(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        info!(node = %self.node_id, addr = ?listener.local_addr().ok(), "peer listener started");
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle(stream, peer_addr).await {
                                warn!(node = %server.node_id, %peer_addr, error = %e, "peer connection failed");
                            }
                        });
                    }
                    Err(e) => error!(node = %self.node_id, error = %e, "accept failed"),
                },
                _ = shutdown.changed() => break,
            }
        }
        info!(node = %self.node_id, "peer listener stopped");
    }

    async fn handle(&self, stream: TcpStream, peer_addr: SocketAddr) -> Result<()> {
        debug!(node = %self.node_id, %peer_addr, "peer connected");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let line = read_line(&mut reader, self.config.max_line_len, self.config.io_timeout).await?;
        match Request::parse(&line)? {
            Request::RequestFile(fingerprint) => {
                self.serve_file(fingerprint, &mut reader, &mut write_half).await?
            }
        }
        write_half.shutdown().await?;
        Ok(())
    }

    async fn serve_file<R, W>(&self, fingerprint: Fingerprint, reader: &mut R, writer: &mut W) -> Result<()>
    where
        R: tokio::io::AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let io = self.config.io_timeout;
        let Some(entry) = self.store.locate(&fingerprint)? else {
            debug!(node = %self.node_id, %fingerprint, "requested file not held");
            return write_line(writer, &Response::FileNotFound.encode(), io).await;
        };
        let mut file = tokio::fs::File::open(&entry.path).await?;
        let size = file.metadata().await?.len();
        let header = FileHeader {
            name: entry.file_name,
            size,
            fingerprint: fingerprint.clone(),
        };
        write_line(writer, &Response::File(header).encode(), io).await?;

        let ack = read_line(reader, self.config.max_line_len, io).await?;
        if ack != ACK_READY {
            debug!(node = %self.node_id, %ack, "requester did not acknowledge");
            return Ok(());
        }

        let sent = copy_exact(&mut file, writer, size, io).await?;
        if sent < size {
            return Err(NodeError::Truncated {
                received: sent,
                expected: size,
            });
        }
        info!(node = %self.node_id, %fingerprint, bytes = sent, "file served");
        Ok(())
    }
}
