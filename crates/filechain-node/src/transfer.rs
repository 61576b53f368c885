use filechain_core::Fingerprint;
use filechain_storage::{fingerprint_file, sanitize_file_name, FileStore};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tracing::{info, warn};

use crate::{
    constants::ACK_READY,
    protocol::{copy_exact, read_line, write_line, FileHeader, Request, Response},
    NodeConfig, NodeError, Result,
};

/// Pulls `fingerprint` from the peer at `endpoint` into `store`'s directory.
///
/// The bytes land in a staging file that is renamed into place only once its
/// fingerprint checks out; on any failure the staging file is removed. The
/// returned path is not yet indexed.
pub(crate) async fn fetch(
    peer_id: &str,
    endpoint: SocketAddr,
    fingerprint: &Fingerprint,
    store: &FileStore,
    config: &NodeConfig,
) -> Result<PathBuf> {
    let io = config.io_timeout;
    let stream = timeout(io, TcpStream::connect(endpoint))
        .await
        .map_err(|_| NodeError::Timeout("connect"))??;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_line(&mut write_half, &Request::RequestFile(fingerprint.clone()).encode(), io).await?;
    let line = read_line(&mut reader, config.max_line_len, io).await?;
    let header = match Response::parse(&line)? {
        Response::FileNotFound => {
            return Err(NodeError::FileNotFound {
                peer: peer_id.to_string(),
                fingerprint: fingerprint.clone(),
            })
        }
        Response::File(header) => header,
    };
    if header.fingerprint != *fingerprint {
        return Err(NodeError::Protocol(format!(
            "asked for {fingerprint}, peer offered {}",
            header.fingerprint
        )));
    }
    let name = sanitize_file_name(&header.name)?;
    info!(peer = peer_id, file = %name, size = header.size, "receiving file");

    let partial = store.partial_path(&name, fingerprint)?;
    write_line(&mut write_half, ACK_READY, io).await?;
    let received = receive_into(&partial, &mut reader, &header, config).await;
    let verified = match received {
        Ok(()) => verify(&partial, fingerprint).await,
        Err(e) => Err(e),
    };
    if let Err(e) = verified {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            warn!(path = %partial.display(), error = %cleanup, "could not remove partial download");
        }
        return Err(e);
    }

    let path = store.root().join(name);
    tokio::fs::rename(&partial, &path).await?;
    Ok(path)
}

async fn receive_into<R>(
    partial: &Path,
    reader: &mut R,
    header: &FileHeader,
    config: &NodeConfig,
) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(partial).await?;
    let received = copy_exact(reader, &mut file, header.size, config.io_timeout).await?;
    file.flush().await?;
    if received < header.size {
        return Err(NodeError::Truncated {
            received,
            expected: header.size,
        });
    }
    Ok(())
}

async fn verify(path: &Path, expected: &Fingerprint) -> Result<()> {
    let owned = path.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || fingerprint_file(owned)).await??;
    if actual != *expected {
        warn!(%expected, %actual, "received file failed verification");
        return Err(NodeError::ContentMismatch {
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}
