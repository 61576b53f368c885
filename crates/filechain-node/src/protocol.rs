//! Peer wire protocol.
//!
//! One command per connection, each line terminated by `\n`:
//!
//! ```text
//! -> REQUEST_FILE::<fingerprint>
//! <- FILE_NOT_FOUND
//! <- FILE::<name>::<size>::<fingerprint>
//! -> READY
//! <- <size raw bytes>
//! ```

use filechain_core::Fingerprint;
use std::time::Duration;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

use crate::{
    constants::{CHUNK_SIZE, CMD_REQUEST_FILE, CMD_SEPARATOR, RESP_FILE, RESP_FILE_NOT_FOUND},
    NodeError, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    RequestFile(Fingerprint),
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Request::RequestFile(fp) => format!("{CMD_REQUEST_FILE}{CMD_SEPARATOR}{fp}"),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        let (command, argument) = line
            .split_once(CMD_SEPARATOR)
            .ok_or_else(|| NodeError::Protocol(format!("malformed command {line:?}")))?;
        match command {
            CMD_REQUEST_FILE => Ok(Request::RequestFile(parse_fingerprint(argument)?)),
            other => Err(NodeError::Protocol(format!("unknown command {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub name: String,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    FileNotFound,
    File(FileHeader),
}

impl Response {
    pub fn encode(&self) -> String {
        match self {
            Response::FileNotFound => RESP_FILE_NOT_FOUND.to_string(),
            Response::File(h) => format!(
                "{RESP_FILE}{sep}{}{sep}{}{sep}{}",
                h.name,
                h.size,
                h.fingerprint,
                sep = CMD_SEPARATOR
            ),
        }
    }

    pub fn parse(line: &str) -> Result<Self> {
        if line == RESP_FILE_NOT_FOUND {
            return Ok(Response::FileNotFound);
        }
        let rest = line
            .strip_prefix(RESP_FILE)
            .and_then(|r| r.strip_prefix(CMD_SEPARATOR))
            .ok_or_else(|| NodeError::Protocol(format!("unexpected response {line:?}")))?;
        // Split from the right so a name may itself contain the separator.
        let mut parts = rest.rsplitn(3, CMD_SEPARATOR);
        let (Some(fingerprint), Some(size), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(NodeError::Protocol(format!("truncated file header {line:?}")));
        };
        let size = size
            .parse::<u64>()
            .map_err(|_| NodeError::Protocol(format!("bad size {size:?}")))?;
        if name.is_empty() {
            return Err(NodeError::Protocol("empty file name".into()));
        }
        Ok(Response::File(FileHeader {
            name: name.to_string(),
            size,
            fingerprint: parse_fingerprint(fingerprint)?,
        }))
    }
}

fn parse_fingerprint(s: &str) -> Result<Fingerprint> {
    s.parse()
        .map_err(|e| NodeError::Protocol(format!("{e}")))
}

/// Reads one `\n`-terminated line of at most `max_len` bytes.
pub async fn read_line<R>(reader: &mut R, max_len: usize, limit: Duration) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = timeout(
        limit,
        (&mut *reader).take(max_len as u64 + 1).read_until(b'\n', &mut buf),
    )
    .await
    .map_err(|_| NodeError::Timeout("read"))??;
    if n == 0 {
        return Err(NodeError::Protocol("connection closed".into()));
    }
    if buf.last() != Some(&b'\n') {
        return Err(NodeError::Protocol(if buf.len() > max_len {
            format!("line exceeds {max_len} bytes")
        } else {
            "connection closed mid-line".to_string()
        }));
    }
    let line = String::from_utf8(buf).map_err(|_| NodeError::Protocol("line is not utf-8".into()))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn write_line<W>(writer: &mut W, line: &str, limit: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = format!("{line}\n");
    timeout(limit, async {
        writer.write_all(framed.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| NodeError::Timeout("write"))??;
    Ok(())
}

/// Copies up to `size` bytes, bounding each read and write by `idle`.
/// Returns the number of bytes copied; fewer than `size` means the source ended early.
pub async fn copy_exact<R, W>(reader: &mut R, writer: &mut W, size: u64, idle: Duration) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = timeout(idle, reader.read(&mut buf[..want]))
            .await
            .map_err(|_| NodeError::Timeout("read"))??;
        if n == 0 {
            break;
        }
        timeout(idle, writer.write_all(&buf[..n]))
            .await
            .map_err(|_| NodeError::Timeout("write"))??;
        remaining -= n as u64;
    }
    timeout(idle, writer.flush())
        .await
        .map_err(|_| NodeError::Timeout("write"))??;
    Ok(size - remaining)
}
