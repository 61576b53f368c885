pub(crate) const CMD_SEPARATOR: &str = "::";
pub(crate) const CMD_REQUEST_FILE: &str = "REQUEST_FILE";
pub(crate) const RESP_FILE: &str = "FILE";
pub(crate) const RESP_FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
pub(crate) const ACK_READY: &str = "READY";
pub(crate) const DEFAULT_MAX_LINE_LEN: usize = 1024;
pub(crate) const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_STORAGE_ROOT: &str = "./data";
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;
pub(crate) const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
