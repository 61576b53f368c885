pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: u64 = 0;
pub const DEFAULT_DIFFICULTY: usize = 4;
pub const DEFAULT_MINING_REWARD: u64 = 10;
pub const SYSTEM_SENDER: &str = "SYSTEM";
pub const NETWORK_RECEIVER: &str = "NETWORK";
pub const TAMPERED_RECEIVER: &str = "HACKER";
/// Nonce attempts between checks of the cancellation flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 1024;
