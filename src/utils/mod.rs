pub mod base32;
pub mod lock_cache;
pub mod replay_guard;
