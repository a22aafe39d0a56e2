//! Store backends.

pub mod local;
pub mod redis;

pub use local::LocalStore;
pub use redis::RedisStore;
