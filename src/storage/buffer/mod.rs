pub mod lru_replacer;
pub mod manager;

pub use lru_replacer::LruReplacer;
pub use manager::{BufferPoolError, BufferPoolManager};
