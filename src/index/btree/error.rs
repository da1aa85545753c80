use thiserror::Error;

use crate::common::types::PageId;
use crate::storage::buffer::BufferPoolError;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("buffer pool error: {0}")]
    Buffer(#[from] BufferPoolError),

    #[error("page {0} is not a valid index page")]
    CorruptPage(PageId),

    #[error("page {0} is not write-latched by this operation")]
    NotLatched(PageId),

    #[error("fanout {0} does not fit in a page")]
    FanoutTooLarge(u32),
}
