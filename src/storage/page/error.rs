use thiserror::Error;

use crate::common::types::PageId;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("record is {got} bytes, table stores {expected}-byte records")]
    RecordSize { expected: usize, got: usize },
    #[error("page {0} has no free slot")]
    PageFull(PageId),
    #[error("slot {slot} of page {page_id} is out of range")]
    SlotOutOfRange { page_id: PageId, slot: usize },
    #[error("slot {slot} of page {page_id} is empty")]
    EmptySlot { page_id: PageId, slot: usize },
    #[error("page image is {0} bytes, expected {}", crate::common::types::PAGE_SIZE)]
    ImageSize(usize),
}
