pub mod sticky;

pub use sticky::{ArchiveEntry, StickyConfig, ValidationError, MIN_REPOST_DELAY_SECS};
