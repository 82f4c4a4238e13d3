//! Read path: query compilation and result cursors

pub mod compiler;
mod cursor;
mod record;

pub use compiler::{compile, select_from, time_sort_order};
pub use cursor::ChunkedResultCursor;
pub use record::RecordCursor;
