//! Decoding: turns a byte stream into a sequence of typed field reads.

pub(crate) mod reader;
pub(crate) mod record_reader;
pub(crate) mod stream;

pub use reader::Reader;
pub use stream::Cursor;
