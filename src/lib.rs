//! A crate for reading YXDB columnar record files: LZF-compressed,
//! schema-driven binary exports with typed fixed and variable-length fields.
//!
//! ```no_run
//! let mut reader = yxdb::Reader::open_path("data.yxdb")?;
//! while reader.next() {
//!     let (value, is_null) = reader.read_int64(0)?;
//!     println!("{value} (null: {is_null})");
//! }
//! if let Some(e) = reader.last_error() {
//!     eprintln!("stopped early: {e}");
//! }
//! # Ok::<(), yxdb::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

mod decode;
pub mod error;
mod extractors;
mod lzf;
pub mod metadata;
mod schema;

pub use crate::decode::{Cursor, Reader};
pub use crate::error::{Error, Result};
pub use crate::metadata::{DataType, Field};
