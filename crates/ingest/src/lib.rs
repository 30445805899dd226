//! Getting header fields off disk.
//!
//! The binary header decoder is an external tool; this crate runs it, parses
//! its tab separated output into field maps, and finds which files to feed it.

pub mod error;
pub mod reader;
pub mod session;
pub mod taglist;
pub mod tsv;

pub use error::{ReaderError, Result};
pub use reader::{FieldReader, HeaderDumpReader};
pub use session::{
    find_first_dicoms, is_dicom_name, is_project, is_session_dir_name, sessions_modified_since,
};
pub use taglist::TagList;
pub use tsv::{parse_line, sanitize_value};
