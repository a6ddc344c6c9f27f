//! Helpers shared by the arcstream test suites.

pub mod archive;
pub mod server;

pub use archive::{Compression, TEST_MTIME, TestEntry, compress, tar_archive, zip_archive};
pub use server::{Route, TestHttpServer};
