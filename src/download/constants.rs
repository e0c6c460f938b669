//! Constants for the download module.

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Leading bytes of every PDF document.
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into a file the PDF magic may appear after leading whitespace.
pub const PDF_SNIFF_WINDOW: usize = 1024;
