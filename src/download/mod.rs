//! HTTP fetching of PDF bytes to disk.
//!
//! [`HttpClient`] streams a response body into a destination file and removes
//! the file again if anything goes wrong mid-stream. [`sniff_pdf`] checks the
//! written bytes, not the file extension or the server's content type.
//!
//! # Example
//!
//! ```no_run
//! use bibharvest_core::download::{FetchRequest, HttpClient};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let bytes = client
//!     .fetch_to_file(&FetchRequest::new("https://arxiv.org/pdf/2403.01234"), Path::new("out/a.pdf"))
//!     .await?;
//! println!("wrote {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod pdf;

pub use client::{FetchRequest, HttpClient};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use pdf::{remove_partial, sniff_pdf};
