//! Materialization: naming, fetching and writing discovered items.
//!
//! # Features
//!
//! - Streaming downloads (one file handle and buffer in flight at a time)
//! - Filename resolution from display name, `Content-Disposition`, final URL and content type
//! - Size-based idempotency: an existing file with the declared length is not fetched again
//! - `.url` shortcut synthesis for web links
//!
//! # Example
//!
//! ```no_run
//! use course_mirror_core::download::{HttpClient, Materializer};
//! use course_mirror_core::progress::TracingObserver;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let observer = TracingObserver;
//! let stats = Materializer::new(&client, &observer)
//!     .materialize(Path::new("./Term 251/MATH101"), &[])
//!     .await;
//! println!("downloaded {}", stats.downloaded);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod materialize;
pub mod naming;

pub use client::{FetchedResponse, HttpClient};
pub use error::DownloadError;
pub use materialize::{MaterializeStats, Materializer, shortcut_body, write_shortcut};
pub use naming::{
    MimeTable, ServerHints, parse_content_disposition, resolve_file_name, resolve_link_name,
    sanitize_component, sanitize_segment, split_display_name,
};
