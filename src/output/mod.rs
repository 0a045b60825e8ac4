//! Rotating compressed output for record streams.
//!
//! Records are appended to gzip files named `tweets-<N>.jsonl.gz` in a single
//! folder. When the current file grows past the configured size the driver
//! moves on to the next index; on restart it resumes at the highest index
//! already present.
//!
//! # Example
//!
//! ```no_run
//! use collector_core::output::FileDriver;
//! use futures_util::stream;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = FileDriver::new("./tweets", 64 * 1024 * 1024)?;
//! let records = stream::iter(vec![Ok::<_, std::io::Error>(b"{\"id\":1}\n".to_vec())]);
//! let summary = driver.write_all(records).await?;
//! println!("wrote {} records", summary.records);
//! # Ok(())
//! # }
//! ```

mod driver;
mod error;
mod naming;

pub use driver::{DEFAULT_MAX_FILE_SIZE, FileDriver, WriteSummary};
pub use error::DriverError;
pub use naming::{FILE_EXTENSION, FILE_PREFIX, filename_for_index, index_from_filename, latest_index};
