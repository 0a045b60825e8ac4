//! Rotating gzip writer for record streams.
//!
//! [`FileDriver`] pulls records from a stream one at a time and appends them
//! to `tweets-<N>.jsonl.gz` in its root folder. Before each record is pulled
//! the current file size is compared to the threshold; once it is exceeded
//! the file is finished and writing continues in `tweets-<N+1>.jsonl.gz`.
//!
//! Every time a file is opened a new gzip member is started, so restarting
//! the process appends a member to the last file instead of writing into the
//! middle of an existing deflate stream. Decoders must therefore read files
//! as multi-member gzip (`flate2::read::MultiGzDecoder`).

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::StreamExt;
use futures_util::stream::Stream;
use tracing::{debug, info, instrument, trace};

use super::error::DriverError;
use super::naming::{filename_for_index, latest_index};

/// Default size threshold before rotating to a new file (1 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30;

/// Counters describing one [`FileDriver::write_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records written.
    pub records: u64,
    /// Uncompressed bytes written.
    pub bytes: u64,
    /// Files opened for writing, including files rotated away from immediately.
    pub files_opened: u64,
    /// Index of the last file written to.
    pub last_index: u64,
}

/// Result of writing to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    /// The file exceeded the threshold; the remaining records belong elsewhere.
    Full,
    /// The record stream ended.
    Exhausted,
}

/// Writes a record stream into size-rotated gzip files in one folder.
///
/// The driver assumes it is the only writer in its folder.
#[derive(Debug, Clone)]
pub struct FileDriver {
    root: PathBuf,
    max_file_size: u64,
}

impl FileDriver {
    /// Creates a driver writing into `root`, creating the folder if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotADirectory`] if `root` exists and is not a
    /// directory, [`DriverError::InvalidMaxFileSize`] if `max_file_size` is 0,
    /// and [`DriverError::Io`] if the folder cannot be created.
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Result<Self, DriverError> {
        let root = root.into();
        if max_file_size == 0 {
            return Err(DriverError::InvalidMaxFileSize {
                value: max_file_size,
            });
        }
        if root.exists() && !root.is_dir() {
            return Err(DriverError::not_a_directory(root));
        }
        fs::create_dir_all(&root).map_err(|e| DriverError::io(root.clone(), e))?;
        debug!(root = %root.display(), max_file_size, "output folder ready");
        Ok(Self {
            root,
            max_file_size,
        })
    }

    /// Creates a driver with [`DEFAULT_MAX_FILE_SIZE`].
    ///
    /// # Errors
    ///
    /// Same as [`FileDriver::new`].
    pub fn with_default_size(root: impl Into<PathBuf>) -> Result<Self, DriverError> {
        Self::new(root, DEFAULT_MAX_FILE_SIZE)
    }

    /// Returns the destination folder.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the rotation threshold in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Returns the path of the file for a rotation index.
    #[must_use]
    pub fn path_for_index(&self, index: u64) -> PathBuf {
        self.root.join(filename_for_index(index))
    }

    /// Returns the index of the file the next record should go to.
    ///
    /// Only regular files directly inside the root folder are considered.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] if the folder cannot be listed.
    pub fn current_index(&self) -> Result<u64, DriverError> {
        let entries = fs::read_dir(&self.root).map_err(|e| DriverError::io(self.root.clone(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DriverError::io(self.root.clone(), e))?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(latest_index(names))
    }

    /// Writes every record of `records` to the rotated files, in order.
    ///
    /// Records are written verbatim and must already carry their delimiter.
    /// Returns when the stream ends.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] on any local storage failure and
    /// [`DriverError::Upstream`] when the stream yields an error. The open
    /// file is finished before either error is returned.
    #[instrument(skip(self, records), fields(root = %self.root.display()))]
    pub async fn write_all<S, E>(&self, mut records: S) -> Result<WriteSummary, DriverError>
    where
        S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut index = self.current_index()?;
        let mut summary = WriteSummary {
            last_index: index,
            ..WriteSummary::default()
        };
        info!(index, "resuming at rotation index");

        loop {
            let path = self.path_for_index(index);
            summary.files_opened += 1;
            summary.last_index = index;
            match self.write_until_full(&path, &mut records, &mut summary).await? {
                FileOutcome::Full => index += 1,
                FileOutcome::Exhausted => break,
            }
        }

        info!(
            records = summary.records,
            bytes = summary.bytes,
            files = summary.files_opened,
            last_index = summary.last_index,
            "record stream ended"
        );
        Ok(summary)
    }

    /// Appends records to one file until it is over the threshold or the
    /// stream ends.
    ///
    /// The size is checked before each record is pulled, so a record is never
    /// taken from the stream unless it will be written to this file.
    pub(crate) async fn write_until_full<S, E>(
        &self,
        path: &Path,
        records: &mut S,
        summary: &mut WriteSummary,
    ) -> Result<FileOutcome, DriverError>
    where
        S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        info!(path = %path.display(), "starting to write to file");
        let mut output = OutputFile::open(path)?;

        loop {
            let size = output.settled_size(self.max_file_size)?;
            if size > self.max_file_size {
                info!(
                    path = %path.display(),
                    size,
                    max_file_size = self.max_file_size,
                    "maximum file size reached, rotating"
                );
                output.finish()?;
                return Ok(FileOutcome::Full);
            }

            match records.next().await {
                Some(Ok(record)) => {
                    output.write_record(&record)?;
                    summary.records += 1;
                    summary.bytes += record.len() as u64;
                    trace!(path = %path.display(), len = record.len(), "record written");
                }
                Some(Err(error)) => {
                    output.finish()?;
                    return Err(DriverError::upstream(error));
                }
                None => {
                    output.finish()?;
                    return Ok(FileOutcome::Exhausted);
                }
            }
        }
    }
}

/// Uncompressed bytes the encoder may hold before a sync flush is forced.
const FLUSH_INTERVAL_BYTES: u64 = 64 * 1024;

/// Upper bound on what pending bytes can add on disk beyond their own length
/// (stored-block headers, sync-flush marker and gzip trailer).
const MAX_PENDING_OVERHEAD: u64 = 128;

/// An output file opened in append mode.
///
/// The gzip member is started on the first record. A new file that receives
/// no records still gets an empty member when finished; an existing
/// non-empty file that receives no records is left exactly as it was found.
///
/// The encoder is sync-flushed every [`FLUSH_INTERVAL_BYTES`], and earlier
/// when the pending bytes could push the file past the rotation threshold.
struct OutputFile {
    path: PathBuf,
    state: OutputState,
    unflushed: u64,
}

enum OutputState {
    Idle(File),
    Writing(GzEncoder<File>),
    Closed,
}

impl OutputFile {
    fn open(path: &Path) -> Result<Self, DriverError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DriverError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            state: OutputState::Idle(file),
            unflushed: 0,
        })
    }

    /// Current on-disk size, including members from earlier runs.
    fn size(&self) -> Result<u64, DriverError> {
        let file = match &self.state {
            OutputState::Idle(file) => file,
            OutputState::Writing(encoder) => encoder.get_ref(),
            OutputState::Closed => return Ok(0),
        };
        file.metadata()
            .map(|meta| meta.len())
            .map_err(|e| DriverError::io(self.path.clone(), e))
    }

    /// Size to compare against `max_file_size`.
    ///
    /// Pending bytes are flushed first unless the file provably stays within
    /// `max_file_size` once they reach the disk.
    fn settled_size(&mut self, max_file_size: u64) -> Result<u64, DriverError> {
        let on_disk = self.size()?;
        let worst_case = on_disk
            .saturating_add(self.unflushed)
            .saturating_add(MAX_PENDING_OVERHEAD);
        if self.unflushed > 0 && worst_case > max_file_size {
            self.flush()?;
            return self.size();
        }
        Ok(on_disk)
    }

    fn write_record(&mut self, record: &[u8]) -> Result<(), DriverError> {
        let mut encoder = match std::mem::replace(&mut self.state, OutputState::Closed) {
            OutputState::Idle(file) => GzEncoder::new(file, Compression::default()),
            OutputState::Writing(encoder) => encoder,
            OutputState::Closed => {
                return Err(DriverError::io(
                    self.path.clone(),
                    std::io::Error::other("output file already closed"),
                ));
            }
        };
        encoder
            .write_all(record)
            .map_err(|e| DriverError::io(self.path.clone(), e))?;
        self.state = OutputState::Writing(encoder);
        self.unflushed += record.len() as u64;
        if self.unflushed >= FLUSH_INTERVAL_BYTES {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DriverError> {
        if let OutputState::Writing(encoder) = &mut self.state {
            encoder
                .flush()
                .map_err(|e| DriverError::io(self.path.clone(), e))?;
            trace!(path = %self.path.display(), bytes = self.unflushed, "encoder flushed");
        }
        self.unflushed = 0;
        Ok(())
    }

    /// Writes the gzip trailer and syncs to disk.
    ///
    /// A still-empty file gets an empty member so it decodes as valid gzip.
    fn finish(&mut self) -> Result<(), DriverError> {
        let encoder = match std::mem::replace(&mut self.state, OutputState::Closed) {
            OutputState::Writing(encoder) => encoder,
            OutputState::Idle(file) => {
                let len = file
                    .metadata()
                    .map_err(|e| DriverError::io(self.path.clone(), e))?
                    .len();
                if len > 0 {
                    return Ok(());
                }
                GzEncoder::new(file, Compression::default())
            }
            OutputState::Closed => return Ok(()),
        };
        let file = encoder
            .finish()
            .map_err(|e| DriverError::io(self.path.clone(), e))?;
        file.sync_data()
            .map_err(|e| DriverError::io(self.path.clone(), e))?;
        self.unflushed = 0;
        debug!(path = %self.path.display(), "gzip member finished");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use flate2::read::MultiGzDecoder;
    use futures_util::stream;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("source failed")]
    struct SourceFailed;

    fn ok_records(records: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, SourceFailed>> + Unpin {
        stream::iter(
            records
                .iter()
                .map(|r| Ok(r.to_vec()))
                .collect::<Vec<Result<Vec<u8>, SourceFailed>>>(),
        )
    }

    fn decompress(path: &Path) -> Vec<u8> {
        let raw = fs::read(path).unwrap();
        let mut out = Vec::new();
        MultiGzDecoder::new(&raw[..]).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_new_creates_missing_folder() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a").join("b");

        let driver = FileDriver::with_default_size(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(driver.root(), root.as_path());
        assert_eq!(driver.max_file_size(), DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_new_rejects_existing_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("not-a-folder");
        fs::write(&file_path, b"x").unwrap();

        let result = FileDriver::with_default_size(&file_path);

        assert!(matches!(result, Err(DriverError::NotADirectory { .. })));
    }

    #[test]
    fn test_new_rejects_zero_max_file_size() {
        let temp = TempDir::new().unwrap();
        let result = FileDriver::new(temp.path(), 0);
        assert!(matches!(
            result,
            Err(DriverError::InvalidMaxFileSize { value: 0 })
        ));
    }

    #[test]
    fn test_current_index_ignores_directories_and_other_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("tweets-3.jsonl.gz"), b"").unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(temp.path().join("tweets-9.jsonl.gz")).unwrap();

        let driver = FileDriver::with_default_size(temp.path()).unwrap();

        assert_eq!(driver.current_index().unwrap(), 3);
    }

    #[test]
    fn test_current_index_empty_folder_is_zero() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::with_default_size(temp.path()).unwrap();
        assert_eq!(driver.current_index().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_until_full_stops_after_threshold() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::new(temp.path(), 1).unwrap();
        let path = temp.path().join("tmp.gz");
        let mut records = ok_records(&[b"aaaa", b"bbbb"]);
        let mut summary = WriteSummary::default();

        let outcome = driver
            .write_until_full(&path, &mut records, &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Full);
        assert_eq!(decompress(&path), b"aaaa");
        assert_eq!(summary.records, 1);
        // The second record was never pulled.
        assert_eq!(records.next().await.unwrap().unwrap(), b"bbbb");
    }

    #[tokio::test]
    async fn test_write_until_full_on_oversized_file_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::new(temp.path(), 4).unwrap();
        let path = temp.path().join("tweets-0.jsonl.gz");
        fs::write(&path, b"0123456789").unwrap();
        let mut records = ok_records(&[b"record\n"]);
        let mut summary = WriteSummary::default();

        let outcome = driver
            .write_until_full(&path, &mut records, &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Full);
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
        assert_eq!(summary.records, 0);
        assert_eq!(records.next().await.unwrap().unwrap(), b"record\n");
    }

    #[tokio::test]
    async fn test_write_until_full_completes_below_threshold() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::with_default_size(temp.path()).unwrap();
        let path = temp.path().join("tmp.gz");
        let mut records = ok_records(&[b"aaaa\n", b"bbbb\n"]);
        let mut summary = WriteSummary::default();

        let outcome = driver
            .write_until_full(&path, &mut records, &mut summary)
            .await
            .unwrap();

        assert_eq!(outcome, FileOutcome::Exhausted);
        assert_eq!(decompress(&path), b"aaaa\nbbbb\n");
        assert_eq!(summary.bytes, 10);
    }

    #[test]
    fn test_write_all_rotates_one_record_per_file() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::new(temp.path(), 1).unwrap();
        let a = [b"a".repeat(100), b"\n".to_vec()].concat();
        let b = [b"b".repeat(100), b"\n".to_vec()].concat();
        let c = [b"c".repeat(100), b"\n".to_vec()].concat();

        let summary =
            tokio_test::block_on(driver.write_all(ok_records(&[&a, &b, &c]))).unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.files_opened, 4);
        assert_eq!(summary.last_index, 3);
        assert_eq!(decompress(&driver.path_for_index(0)), a);
        assert_eq!(decompress(&driver.path_for_index(1)), b);
        assert_eq!(decompress(&driver.path_for_index(2)), c);
        // The stream ended while the fourth file was current.
        assert!(fs::metadata(driver.path_for_index(3)).unwrap().len() > 0);
        assert!(decompress(&driver.path_for_index(3)).is_empty());
        assert!(!driver.path_for_index(4).exists());
    }

    #[test]
    fn test_write_all_empty_stream_leaves_valid_gzip() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::with_default_size(temp.path()).unwrap();

        let summary = tokio_test::block_on(driver.write_all(ok_records(&[]))).unwrap();

        assert_eq!(summary.records, 0);
        let raw = fs::read(driver.path_for_index(0)).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert!(decompress(&driver.path_for_index(0)).is_empty());
    }

    #[test]
    fn test_finish_leaves_existing_file_without_records_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tweets-0.jsonl.gz");
        fs::write(&path, b"0123456789").unwrap();

        let mut output = OutputFile::open(&path).unwrap();
        output.finish().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
    }

    fn incompressible(len: usize) -> Vec<u8> {
        // Linear congruential bytes; deflate cannot shrink them.
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn test_small_records_stay_buffered_below_threshold() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tweets-0.jsonl.gz");
        let record = incompressible(1000);

        let mut output = OutputFile::open(&path).unwrap();
        output.write_record(&record).unwrap();
        let size = output.settled_size(DEFAULT_MAX_FILE_SIZE).unwrap();

        assert!(size < 500, "record should not be on disk yet: {size} bytes");
        assert_eq!(output.unflushed, 1000);
        output.finish().unwrap();
        assert_eq!(decompress(&path), record);
    }

    #[test]
    fn test_pending_bytes_are_flushed_near_threshold() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tweets-0.jsonl.gz");
        let record = incompressible(1000);

        let mut output = OutputFile::open(&path).unwrap();
        output.write_record(&record).unwrap();
        let size = output.settled_size(1000).unwrap();

        assert!(size > 1000, "flushed size should exceed threshold: {size}");
        assert_eq!(output.unflushed, 0);
    }

    #[test]
    fn test_flush_interval_bounds_pending_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tweets-0.jsonl.gz");
        let chunk = incompressible(16 * 1024);

        let mut output = OutputFile::open(&path).unwrap();
        for _ in 0..4 {
            output.write_record(&chunk).unwrap();
        }

        assert_eq!(output.unflushed, 0);
        assert!(output.size().unwrap() > 64 * 1024);
    }

    #[test]
    fn test_write_all_upstream_error_finishes_open_file() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::with_default_size(temp.path()).unwrap();
        let records = stream::iter(vec![Ok(b"first\n".to_vec()), Err(SourceFailed)]);

        let result = tokio_test::block_on(driver.write_all(records));

        assert!(matches!(result, Err(DriverError::Upstream { .. })));
        assert_eq!(decompress(&driver.path_for_index(0)), b"first\n");
    }

    #[test]
    fn test_write_all_appends_new_member_on_restart() {
        let temp = TempDir::new().unwrap();
        let driver = FileDriver::with_default_size(temp.path()).unwrap();

        tokio_test::block_on(driver.write_all(ok_records(&[b"one\n"]))).unwrap();
        tokio_test::block_on(driver.write_all(ok_records(&[b"two\n", b"three\n"]))).unwrap();

        assert_eq!(decompress(&driver.path_for_index(0)), b"one\ntwo\nthree\n");
    }
}
