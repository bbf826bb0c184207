//! File access collaborators.
//!
//! The engine never touches `std::fs` directly: writers obtain handles from a
//! [`FileWriterFactory`], readers from a [`FileReaderFactory`]. Two
//! implementations ship with the crate:
//!
//! * [`FsStorage`]: files under a root directory, with an explicit
//!   [`OverwritePolicy`];
//! * [`MemoryStorage`]: named in-memory buffers shared between clones,
//!   handy for tests and for callers that want many cheap read handles.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A readable, seekable handle whose total size is known.
pub trait FileReader: Read + Seek + Send {
    fn size(&mut self) -> io::Result<u64> {
        let here = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(here))?;
        Ok(end)
    }
}

impl<T: Read + Seek + Send> FileReader for T {}

/// A writable, seekable handle. Seeking back is only used for the
/// fixed-width patches made at finalize.
pub trait FileWriter: Write + Seek + Send {}

impl<T: Write + Seek + Send> FileWriter for T {}

pub trait FileReaderFactory: Send + Sync {
    fn open(&self, name: &str) -> io::Result<Box<dyn FileReader>>;
}

pub trait FileWriterFactory: Send + Sync {
    fn create(&self, name: &str) -> io::Result<Box<dyn FileWriter>>;
}

// ── Filesystem ───────────────────────────────────────────────────────────────

/// What `create` does when the target already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Fail with `AlreadyExists`.
    #[default]
    Refuse,
    Truncate,
}

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
    overwrite: OverwritePolicy,
}

impl FsStorage {
    /// Names are resolved relative to `root`; absolute names are used as is.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_owned(), overwrite: OverwritePolicy::default() }
    }

    /// Storage rooted at the current directory.
    pub fn cwd() -> Self {
        Self::new(".")
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl FileReaderFactory for FsStorage {
    fn open(&self, name: &str) -> io::Result<Box<dyn FileReader>> {
        let file = File::open(self.path_of(name))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

impl FileWriterFactory for FsStorage {
    fn create(&self, name: &str) -> io::Result<Box<dyn FileWriter>> {
        let path = self.path_of(name);
        let mut opts = OpenOptions::new();
        opts.write(true);
        match self.overwrite {
            OverwritePolicy::Refuse => opts.create_new(true),
            OverwritePolicy::Truncate => opts.create(true).truncate(true),
        };
        let file = opts.open(&path)?;
        debug!(path = %path.display(), "created track file");
        Ok(Box::new(BufWriter::new(file)))
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

type FileMap = Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>;

/// Named byte buffers. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: FileMap,
}

fn lock(files: &FileMap) -> MutexGuard<'_, HashMap<String, Arc<Vec<u8>>>> {
    // A panic while holding the lock cannot leave a half-written entry.
    files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        lock(&self.files).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.files).contains_key(name)
    }

    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        lock(&self.files).insert(name.to_owned(), Arc::new(bytes));
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        lock(&self.files).remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.files).keys().cloned().collect();
        names.sort();
        names
    }
}

/// Immutable snapshot handed to readers.
#[derive(Debug, Clone)]
pub struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl FileReaderFactory for MemoryStorage {
    fn open(&self, name: &str) -> io::Result<Box<dyn FileReader>> {
        let bytes = self
            .get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no file named {name}")))?;
        Ok(Box::new(Cursor::new(SharedBytes(bytes))))
    }
}

impl FileWriterFactory for MemoryStorage {
    fn create(&self, name: &str) -> io::Result<Box<dyn FileWriter>> {
        let writer = MemoryWriter {
            name: name.to_owned(),
            files: Arc::clone(&self.files),
            buf: Cursor::new(Vec::new()),
        };
        writer.commit();
        Ok(Box::new(writer))
    }
}

/// Buffers writes and publishes a snapshot on every flush and on drop.
struct MemoryWriter {
    name: String,
    files: FileMap,
    buf: Cursor<Vec<u8>>,
}

impl MemoryWriter {
    fn commit(&self) {
        lock(&self.files).insert(self.name.clone(), Arc::new(self.buf.get_ref().clone()));
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buf.seek(pos)
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}
