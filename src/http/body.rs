//! Owned file-descriptor body handle.
//!
//! A message body is never buffered in memory end to end; it is always a
//! file the message owns exclusively, closed on drop via RAII rather than
//! an explicit `close()` call at every error exit.

use std::{
    fs::File,
    io::{self, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// An open file backing one message's body: either a pre-existing file
/// opened read-only, or an anonymous temp file created for buffering.
#[derive(Debug)]
pub(crate) struct BodyHandle {
    file: File,
    pub(crate) length: usize,
    read_cursor: usize,
    /// Source path, kept only for `open_existing` bodies so the builder can
    /// infer `Content-Type` from the extension at header-build time. Temp
    /// bodies never populate this — a router that writes a temp body sets
    /// `content-type` itself (see `/echo`).
    pub(crate) path: Option<PathBuf>,
}

impl BodyHandle {
    /// Opens an existing file read-only and records its size via `fstat`.
    pub(crate) fn open_existing(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len() as usize;
        Ok(Self { file, length, read_cursor: 0, path: Some(path.to_path_buf()) })
    }

    /// Creates an anonymous temp file sized for `length` bytes, unlinking it
    /// immediately while keeping the handle open — the inode is released
    /// automatically whenever the handle is dropped, including on a panic
    /// unwind, without depending on an explicit cleanup call running first.
    pub(crate) fn open_temp() -> io::Result<Self> {
        let dir = std::env::temp_dir();
        let pid = std::process::id();
        let unique = {
            static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
            COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        };
        let path = dir.join(format!("epoll_http-{pid}-{unique}.tmp"));
        let file = File::options().read(true).write(true).create(true).truncate(true).open(&path)?;
        std::fs::remove_file(&path)?;
        Ok(Self { file, length: 0, read_cursor: 0, path: None })
    }

    /// Appends bytes to a temp body, growing the recorded length.
    pub(crate) fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        use std::io::Write;
        self.file.write_all(buf)?;
        self.length += buf.len();
        Ok(())
    }

    /// Rewinds to the start of the file before streaming it out.
    pub(crate) fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.read_cursor = 0;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from the current read cursor.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;
        let n = self.file.read(buf)?;
        self.read_cursor += n;
        Ok(n)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.length.saturating_sub(self.read_cursor)
    }

    /// Reads the whole body from offset zero without disturbing the
    /// instance's own read cursor, via a throwaway `&File` borrow — `File`
    /// implements `Read`/`Seek` for shared references because the offset
    /// lives in the kernel's open-file description, not in this struct.
    /// Lets a router inspect a request body through a shared `&HttpMessage`.
    pub(crate) fn read_all_from_start(&self) -> io::Result<Vec<u8>> {
        use std::io::Read;
        let mut cursor = &self.file;
        cursor.seek(SeekFrom::Start(0))?;
        let mut out = vec![0u8; self.length];
        let mut read = 0;
        while read < out.len() {
            let n = cursor.read(&mut out[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        out.truncate(read);
        Ok(out)
    }
}

// `File`'s own `Drop` closes the descriptor; nothing else to release here.
