use std::{
    fs::{File, Metadata},
    io::{BufReader, ErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf}
};
use tracing::{debug, warn};

use crate::datasource::{DataSource, Whence};
use crate::error::OpenError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSourceOptions {
    /// Capacity of the read buffer in front of the file handle.
    pub buffer_size: usize
}

impl Default for FileSourceOptions {
    fn default() -> Self {
        Self { buffer_size: 8 * 1024 }
    }
}

/// A source reading from a file on disk.
///
/// The handle is owned and closed on drop. The size is taken once, at open.
/// Positions past the end are permitted and read as empty. The eof flag
/// follows stdio: it is raised only by a read which runs out of data, and
/// cleared by any seek.
///
/// `Whence::End` counts the offset back from the end, so a positive offset
/// never moves past the end, unlike `fseek` with `SEEK_END`.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    handle: BufReader<File>,
    size: u64,
    pos: u64,
    eof: bool
}

fn size_by_seeking<S: Seek>(s: &mut S) -> std::io::Result<u64> {
    let end = s.seek(SeekFrom::End(0))?;
    s.seek(SeekFrom::Start(0))?;
    Ok(end)
}

// The size from metadata if there is any, else by seeking.
fn size_of<S: Seek>(
    path: &Path,
    metadata: std::io::Result<Metadata>,
    s: &mut S
) -> std::io::Result<u64>
{
    match metadata {
        Ok(md) => Ok(md.len()),
        Err(e) => {
            warn!("metadata for {} unavailable ({e}), seeking to find size", path.display());
            size_by_seeking(s)
        }
    }
}

impl FileSource {
    pub fn open<T: AsRef<Path>>(path: T) -> Result<Self, OpenError> {
        Self::open_with(path, &FileSourceOptions::default())
    }

    pub fn open_with<T: AsRef<Path>>(
        path: T,
        options: &FileSourceOptions
    ) -> Result<Self, OpenError>
    {
        let path = path.as_ref();

        let mut file = File::open(path)
            .map_err(|e| OpenError::new(path, e))?;

        let metadata = file.metadata();
        let size = size_of(path, metadata, &mut file)
            .map_err(|e| OpenError::new(path, e))?;

        debug!("opened {} ({size} bytes)", path.display());

        Ok(
            Self {
                path: path.into(),
                handle: BufReader::with_capacity(options.buffer_size, file),
                size,
                pos: 0,
                eof: false
            }
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying handle. Its OS position is not necessarily `tell()`.
    pub fn file(&self) -> &File {
        self.handle.get_ref()
    }

    fn seek_back_from_end(&mut self, offset: u64) -> std::io::Result<u64> {
        let r = match i64::try_from(offset) {
            Ok(back) => self.handle.seek(SeekFrom::End(-back)),
            Err(_) => Err(ErrorKind::InvalidInput.into())
        };

        match r {
            // the target is before the start; land at the start
            Err(e) if e.kind() == ErrorKind::InvalidInput => {
                self.handle.seek(SeekFrom::Start(0))
            },
            r => r
        }
    }
}

impl DataSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;

        while total < buf.len() {
            match self.handle.read(&mut buf[total..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                },
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => {
                    // reported to the caller as a short read
                    warn!(
                        "read from {} at {} failed: {e}",
                        self.path.display(),
                        self.pos + total as u64
                    );
                    break;
                }
            }
        }

        self.pos += total as u64;
        total
    }

    fn seek(&mut self, offset: u64, whence: Whence) {
        let r = match whence {
            Whence::Start => self.handle.seek(SeekFrom::Start(offset)),
            Whence::Current => match i64::try_from(offset) {
                // keeps whatever is already buffered
                Ok(delta) => self.handle
                    .seek_relative(delta)
                    .map(|_| self.pos.saturating_add(offset)),
                Err(_) => self.handle.seek(SeekFrom::Start(self.pos.saturating_add(offset)))
            },
            Whence::End => self.seek_back_from_end(offset)
        };

        match r {
            Ok(pos) => {
                self.pos = pos;
                self.eof = false;
            },
            Err(e) => warn!(
                "seek({offset}, {whence:?}) in {} failed: {e}",
                self.path.display()
            )
        }
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn eof(&self) -> bool {
        self.eof
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::Rng;
    use std::io::Cursor;

    use crate::test_helper::{pattern, temp_with};

    #[test]
    fn size_matches_file() {
        let data = pattern(12345);
        let temp = temp_with(&data);

        let src = FileSource::open(temp.path()).unwrap();
        assert_eq!(src.size(), data.len() as u64);
        assert_eq!(src.tell(), 0);
        assert!(!src.eof());
        assert_eq!(src.path(), temp.path());
    }

    #[test]
    fn read_back_in_arbitrary_chunks() {
        let data = pattern(100_000);
        let temp = temp_with(&data);

        let mut rng = rand::rng();
        for buffer_size in [1, 7, 4096, 65536] {
            let options = FileSourceOptions { buffer_size };
            let mut src = FileSource::open_with(temp.path(), &options).unwrap();

            let mut out = Vec::with_capacity(data.len());
            let mut buf = vec![0; 10_000];
            loop {
                let len = rng.random_range(1..buf.len());
                let n = src.read(&mut buf[..len]);
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }

            assert_eq!(out.len() as u64, src.size());
            assert_eq!(out, data);
            assert!(src.eof());
        }
    }

    #[test]
    fn eof_is_lazy() {
        let temp = temp_with(b"abcd");
        let mut src = FileSource::open(temp.path()).unwrap();

        let mut buf = [0; 4];
        assert_eq!(src.read(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(src.tell(), src.size());
        assert!(!src.eof());

        assert_eq!(src.read(&mut buf), 0);
        assert!(src.eof());
    }

    #[test]
    fn empty_read_does_not_raise_eof() {
        let temp = temp_with(b"ab");
        let mut src = FileSource::open(temp.path()).unwrap();
        src.seek(0, Whence::End);
        assert_eq!(src.read(&mut []), 0);
        assert!(!src.eof());
    }

    #[test]
    fn short_read_raises_eof() {
        let temp = temp_with(b"abcdef");
        let mut src = FileSource::open(temp.path()).unwrap();
        src.seek(4, Whence::Start);

        let mut buf = [0; 8];
        assert_eq!(src.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert!(src.eof());
    }

    #[test]
    fn seek_clears_eof() {
        let temp = temp_with(b"xyz");
        let mut src = FileSource::open(temp.path()).unwrap();

        let mut buf = [0; 8];
        assert_eq!(src.read(&mut buf), 3);
        assert!(src.eof());

        src.seek(1, Whence::Start);
        assert!(!src.eof());
        assert_eq!(src.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"yz");
    }

    #[test]
    fn seek_past_end_is_not_clamped() {
        let temp = temp_with(b"1234");
        let mut src = FileSource::open(temp.path()).unwrap();

        src.seek(100, Whence::Start);
        assert_eq!(src.tell(), 100);

        let mut buf = [0; 4];
        assert_eq!(src.read(&mut buf), 0);
        assert!(src.eof());
        assert_eq!(src.tell(), 100);
    }

    #[test]
    fn seek_from_end() {
        let temp = temp_with(b"0123456789");
        let mut src = FileSource::open(temp.path()).unwrap();

        src.seek(3, Whence::End);
        assert_eq!(src.tell(), 7);

        let mut buf = [0; 8];
        assert_eq!(src.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"789");

        src.seek(0, Whence::End);
        assert_eq!(src.tell(), 10);

        // before the start lands at the start
        src.seek(50, Whence::End);
        assert_eq!(src.tell(), 0);

        src.seek(u64::MAX, Whence::End);
        assert_eq!(src.tell(), 0);
    }

    #[test]
    fn seek_relative_within_buffer() {
        let temp = temp_with(b"0123456789");
        let mut src = FileSource::open(temp.path()).unwrap();

        let mut buf = [0; 2];
        assert_eq!(src.read(&mut buf), 2);

        src.seek(3, Whence::Current);
        assert_eq!(src.tell(), 5);
        assert_eq!(src.read(&mut buf), 2);
        assert_eq!(&buf, b"56");

        src.seek(0, Whence::Current);
        assert_eq!(src.tell(), 7);
    }

    #[test]
    fn open_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let err = FileSource::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.path, path);
    }

    #[test]
    fn size_by_seeking_restores_position() {
        let mut cur = Cursor::new(vec![0u8; 33]);
        cur.set_position(5);
        assert_eq!(size_by_seeking(&mut cur).unwrap(), 33);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn size_of_without_metadata_seeks() {
        let mut cur = Cursor::new(vec![0u8; 33]);
        cur.set_position(5);

        let missing = Err(std::io::Error::other("no metadata"));
        assert_eq!(size_of(Path::new("x"), missing, &mut cur).unwrap(), 33);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn size_of_prefers_metadata() {
        let temp = temp_with(&pattern(77));
        let md = temp.as_file().metadata();

        // the seek fallback would say 0
        let mut cur = Cursor::new(Vec::<u8>::new());
        assert_eq!(size_of(temp.path(), md, &mut cur).unwrap(), 77);
    }

    #[test]
    fn size_of_fails_when_seeking_fails() {
        struct NoSeek;

        impl Seek for NoSeek {
            fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
                Err(ErrorKind::Unsupported.into())
            }
        }

        let missing = Err(std::io::Error::other("no metadata"));
        let err = size_of(Path::new("x"), missing, &mut NoSeek).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
