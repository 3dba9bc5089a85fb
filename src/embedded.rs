//! Payloads appended to a host file, typically the running executable.
//!
//! Layout: `[host bytes][payload][payload length as u64 LE]`.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use memmap2::{Mmap, MmapOptions};
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    ops::Deref,
    path::Path
};
use tempfile::NamedTempFile;
use tracing::{debug, debug_span, warn};

use crate::datasource::{DataSource, Whence};
use crate::error::{EmbedError, OpenError};
use crate::filesource::FileSource;
use crate::memsource::MemorySource;

pub const TRAILER_LEN: u64 = 8;

const COPY_BUF_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLocation {
    pub offset: u64,
    pub len: u64
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MapPolicy {
    /// Map the payload, reading it into memory if mapping fails.
    #[default]
    Auto,
    Always,
    Never
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub map_policy: MapPolicy
}

/// The bytes of a loaded payload.
#[derive(Debug)]
pub enum Payload {
    Mapped(Mmap),
    Owned(Vec<u8>)
}

impl Payload {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Payload::Mapped(_))
    }

    /// A source over the payload. It borrows the payload, so the payload
    /// cannot be dropped (or unmapped) while the source is alive.
    pub fn source(&self) -> MemorySource<'_> {
        MemorySource::new(self)
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Payload::Mapped(m) => m,
            Payload::Owned(v) => v
        }
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// Reads and validates the trailer at the end of `src`.
///
/// Leaves the position of `src` just past the trailer.
pub fn read_trailer<S: DataSource + ?Sized>(
    src: &mut S
) -> Result<PayloadLocation, EmbedError>
{
    let size = src.size();
    if size < TRAILER_LEN {
        return Err(EmbedError::TooSmall { size });
    }

    src.seek(TRAILER_LEN, Whence::End);

    let mut trailer = [0; TRAILER_LEN as usize];
    let read = src.read(&mut trailer);
    if read != trailer.len() {
        return Err(EmbedError::ShortRead {
            offset: size - TRAILER_LEN,
            expected: TRAILER_LEN,
            actual: read as u64
        });
    }

    let len = LittleEndian::read_u64(&trailer);
    if len == 0 || len > size - TRAILER_LEN {
        return Err(EmbedError::InvalidSize {
            payload_size: len,
            file_size: size
        });
    }

    Ok(
        PayloadLocation {
            offset: size - TRAILER_LEN - len,
            len
        }
    )
}

pub fn locate<T: AsRef<Path>>(path: T) -> Result<PayloadLocation, EmbedError> {
    let mut src = FileSource::open(path)?;
    read_trailer(&mut src)
}

fn read_payload<S: DataSource + ?Sized>(
    src: &mut S,
    loc: PayloadLocation
) -> Result<Vec<u8>, EmbedError>
{
    let len = usize::try_from(loc.len)
        .map_err(|_| EmbedError::InvalidSize {
            payload_size: loc.len,
            file_size: src.size()
        })?;

    let mut data = vec![0; len];

    src.seek(loc.offset, Whence::Start);
    let read = src.read(&mut data);
    if read != len {
        return Err(EmbedError::ShortRead {
            offset: loc.offset,
            expected: loc.len,
            actual: read as u64
        });
    }

    Ok(data)
}

fn map_payload(
    file: &File,
    loc: PayloadLocation
) -> std::io::Result<Mmap>
{
    let len = usize::try_from(loc.len)
        .map_err(std::io::Error::other)?;

    // SAFETY: the map is read-only and private; the file is opened read-only
    // and must not be truncated while the map is alive.
    unsafe {
        MmapOptions::new()
            .offset(loc.offset)
            .len(len)
            .map(file)
    }
}

/// Loads the payload embedded in the file at `path`.
pub fn load<T: AsRef<Path>>(
    path: T,
    options: &LoadOptions
) -> Result<Payload, EmbedError>
{
    let path = path.as_ref();
    let _span = debug_span!("load", path = ?path).entered();

    let mut src = FileSource::open(path)?;
    let loc = read_trailer(&mut src)?;

    debug!("found payload of {} bytes at {}", loc.len, loc.offset);

    match options.map_policy {
        MapPolicy::Never => read_payload(&mut src, loc).map(Payload::Owned),
        MapPolicy::Always => map_payload(src.file(), loc)
            .map(Payload::Mapped)
            .map_err(EmbedError::io(path)),
        MapPolicy::Auto => match map_payload(src.file(), loc) {
            Ok(m) => Ok(Payload::Mapped(m)),
            Err(e) => {
                warn!("mapping {} failed ({e}), reading into memory", path.display());
                read_payload(&mut src, loc).map(Payload::Owned)
            }
        }
    }
}

/// Loads the payload appended to the running executable.
pub fn load_self_contained(options: &LoadOptions) -> Result<Payload, EmbedError> {
    let exe = std::env::current_exe().map_err(EmbedError::CurrentExe)?;
    load(exe, options)
}

// Copies src from its current position to the end.
fn copy_source<S: DataSource + ?Sized, W: Write>(
    src: &mut S,
    out: &mut W
) -> std::io::Result<u64>
{
    let mut buf = vec![0; COPY_BUF_SIZE];
    let mut total = 0;

    loop {
        let read = src.read(&mut buf);
        if read == 0 {
            break;
        }
        out.write_all(&buf[..read])?;
        total += read as u64;
    }

    Ok(total)
}

fn copy_whole<W: Write>(
    src: &mut FileSource,
    out: &mut W,
    out_path: &Path
) -> Result<u64, EmbedError>
{
    let copied = copy_source(src, out).map_err(EmbedError::io(out_path))?;
    if copied != src.size() {
        return Err(EmbedError::ShortRead {
            offset: 0,
            expected: src.size(),
            actual: copied
        });
    }
    Ok(copied)
}

// True if `out` names the same existing file as `other`.
fn same_file(out: &Path, other: &Path) -> Result<bool, EmbedError> {
    match fs::canonicalize(out) {
        Ok(out) => Ok(out == fs::canonicalize(other).map_err(EmbedError::io(other))?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(EmbedError::io(out)(e))
    }
}

/// Writes `host` followed by `payload` and the trailer to `out`.
///
/// Returns the payload length. The output takes the permissions of the
/// host, so an executable host stays executable. The output is written to a
/// temporary file next to `out` and moved into place only once complete, so
/// a failure leaves `out` untouched. `out` may not be the host or payload.
pub fn append_payload<H, P, O>(
    host: H,
    payload: P,
    out: O
) -> Result<u64, EmbedError>
where
    H: AsRef<Path>,
    P: AsRef<Path>,
    O: AsRef<Path>
{
    let (host, payload, out) = (host.as_ref(), payload.as_ref(), out.as_ref());

    let mut host_src = FileSource::open(host)?;
    let mut payload_src = FileSource::open(payload)?;

    for input in [host, payload] {
        if same_file(out, input)? {
            return Err(EmbedError::SameFile { path: out.into() });
        }
    }

    if payload_src.size() == 0 {
        return Err(EmbedError::Empty);
    }

    let out_dir = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new(".")
    };

    // removed on drop unless persisted
    let mut temp = NamedTempFile::new_in(out_dir)
        .map_err(|e| OpenError::new(out_dir, e))?;

    let (host_len, payload_len) = {
        let mut w = BufWriter::new(temp.as_file_mut());

        let host_len = copy_whole(&mut host_src, &mut w, out)?;
        let payload_len = copy_whole(&mut payload_src, &mut w, out)?;

        w.write_u64::<LittleEndian>(payload_len)
            .and_then(|_| w.flush())
            .map_err(EmbedError::io(out))?;

        (host_len, payload_len)
    };

    let perms = host_src.file()
        .metadata()
        .map_err(EmbedError::io(host))?
        .permissions();
    temp.as_file()
        .set_permissions(perms)
        .map_err(EmbedError::io(temp.path()))?;

    temp.persist(out).map_err(|e| EmbedError::io(out)(e.error))?;

    debug!(
        "embedded {payload_len} bytes from {} after {host_len} bytes of {} in {}",
        payload.display(),
        host.display(),
        out.display()
    );

    Ok(payload_len)
}
