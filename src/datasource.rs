/// Reference point for a seek offset.
///
/// Offsets are unsigned byte counts. `Start` and `Current` move forward from
/// their reference point; `End` moves backward from the end of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Whence {
    Start,
    Current,
    End
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown whence value: {0}")]
pub struct WhenceError(pub i32);

impl TryFrom<i32> for Whence {
    type Error = WhenceError;

    // SEEK_SET, SEEK_CUR, SEEK_END
    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            _ => Err(WhenceError(v))
        }
    }
}

/// A readable, seekable run of bytes.
///
/// None of the operations fail. A read returning fewer bytes than requested
/// means the data is (nearly) exhausted; seeks which land out of range are
/// handled by the implementation rather than rejected.
pub trait DataSource {
    /// Copies up to `buf.len()` bytes from the current position into `buf`,
    /// advances the position by the number of bytes copied, and returns it.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    fn seek(&mut self, offset: u64, whence: Whence);

    /// Current position, in bytes from the start.
    fn tell(&self) -> u64;

    /// Total length of the data, fixed when the source was created.
    fn size(&self) -> u64;

    fn eof(&self) -> bool;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64, whence: Whence) {
        (**self).seek(offset, whence)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn eof(&self) -> bool {
        (**self).eof()
    }
}

impl<S: DataSource + ?Sized> DataSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64, whence: Whence) {
        (**self).seek(offset, whence)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn eof(&self) -> bool {
        (**self).eof()
    }
}
