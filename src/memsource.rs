use crate::datasource::{DataSource, Whence};

/// A source over a byte slice owned by someone else.
///
/// Nothing is copied; the buffer must outlive the source, which the borrow
/// enforces. Each source keeps its own cursor, so any number of them may read
/// the same buffer independently.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    data: &'a [u8],
    pos: usize
}

impl<'a> MemorySource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// The bytes not yet read.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}

fn clamp_offset(offset: u64) -> usize {
    usize::try_from(offset).unwrap_or(usize::MAX)
}

impl DataSource for MemorySource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = std::cmp::min(buf.len(), self.data.len() - self.pos);
        if n > 0 {
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
        }
        n
    }

    fn seek(&mut self, offset: u64, whence: Whence) {
        let len = self.data.len();
        let offset = clamp_offset(offset);

        self.pos = match whence {
            Whence::Start => offset,
            Whence::Current => self.pos.saturating_add(offset),
            Whence::End => len.saturating_sub(offset)
        }.min(len);
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }
}
