pub mod datasource;
pub mod embedded;
pub mod error;
pub mod filesource;
pub mod hasher;
pub mod memsource;

#[cfg(feature = "capi")]
pub mod capi;

#[cfg(test)]
mod test_helper;

use std::path::Path;

pub use crate::datasource::{DataSource, Whence};
pub use crate::error::{EmbedError, OpenError};
pub use crate::filesource::{FileSource, FileSourceOptions};
pub use crate::memsource::MemorySource;

/// Opens the file at `path` as a source.
pub fn open<T: AsRef<Path>>(path: T) -> Result<Box<dyn DataSource>, OpenError> {
    Ok(Box::new(FileSource::open(path)?))
}

/// Wraps a caller-owned buffer as a source, without copying it.
pub fn wrap(data: &[u8]) -> Box<dyn DataSource + '_> {
    Box::new(MemorySource::new(data))
}
