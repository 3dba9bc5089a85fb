use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("Failed to open {}: {source}", path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error
}

impl OpenError {
    pub fn new<T: AsRef<Path>>(path: T, source: std::io::Error) -> Self {
        Self {
            path: path.as_ref().into(),
            source
        }
    }

    pub fn kind(&self) -> std::io::ErrorKind {
        self.source.kind()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("{0}")]
    Open(#[from] OpenError),
    #[error("Error accessing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error
    },
    #[error("Cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("Data is too small ({size} bytes) to hold an embedded payload")]
    TooSmall {
        size: u64
    },
    #[error("Short read at {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64
    },
    #[error("Invalid embedded payload size: {payload_size} (file size: {file_size})")]
    InvalidSize {
        payload_size: u64,
        file_size: u64
    },
    #[error("Refusing to embed an empty payload")]
    Empty,
    #[error("Output {} is also an input", path.display())]
    SameFile {
        path: PathBuf
    }
}

impl EmbedError {
    pub(crate) fn io<T: AsRef<Path>>(path: T) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| Self::Io { path, source }
    }
}
