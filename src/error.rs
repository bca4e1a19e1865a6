use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid machine file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no program image given, pass one on the command line or in the machine file")]
    MissingImage,

    #[error("image of {size} bytes at {address:#X} does not fit in {memory} bytes of memory")]
    ImageTooLarge {
        size: usize,
        address: u32,
        memory: usize,
    },

    #[error("slice must be a positive number of cycles, got {0}")]
    InvalidSlice(i32),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
