//! A throwaway named pipe for FIFO transport tests — creates a real Unix
//! FIFO under a temp directory and removes it on drop. A single path opened
//! `O_RDWR` by two `FifoSession`s in the same process gives each end a
//! working read/write pair without needing a second OS process.

use std::path::PathBuf;

use hydrogen_fifo::{FifoConfig, FramingMode, PipeType};

pub struct TempFifo {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl TempFifo {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hydrogen-test.fifo");
        nix::unistd::mkfifo(&path, nix::sys::stat::Mode::S_IRWXU)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(TempFifo { _dir: dir, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// A `FifoConfig` pointed at this pipe with newline framing and short
    /// timeouts, suitable for fast-failing tests.
    pub fn config(&self) -> FifoConfig {
        FifoConfig {
            pipe_name: self.path.to_string_lossy().into_owned(),
            pipe_type: PipeType::UnixFifo,
            framing_mode: FramingMode::Newline,
            ..FifoConfig::default()
        }
    }
}
