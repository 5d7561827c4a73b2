//! Size-triggered file rotation, generalizing `tracing-appender`'s built-in
//! time-based rotation (daily/hourly) into a byte-counted rotation — the
//! original implementation rotates on size, not wall-clock.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct RotationConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub max_bytes: u64,
    pub max_files: usize,
}

pub struct SizeRotatingWriter {
    config: RotationConfig,
    file: File,
    written: u64,
}

impl SizeRotatingWriter {
    pub fn new(config: RotationConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.directory)?;
        let path = config.directory.join(format!("{}.log", config.file_prefix));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(SizeRotatingWriter { config, file, written })
    }

    fn current_path(&self) -> PathBuf {
        self.config.directory.join(format!("{}.log", self.config.file_prefix))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.config.directory.join(format!("{}.log.{index}", self.config.file_prefix))
    }

    fn rotate(&mut self) -> io::Result<()> {
        for index in (1..self.config.max_files).rev() {
            let from = self.rotated_path(index);
            let to = self.rotated_path(index + 1);
            if from.exists() {
                let _ = std::fs::rename(&from, &to);
            }
        }
        let current = self.current_path();
        if current.exists() {
            let _ = std::fs::rename(&current, self.rotated_path(1));
        }
        prune_oldest(&self.config);
        self.file = OpenOptions::new().create(true).append(true).open(self.current_path())?;
        self.written = 0;
        Ok(())
    }
}

fn prune_oldest(config: &RotationConfig) {
    let oldest = config.directory.join(format!("{}.log.{}", config.file_prefix, config.max_files + 1));
    if oldest.exists() {
        let _ = std::fs::remove_file(oldest);
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > self.config.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

pub fn list_rotated_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_when_max_bytes_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SizeRotatingWriter::new(RotationConfig {
            directory: dir.path().to_path_buf(),
            file_prefix: "hydrogen".into(),
            max_bytes: 16,
            max_files: 3,
        })
        .unwrap();

        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"0123456789").unwrap();
        writer.flush().unwrap();

        let files = list_rotated_files(dir.path(), "hydrogen");
        assert!(files.len() >= 2);
    }
}
