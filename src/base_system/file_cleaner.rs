//! 临时文件的创建与清理。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 一次运行独占的临时文件。`discard` 消耗自身，保证最多删除一次。
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// 在 `dir` 下创建一个随机命名的空文件，例如 `tw-a1B2c3.mp4`。
    pub fn create_in(dir: &Path, prefix: &str, suffix: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件仍存在时删除；返回是否真的删除了文件。
    pub fn discard(self) -> io::Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 放弃清理，把文件留给调用方。
    pub fn keep(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_discard() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = TempArtifact::create_in(dir.path(), "tw-", ".mp4").unwrap();
        let path = tmp.path().to_path_buf();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("tw-") && name.ends_with(".mp4"));
        assert!(path.exists());

        assert!(tmp.discard().unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn discard_of_missing_file_is_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = TempArtifact::create_in(dir.path(), "tw-", ".mp4").unwrap();
        fs::remove_file(tmp.path()).unwrap();
        assert!(!tmp.discard().unwrap());
    }

    #[test]
    fn keep_leaves_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = TempArtifact::create_in(dir.path(), "tw-", ".mp4").unwrap();
        let kept = tmp.keep();
        assert!(kept.exists());
    }
}
