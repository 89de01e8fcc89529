//! File collaborators used by the `file_read` and `file_write` system actions

use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Status message returned by a successful write
pub const WRITE_OK: &str = "Successfully wrote file.";

/// Reads and writes files on behalf of system actions
#[async_trait]
pub trait FileTools: Send + Sync {
    /// Contents of `path`
    async fn read_file(&self, path: &str) -> Result<String>;

    /// Write `content` to `path`, returning a status message
    async fn write_file(&self, path: &str, content: &str) -> Result<String>;
}

/// Local filesystem implementation
///
/// Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalFileTools {
    root: Option<PathBuf>,
}

impl LocalFileTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl FileTools for LocalFileTools {
    /// A missing file reads as an empty string; non-UTF-8 bytes decode as Latin-1
    async fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path);
        if !full.exists() {
            warn!(path = %full.display(), "File does not exist, reading as empty");
            return Ok(String::new());
        }

        let bytes = fs::read(&full).await?;
        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %full.display(), "Not UTF-8, decoding as Latin-1");
                e.into_bytes().iter().map(|&b| b as char).collect()
            }
        };
        Ok(content)
    }

    /// Backs up an existing target to `<path>.backup` and creates missing
    /// parent directories before writing
    async fn write_file(&self, path: &str, content: &str) -> Result<String> {
        let full = self.resolve(path);

        if full.exists() {
            let mut backup = full.clone().into_os_string();
            backup.push(".backup");
            fs::copy(&full, &backup).await?;
            debug!(backup = ?backup, "Backup created");
        } else if let Some(parent) = full.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(&full, unescape(content)).await?;
        info!(path = %full.display(), bytes = content.len(), "Wrote file");
        Ok(WRITE_OK.to_string())
    }
}

/// Undo the literal escape sequences LLM output tends to carry
fn unescape(content: &str) -> String {
    content
        .replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let tools = LocalFileTools::with_root(temp.path());
        assert_eq!(tools.read_file("nope.rs").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_read_latin1_fallback() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("latin.txt"), [b'c', b'a', b'f', 0xE9]).unwrap();

        let tools = LocalFileTools::with_root(temp.path());
        assert_eq!(tools.read_file("latin.txt").await.unwrap(), "café");
    }

    #[tokio::test]
    async fn test_write_creates_dirs_and_unescapes() {
        let temp = TempDir::new().unwrap();
        let tools = LocalFileTools::with_root(temp.path());

        let status = tools
            .write_file("src/new/lib.rs", "fn a() {}\\nlet s = \\\"x\\\";")
            .await
            .unwrap();

        assert_eq!(status, WRITE_OK);
        let written = std::fs::read_to_string(temp.path().join("src/new/lib.rs")).unwrap();
        assert_eq!(written, "fn a() {}\nlet s = \"x\";");
    }

    #[tokio::test]
    async fn test_write_backs_up_existing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.rs"), "old").unwrap();

        let tools = LocalFileTools::with_root(temp.path());
        tools.write_file("main.rs", "new").await.unwrap();

        assert_eq!(std::fs::read_to_string(temp.path().join("main.rs")).unwrap(), "new");
        assert_eq!(
            std::fs::read_to_string(temp.path().join("main.rs.backup")).unwrap(),
            "old"
        );
    }

    #[tokio::test]
    async fn test_absolute_path_ignores_root() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("abs.txt");
        std::fs::write(&target, "absolute").unwrap();

        let tools = LocalFileTools::with_root("/nonexistent-root");
        let content = tools.read_file(target.to_str().unwrap()).await.unwrap();
        assert_eq!(content, "absolute");
    }
}
