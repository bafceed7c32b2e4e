//! Where script text comes from.

use super::error::{ScriptError, ScriptResult};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Script given inline or as a file to read at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Text(String),
    File(PathBuf),
}

impl ScriptSource {
    pub fn text(sql: impl Into<String>) -> Self {
        Self::Text(sql.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Returns the script text, reading the file for [`ScriptSource::File`].
    pub fn load(&self) -> ScriptResult<Cow<'_, str>> {
        match self {
            Self::Text(sql) => Ok(Cow::Borrowed(sql.as_str())),
            Self::File(path) => read_script(path).map(Cow::Owned),
        }
    }
}

fn read_script(path: &Path) -> ScriptResult<String> {
    std::fs::read_to_string(path).map_err(|source| ScriptError::Load {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::ScriptSource;
    use crate::script::error::ScriptErrorKind;

    #[test]
    fn inline_text_is_borrowed() {
        let source = ScriptSource::text("SELECT 1;");
        assert_eq!(source.load().expect("inline text always loads"), "SELECT 1;");
    }

    #[test]
    fn file_is_read_on_load() {
        let dir = tempfile::tempdir().expect("temp dir should be creatable");
        let path = dir.path().join("schema.sql");
        std::fs::write(&path, "CREATE TABLE t (id INTEGER);").expect("script file should be writable");

        let source = ScriptSource::file(&path);
        assert_eq!(source.load().expect("existing file should load"), "CREATE TABLE t (id INTEGER);");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("temp dir should be creatable");
        let err = ScriptSource::file(dir.path().join("missing.sql"))
            .load()
            .expect_err("missing file must not load");
        assert_eq!(err.kind(), ScriptErrorKind::Load);
        assert!(err.to_string().contains("missing.sql"));
    }
}
