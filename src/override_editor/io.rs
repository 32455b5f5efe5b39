use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};

/// Failure reading or writing one of the tool's files, tagged with the path.
#[derive(Debug)]
pub struct IoError {
    path: PathBuf,
    kind: IoErrorKind,
}

#[derive(Debug)]
pub enum IoErrorKind {
    NotFound,
    /// The file exists but holds only whitespace.
    Blank,
    Read(io::Error),
    Write(io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl IoError {
    pub fn new(path: impl Into<PathBuf>, kind: IoErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &IoErrorKind {
        &self.kind
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, IoErrorKind::NotFound)
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, IoErrorKind::Blank)
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.display();
        match &self.kind {
            IoErrorKind::NotFound => write!(f, "{path} does not exist"),
            IoErrorKind::Blank => write!(f, "{path} is empty"),
            IoErrorKind::Read(err) => write!(f, "cannot read {path}: {err}"),
            IoErrorKind::Write(err) => write!(f, "cannot write {path}: {err}"),
            IoErrorKind::Json(err) => write!(f, "{path} is not valid JSON: {err}"),
            IoErrorKind::Yaml(err) => write!(f, "{path} is not valid YAML: {err}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            IoErrorKind::NotFound | IoErrorKind::Blank => None,
            IoErrorKind::Read(err) | IoErrorKind::Write(err) => Some(err),
            IoErrorKind::Json(err) => Some(err),
            IoErrorKind::Yaml(err) => Some(err),
        }
    }
}

fn read_text(path: &Path) -> Result<String, IoError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => IoErrorKind::NotFound,
            _ => IoErrorKind::Read(err),
        };
        IoError::new(path, kind)
    })?;
    if raw.trim().is_empty() {
        return Err(IoError::new(path, IoErrorKind::Blank));
    }
    Ok(raw)
}

pub fn read_json_file_blocking<T>(path: impl AsRef<Path>) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    serde_json::from_str(&read_text(path)?)
        .map_err(|err| IoError::new(path, IoErrorKind::Json(err)))
}

pub fn read_yaml_file_blocking<T>(path: impl AsRef<Path>) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    serde_yaml::from_str(&read_text(path)?)
        .map_err(|err| IoError::new(path, IoErrorKind::Yaml(err)))
}

/// Pretty JSON, with the parent directory created on demand.
pub fn write_json_file_blocking<T>(path: impl AsRef<Path>, value: &T) -> Result<(), IoError>
where
    T: Serialize,
{
    let path = path.as_ref();
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| IoError::new(path, IoErrorKind::Json(err)))?;

    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|err| IoError::new(dir, IoErrorKind::Write(err)))?
        }
        _ => {}
    }
    fs::write(path, payload).map_err(|err| IoError::new(path, IoErrorKind::Write(err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn write_creates_missing_directories() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested/deeper/values.json");
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), 1_i64);
        write_json_file_blocking(&path, &values).expect("write succeeds");
        let read: BTreeMap<String, i64> = read_json_file_blocking(&path).expect("read succeeds");
        assert_eq!(read, values);
    }

    #[test]
    fn missing_and_corrupt_files_are_distinguished() {
        let dir = tempdir().expect("temp dir");
        let missing = dir.path().join("absent.json");
        let err = read_json_file_blocking::<BTreeMap<String, i64>>(&missing).unwrap_err();
        assert!(err.is_missing());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").expect("write fixture");
        let err = read_json_file_blocking::<BTreeMap<String, i64>>(&corrupt).unwrap_err();
        assert!(matches!(err.kind(), IoErrorKind::Json(_)));
        assert_eq!(err.path(), corrupt.as_path());
    }

    #[test]
    fn whitespace_only_file_reads_as_blank() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("blank.json");
        fs::write(&path, " \n\t").expect("write fixture");
        let err = read_json_file_blocking::<BTreeMap<String, i64>>(&path).unwrap_err();
        assert!(err.is_blank());
        assert!(!err.is_missing());
    }
}
