use std::fs;
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::error::InspectorError;

/// One file of an export, with a path relative to the bundle root.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn text(filename: impl Into<String>, text: &str) -> Self {
        Self::new(filename, text.as_bytes().to_vec())
    }

    /// Move the file below `dir` inside the bundle.
    pub fn in_dir(mut self, dir: &str) -> Self {
        self.filename = format!("{}/{}", dir, self.filename);
        self
    }

    /// Decode an image data URL into `filename`.
    pub fn image(filename: impl Into<String>, data_url: &str) -> Result<Self, InspectorError> {
        let (_, bytes) = data_url_to_bytes(data_url)?;
        Ok(Self::new(filename, bytes))
    }
}

/// A named set of files, e.g. `report-example.com`. The directory written by
/// [`ExportBundle::write_to_dir`] is what gets archived as `<name>.zip`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    pub prefix: String,
    pub host: String,
    pub files: Vec<ExportFile>,
}

impl ExportBundle {
    pub fn new(prefix: &str, host: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            host: host.to_string(),
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, file: ExportFile) {
        self.files.push(file);
    }

    pub fn extend(&mut self, files: impl IntoIterator<Item = ExportFile>) {
        self.files.extend(files);
    }

    pub fn name(&self) -> String {
        format!("{}-{}", self.prefix, self.host)
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.name())
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.filename.as_str()).collect()
    }

    /// Write every file below `<dir>/<name>/`. Returns the bundle directory.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, InspectorError> {
        let root = dir.join(self.name());
        write_files(&root, &self.files)?;
        info!(path = %root.display(), files = self.files.len(), "wrote export bundle");
        Ok(root)
    }
}

/// Write files below `dir`, creating parent directories as needed.
pub fn write_files(dir: &Path, files: &[ExportFile]) -> Result<Vec<PathBuf>, InspectorError> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let relative = Path::new(&file.filename);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(InspectorError::Io {
                context: format!("export file name '{}'", file.filename),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "must be a relative path without '..'",
                ),
            });
        }

        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| InspectorError::Io {
                context: format!("creating '{}'", parent.display()),
                source: e,
            })?;
        }
        fs::write(&path, &file.bytes).map_err(|e| InspectorError::Io {
            context: format!("writing '{}'", path.display()),
            source: e,
        })?;
        written.push(path);
    }
    Ok(written)
}

/// Split a base64 image data URL into its content type and bytes. Types
/// other than PNG and JPEG are treated as PNG.
pub fn data_url_to_bytes(url: &str) -> Result<(String, Vec<u8>), InspectorError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| InspectorError::DataUrl("missing 'data:' scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| InspectorError::DataUrl("missing ',' separator".into()))?;

    let content_type = match header.split(';').next() {
        Some(t @ ("image/png" | "image/jpeg")) => t.to_string(),
        _ => "image/png".to_string(),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| InspectorError::DataUrl(format!("invalid base64 payload: {}", e)))?;
    Ok((content_type, bytes))
}
