use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Error;

/// Field name that is replaced by `file{N}` unless numbering is skipped.
pub const DEFAULT_FILE_FIELD: &str = "file";
pub const DEFAULT_FILE_MIME: &str = "application/octet-stream";
const RAW_BYTES_FILENAME: &str = "filename";

/// Where the content of an attachment comes from.
#[derive(Debug)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Handle { file: File, name: PathBuf },
    Absent,
}

impl FileSource {
    /// An already opened file. `name` supplies the default filename.
    pub fn handle(file: File, name: impl Into<PathBuf>) -> Self {
        Self::Handle {
            file,
            name: name.into(),
        }
    }
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<String> for FileSource {
    fn from(path: String) -> Self {
        Self::Path(PathBuf::from(path))
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for FileSource {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl From<&[u8]> for FileSource {
    fn from(data: &[u8]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FileSource {
    fn from(data: &[u8; N]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl From<Bytes> for FileSource {
    fn from(data: Bytes) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl<S> From<Option<S>> for FileSource
where
    S: Into<FileSource>,
{
    fn from(source: Option<S>) -> Self {
        source.map_or(Self::Absent, Into::into)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileOptions {
    filename: Option<String>,
    field_name: Option<String>,
    skip_numbering: bool,
    mime_type: Option<String>,
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Keeps the literal `"file"` field name instead of numbering it.
    pub fn skip_numbering(mut self, skip_numbering: bool) -> Self {
        self.skip_numbering = skip_numbering;
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// One registered file, immutable once stored on a builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileAttachment {
    filename: String,
    field_name: String,
    mime_type: String,
    data: Bytes,
}

impl FileAttachment {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Reads `source` into an attachment. `registered` is the number of
/// attachments already on the builder and drives `file{N}` numbering, so an
/// auto-numbered name can repeat one a caller assigned explicitly.
pub(crate) fn register(
    source: FileSource,
    options: FileOptions,
    registered: usize,
) -> crate::Result<FileAttachment> {
    let mime_type = match options.mime_type {
        Some(mime_type) => {
            let trimmed = mime_type.trim();
            if trimmed.is_empty() {
                return Err(Error::EmptyMimeType);
            }
            trimmed.to_owned()
        }
        None => DEFAULT_FILE_MIME.to_owned(),
    };

    let mut field_name = options
        .field_name
        .map(|name| name.trim().to_owned())
        .unwrap_or_else(|| DEFAULT_FILE_FIELD.to_owned());
    if (field_name == DEFAULT_FILE_FIELD && !options.skip_numbering) || field_name.is_empty() {
        field_name = format!("{DEFAULT_FILE_FIELD}{}", registered + 1);
    }

    let explicit_filename = options
        .filename
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());

    let (filename, data) = match source {
        FileSource::Path(path) => {
            let data = std::fs::read(&path).map_err(|source| Error::ReadFile {
                path: path.clone(),
                source: Arc::new(source),
            })?;
            (explicit_filename.unwrap_or_else(|| base_name(&path)), data)
        }
        FileSource::Bytes(data) => (
            explicit_filename.unwrap_or_else(|| RAW_BYTES_FILENAME.to_owned()),
            data,
        ),
        FileSource::Handle { mut file, name } => {
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|source| Error::ReadFile {
                    path: name.clone(),
                    source: Arc::new(source),
                })?;
            (explicit_filename.unwrap_or_else(|| base_name(&name)), data)
        }
        FileSource::Absent => return Err(Error::UnsupportedFileSource),
    };

    Ok(FileAttachment {
        filename,
        field_name,
        mime_type,
        data: Bytes::from(data),
    })
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
