use serde::{Deserialize, Serialize};
use std::fmt;

/// A single object in a bucket. Names are flat keys; `/` only implies folders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub name: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn gs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Final path component of the name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Folder portion of the name, without a trailing slash.
    pub fn parent_path(&self) -> &str {
        match self.name.rfind('/') {
            Some(idx) => &self.name[..idx],
            None => "",
        }
    }

    pub fn is_at_bucket_root(&self) -> bool {
        !self.name.contains('/')
    }

    /// Zero-byte "folder" objects created by the console end with a slash.
    pub fn is_folder_placeholder(&self) -> bool {
        self.name.ends_with('/')
    }

    /// Lowercased extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }

    /// Same object path with the extension swapped for `.txt`.
    pub fn transcript_name(&self) -> String {
        let ext_len = extension_span(self.file_name());
        let stem = &self.name[..self.name.len() - ext_len];
        format!("{}.txt", stem)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gs_uri())
    }
}

pub fn file_extension(name: &str) -> String {
    let base = name.rsplit('/').next().unwrap_or(name);
    let len = extension_span(base);
    base[base.len() - len..].to_lowercase()
}

// Byte length of the extension (dot included) at the end of a path component.
// Leading dots never start an extension, so ".env" has none.
fn extension_span(base: &str) -> usize {
    let leading = base.len() - base.trim_start_matches('.').len();
    match base[leading..].rfind('.') {
        Some(idx) => base.len() - (leading + idx),
        None => 0,
    }
}
