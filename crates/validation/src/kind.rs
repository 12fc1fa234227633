use std::fmt;

/// Validation strategy chosen from the object's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Media,
    Image,
    Docx,
    Pdf,
    Unsupported,
}

pub const MEDIA_EXTENSIONS: [&str; 7] = [".mp4", ".mkv", ".mp3", ".wav", ".m4a", ".flac", ".ogg"];
pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

impl FileKind {
    /// `ext` is expected lowercased with its leading dot, e.g. `".pdf"`.
    pub fn from_extension(ext: &str) -> Self {
        if MEDIA_EXTENSIONS.contains(&ext) {
            FileKind::Media
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            FileKind::Image
        } else if ext == ".docx" {
            FileKind::Docx
        } else if ext == ".pdf" {
            FileKind::Pdf
        } else {
            FileKind::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Media => "media",
            FileKind::Image => "image",
            FileKind::Docx => "docx",
            FileKind::Pdf => "pdf",
            FileKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(FileKind::from_extension(".mkv"), FileKind::Media);
        assert_eq!(FileKind::from_extension(".ogg"), FileKind::Media);
        assert_eq!(FileKind::from_extension(".jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_extension(".docx"), FileKind::Docx);
        assert_eq!(FileKind::from_extension(".pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_extension(".doc"), FileKind::Unsupported);
        assert_eq!(FileKind::from_extension(""), FileKind::Unsupported);
    }
}
