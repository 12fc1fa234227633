//! Blocking structural checks for document and image formats. Each returns
//! a human-readable reason on failure.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Fully decodes the image so truncated or corrupt pixel data is caught.
pub fn check_image(path: &Path) -> Result<(), String> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| e.to_string())?
        .with_guessed_format()
        .map_err(|e| e.to_string())?;
    reader.decode().map(|_| ()).map_err(|e| e.to_string())
}

/// A DOCX is a zip package with a content-types manifest and a well-formed
/// main document part.
pub fn check_docx(path: &Path) -> Result<(), String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    archive
        .by_name("[Content_Types].xml")
        .map_err(|e| format!("[Content_Types].xml: {}", e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml: {}", e))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("word/document.xml: {}", e))?;

    check_well_formed(&xml).map_err(|e| format!("word/document.xml: {}", e))
}

fn check_well_formed(xml: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(xml);
    let mut depth: usize = 0;
    let mut elements: usize = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                elements += 1;
            }
            Ok(Event::Empty(_)) => elements += 1,
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
    }
    if elements == 0 {
        return Err("document has no elements".to_string());
    }
    if depth != 0 {
        return Err(format!("{} unclosed element(s)", depth));
    }
    Ok(())
}

/// Parses the cross-reference table and walks the page tree.
pub fn check_pdf(path: &Path) -> Result<usize, String> {
    let document = lopdf::Document::load(path).map_err(|e| e.to_string())?;
    Ok(document.get_pages().len())
}
