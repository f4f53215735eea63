//! EPUB fixtures generated at test time
//!
//! Containers are written with `zip::ZipWriter` into a temporary directory so
//! every test controls exactly which metadata and manifest entries exist.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use zip::{CompressionMethod, ZipWriter, write::FileOptions};

/// How a fixture declares its cover image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverStyle {
    None,
    /// EPUB 3 `properties="cover-image"` on the manifest item
    Property,
    /// EPUB 2 `<meta name="cover" content="..."/>` referencing the item
    MetaName,
}

/// Description of a generated book
#[derive(Debug, Clone)]
pub struct FixtureBook {
    pub version: &'static str,
    pub package_dir: &'static str,
    pub title: Option<&'static str>,
    pub creators: Vec<&'static str>,
    pub language: Option<&'static str>,
    pub cover: CoverStyle,
}

impl Default for FixtureBook {
    fn default() -> Self {
        Self {
            version: "3.0",
            package_dir: "OEBPS",
            title: Some("Dune"),
            creators: vec!["Frank Herbert"],
            language: Some("en"),
            cover: CoverStyle::Property,
        }
    }
}

impl FixtureBook {
    /// Path of `relative` inside the container, next to the package document
    pub fn entry_path(&self, relative: &str) -> String {
        if self.package_dir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.package_dir, relative)
        }
    }

    pub fn package_path(&self) -> String {
        self.entry_path("content.opf")
    }

    pub fn container_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
            self.package_path()
        )
    }

    pub fn package_xml(&self) -> String {
        let mut metadata = String::from(r#"<dc:identifier id="uid">urn:uuid:fixture</dc:identifier>"#);
        if let Some(title) = self.title {
            metadata.push_str(&format!("\n    <dc:title>{}</dc:title>", title));
        }
        for (index, creator) in self.creators.iter().enumerate() {
            metadata.push_str(&format!(
                "\n    <dc:creator id=\"creator{}\">{}</dc:creator>",
                index, creator
            ));
        }
        if let Some(language) = self.language {
            metadata.push_str(&format!("\n    <dc:language>{}</dc:language>", language));
        }
        if self.cover == CoverStyle::MetaName {
            metadata.push_str("\n    <meta name=\"cover\" content=\"cover-img\"/>");
        }

        let cover_properties = match self.cover {
            CoverStyle::Property => r#" properties="cover-image""#,
            _ => "",
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="{version}" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    {metadata}
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"{cover_properties}/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
  </spine>
</package>"#,
            version = self.version,
            metadata = metadata,
            cover_properties = cover_properties,
        )
    }

    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        vec![
            ("mimetype".to_string(), b"application/epub+zip".to_vec()),
            (
                "META-INF/container.xml".to_string(),
                self.container_xml().into_bytes(),
            ),
            (self.package_path(), self.package_xml().into_bytes()),
            (
                self.entry_path("text/ch1.xhtml"),
                b"<html xmlns=\"http://www.w3.org/1999/xhtml\"><body/></html>".to_vec(),
            ),
        ]
    }

    /// Writes the book into `dir` and returns its path
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        write_zip(&path, &self.entries());
        path
    }
}

/// Writes a ZIP container holding exactly `entries`
pub fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);

    for (name, data) in entries {
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap();
}

/// Writes a file that is not a ZIP container
pub fn write_garbage(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, b"this is definitely not a zip archive").unwrap();
    path
}

/// Replaces the package document of a fixture book
pub fn with_package(book: &FixtureBook, package_xml: &str) -> Vec<(String, Vec<u8>)> {
    book.entries()
        .into_iter()
        .map(|(name, data)| {
            if name == book.package_path() {
                (name, package_xml.as_bytes().to_vec())
            } else {
                (name, data)
            }
        })
        .collect()
}

/// Writes a container whose `META-INF/container.xml` claims a zip64
/// uncompressed size of `declared_size` while holding only a few bytes
pub fn write_oversized_entry(dir: &Path, file_name: &str, declared_size: u64) -> PathBuf {
    let path = dir.join(file_name);
    let container = FixtureBook::default().container_xml().into_bytes();
    write_zip(&path, &[("META-INF/container.xml".to_string(), container)]);

    let bytes = fs::read(&path).unwrap();
    let eocd = bytes
        .windows(4)
        .rposition(|window| window == [0x50, 0x4b, 0x05, 0x06])
        .unwrap();
    let read_u16 = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]) as usize;
    let read_u32 = |at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
    };

    let cd_offset = read_u32(eocd + 16);
    let cd_size = read_u32(eocd + 12);
    let mut header = bytes[cd_offset..cd_offset + cd_size].to_vec();

    let name_len = read_u16(cd_offset + 28);
    let extra_len = read_u16(cd_offset + 30);
    let extra_end = 46 + name_len + extra_len;

    // zip64 extra field carrying only the uncompressed size
    let mut zip64 = vec![0x01, 0x00, 0x08, 0x00];
    zip64.extend_from_slice(&declared_size.to_le_bytes());

    header[24..28].copy_from_slice(&u32::MAX.to_le_bytes());
    header[30..32].copy_from_slice(&((extra_len + zip64.len()) as u16).to_le_bytes());
    header.splice(extra_end..extra_end, zip64);

    let mut trailer = bytes[eocd..].to_vec();
    trailer[12..16].copy_from_slice(&(header.len() as u32).to_le_bytes());

    let mut patched = bytes[..cd_offset].to_vec();
    patched.extend_from_slice(&header);
    patched.extend_from_slice(&trailer);
    fs::write(&path, patched).unwrap();

    path
}
