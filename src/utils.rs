use std::{
    collections::HashMap,
    io::{Read, Seek},
    path::{Path, PathBuf},
};

use quick_xml::{
    NsReader,
    escape::{resolve_predefined_entity, unescape},
    events::{BytesStart, Event},
    name::ResolveResult,
};
use zip::ZipArchive;

use crate::error::EpubError;

/// Extracts the contents of a specified file from a ZIP archive
///
/// ## Parameters
/// - `zip_file`: A mutable reference to a ZIP archive object
/// - `file_name`: The path to the file to extract (relative to the ZIP archive root directory)
///
/// ## Return
/// - `Ok(Vec<u8>)`: The raw bytes of the entry
/// - `Err(EpubError)`: The entry does not exist or could not be read
pub fn get_file_in_zip_archive<R: Read + Seek>(
    zip_file: &mut ZipArchive<R>,
    file_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let mut file = zip_file.by_name(file_name)?;
    // The declared size is untrusted, the buffer grows with what is actually read
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Resolves a manifest href into a path relative to the container root
///
/// Relative hrefs are resolved against `base_dir`, the directory holding the
/// package document. A leading `/` anchors the href at the container root.
/// Percent-encoded octets are decoded, and `.`/`..` segments are collapsed
/// lexically.
///
/// ## Return
/// - `Ok(PathBuf)`: `/`-separated path inside the container
/// - `Err(EpubError::RelativeLinkLeakage)`: the href climbs above the container root
pub fn resolve_href(base_dir: &Path, href: &str) -> Result<PathBuf, EpubError> {
    let decoded = percent_decode(href);

    let (mut segments, relative) = match decoded.strip_prefix('/') {
        Some(rest) => (Vec::new(), rest),
        None => (
            base_dir
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>(),
            decoded.as_str(),
        ),
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(EpubError::RelativeLinkLeakage {
                        path: href.to_string(),
                    });
                }
            }
            segment => segments.push(segment.to_string()),
        }
    }

    Ok(PathBuf::from(segments.join("/")))
}

/// Decodes `%XX` escapes, leaving malformed sequences untouched
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'%'
            && index + 2 < bytes.len()
            && bytes[index + 1].is_ascii_hexdigit()
            && bytes[index + 2].is_ascii_hexdigit()
        {
            let byte = std::str::from_utf8(&bytes[index + 1..index + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                decoded.push(byte);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&decoded).into_owned()
}

/// Provides functionality to decode byte data into strings
///
/// Text documents inside an EPUB are usually UTF-8, but UTF-16 is allowed
/// for XML. The byte order mark is honoured when present; otherwise the
/// first bytes of an XML declaration are used to spot UTF-16.
pub trait DecodeBytes {
    fn decode(&self) -> Result<String, EpubError>;
}

impl DecodeBytes for [u8] {
    fn decode(&self) -> Result<String, EpubError> {
        if self.len() < 4 {
            return Err(EpubError::EmptyDataError);
        }

        match self {
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).map_err(EpubError::from),
            [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
            [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
            [0x00, b'<', ..] => decode_utf16(self, u16::from_be_bytes),
            [b'<', 0x00, ..] => decode_utf16(self, u16::from_le_bytes),
            _ => String::from_utf8(self.to_vec()).map_err(EpubError::from),
        }
    }
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> Result<String, EpubError> {
        self.as_slice().decode()
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, EpubError> {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect::<Vec<u16>>();

    String::from_utf16(&units).map_err(EpubError::from)
}

/// Provides functionality for normalizing whitespace characters
///
/// Runs of whitespace collapse into a single space and the ends are trimmed.
pub trait NormalizeWhitespace {
    fn normalize_whitespace(&self) -> String;
}

impl NormalizeWhitespace for &str {
    fn normalize_whitespace(&self) -> String {
        self.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl NormalizeWhitespace for String {
    fn normalize_whitespace(&self) -> String {
        self.as_str().normalize_whitespace()
    }
}

/// Represents an element node in an XML document
#[derive(Debug, Default)]
pub struct XmlElement {
    /// The local name of the element (excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The resolved namespace URI of the element
    pub namespace: Option<String>,

    /// The attributes of the element, keyed by qualified name (e.g. `opf:role`)
    ///
    /// Namespace declarations are not included.
    pub attributes: HashMap<String, String>,

    /// The direct text content of the element, entities resolved
    pub text: String,

    /// The children of the element
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Get the full tag name of the element
    pub fn tag_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Gets the text content of the element and all its descendants, trimmed
    pub fn text(&self) -> String {
        let mut result = self.text.clone();
        for child in &self.children {
            result.push_str(&child.text());
        }

        result.trim().to_string()
    }

    /// Returns the value of the attribute with the given qualified name
    pub fn get_attr(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    /// Depth-first search of this element and all descendants by local name
    pub fn find_elements_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            while let Some(element) = pending.pop() {
                pending.extend(element.children.iter().rev());
                if element.name == name {
                    return Some(element);
                }
            }
            None
        })
    }

    /// Finds direct children with the given local name
    pub fn find_children_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Get children elements
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter()
    }
}

/// XML parser used to build an [XmlElement] tree
///
/// Namespaces are resolved by `quick_xml::NsReader` while reading, so
/// prefixes declared on any ancestor are honoured and a default namespace
/// only applies inside the element that declares it.
pub struct XmlReader {}

impl XmlReader {
    /// Parses an XML string and builds the root element
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the tree
    /// - `Err(EpubError)`: The document is empty or not well-formed
    pub fn parse(content: &str) -> Result<XmlElement, EpubError> {
        if content.trim().is_empty() {
            return Err(EpubError::EmptyDataError);
        }

        let mut reader = NsReader::from_str(content);
        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;

        loop {
            let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;

            match event {
                Event::Eof => break,

                Event::Start(start) => {
                    stack.push(Self::build_element(&start, resolved));
                }

                Event::End(_) => {
                    if let Some(element) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(element),
                            None => root = Some(element),
                        }
                    }
                }

                Event::Empty(start) => {
                    let element = Self::build_element(&start, resolved);
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }

                Event::Text(text) => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&String::from_utf8_lossy(text.as_ref()));
                    }
                }

                Event::CData(cdata) => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(&String::from_utf8_lossy(cdata.as_ref()));
                    }
                }

                Event::GeneralRef(reference) => {
                    if let Some(element) = stack.last_mut() {
                        let name = String::from_utf8_lossy(reference.as_ref()).into_owned();
                        element.text.push_str(&Self::resolve_reference(&name));
                    }
                }

                // Comment, PI, Declaration, Doctype
                _ => {}
            }

            buf.clear();
        }

        root.ok_or(EpubError::EmptyDataError)
    }

    /// Parse XML from bytes and builds the root element
    pub fn parse_bytes(bytes: &[u8]) -> Result<XmlElement, EpubError> {
        let content = bytes.decode()?;
        Self::parse(&content)
    }

    fn build_element(start: &BytesStart<'_>, resolved: ResolveResult<'_>) -> XmlElement {
        let mut element = XmlElement {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            prefix: start
                .name()
                .prefix()
                .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned()),
            ..Default::default()
        };

        if let ResolveResult::Bound(namespace) = resolved {
            element.namespace = Some(String::from_utf8_lossy(namespace.as_ref()).into_owned());
        }

        for attr in start.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }

            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = match unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw,
            };
            element.attributes.insert(key, value);
        }

        element
    }

    /// Resolves a character or predefined entity reference
    ///
    /// Unknown entities are kept verbatim so that no text is lost.
    fn resolve_reference(name: &str) -> String {
        if let Some(number) = name.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => number.parse::<u32>().ok(),
            };

            if let Some(ch) = code.and_then(char::from_u32) {
                return ch.to_string();
            }
        } else if let Some(resolved) = resolve_predefined_entity(name) {
            return resolved.to_string();
        }

        format!("&{};", name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::{
        error::EpubError,
        utils::{DecodeBytes, NormalizeWhitespace, XmlReader, percent_decode, resolve_href},
    };

    #[test]
    fn test_decode_short_data() {
        let data = vec![0xEF, 0xBB];
        assert_eq!(data.decode().unwrap_err(), EpubError::EmptyDataError);
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let data: Vec<u8> = vec![0xEF, 0xBB, 0xBF, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(data.decode().unwrap(), "Hello");
    }

    #[test]
    fn test_decode_utf16_be_with_bom() {
        let data = vec![
            0xFE, 0xFF, // BOM
            0x00, b'H', 0x00, b'e', 0x00, b'l', 0x00, b'l', 0x00, b'o',
        ];
        assert_eq!(data.decode().unwrap(), "Hello");
    }

    #[test]
    fn test_decode_utf16_le_with_bom() {
        let data = vec![
            0xFF, 0xFE, // BOM
            b'H', 0x00, b'e', 0x00, b'l', 0x00, b'l', 0x00, b'o', 0x00,
        ];
        assert_eq!(data.decode().unwrap(), "Hello");
    }

    /// An XML declaration encoded as UTF-16 without a byte order mark
    #[test]
    fn test_decode_utf16_le_without_bom() {
        let data = "<?xml?>"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect::<Vec<u8>>();
        assert_eq!(data.decode().unwrap(), "<?xml?>");
    }

    #[test]
    fn test_decode_plain_utf8() {
        let data = b"Hello, World!".to_vec();
        assert_eq!(data.decode().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let data = vec![0xC3, 0x28, 0xA0, 0xA1];
        assert!(matches!(
            data.decode(),
            Err(EpubError::Utf8DecodeError { .. })
        ));
    }

    #[test]
    fn test_normalize_whitespace_trait() {
        let text = "  Hello,\tWorld!\n\nRust  ";
        assert_eq!(text.normalize_whitespace(), "Hello, World! Rust");

        let text_string = String::from("  Hello,\tWorld!\n\nRust  ");
        assert_eq!(text_string.normalize_whitespace(), "Hello, World! Rust");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("caf%C3%A9.xhtml"), "café.xhtml");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("%+1"), "%+1");
        assert_eq!(percent_decode("a%-fb"), "a%-fb");
    }

    mod resolve_href_tests {
        use super::*;

        #[test]
        fn test_relative_to_package_directory() {
            let path = resolve_href(Path::new("OEBPS"), "images/cover.jpg").unwrap();
            assert_eq!(path, Path::new("OEBPS/images/cover.jpg"));
        }

        #[test]
        fn test_package_at_root() {
            let path = resolve_href(Path::new(""), "text/ch1.xhtml").unwrap();
            assert_eq!(path, Path::new("text/ch1.xhtml"));
        }

        #[test]
        fn test_absolute_href() {
            let path = resolve_href(Path::new("OEBPS"), "/images/cover.jpg").unwrap();
            assert_eq!(path, Path::new("images/cover.jpg"));
        }

        #[test]
        fn test_parent_segments() {
            let path = resolve_href(Path::new("EPUB/package"), "../images/./cover.jpg").unwrap();
            assert_eq!(path, Path::new("EPUB/images/cover.jpg"));
        }

        #[test]
        fn test_leakage_is_rejected() {
            let err = resolve_href(Path::new("OEBPS"), "../../outside.jpg").unwrap_err();
            assert_eq!(
                err,
                EpubError::RelativeLinkLeakage {
                    path: "../../outside.jpg".to_string()
                }
            );
        }
    }

    mod xml_reader_tests {
        use super::*;

        #[test]
        fn test_parse_empty_document() {
            assert_eq!(XmlReader::parse("  ").unwrap_err(), EpubError::EmptyDataError);
        }

        #[test]
        fn test_parse_malformed_document() {
            let result = XmlReader::parse("<package><metadata></package>");
            assert!(matches!(result, Err(EpubError::QuickXmlError { .. })));
        }

        #[test]
        fn test_parse_self_closing_root() {
            let root = XmlReader::parse(r#"<?xml version="1.0"?><rootfile full-path="a.opf"/>"#)
                .unwrap();
            assert_eq!(root.name, "rootfile");
            assert_eq!(root.get_attr("full-path"), Some("a.opf".to_string()));
        }

        #[test]
        fn test_parse_resolves_namespaces() {
            let xml = r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title id="t1">Dune</dc:title>
    <meta property="dcterms:modified">2020-01-01T00:00:00Z</meta>
  </metadata>
</package>"#;
            let root = XmlReader::parse(xml).unwrap();
            assert_eq!(root.namespace.as_deref(), Some("http://www.idpf.org/2007/opf"));
            assert!(root.get_attr("xmlns").is_none());

            let title = root.find_elements_by_name("title").next().unwrap();
            assert_eq!(title.tag_name(), "dc:title");
            assert_eq!(
                title.namespace.as_deref(),
                Some("http://purl.org/dc/elements/1.1/")
            );
            assert_eq!(title.text(), "Dune");

            let meta = root.find_elements_by_name("meta").next().unwrap();
            assert_eq!(meta.namespace.as_deref(), Some("http://www.idpf.org/2007/opf"));
        }

        #[test]
        fn test_parse_resolves_entities() {
            let xml = r#"<title>Pride &amp; Prejudice &#8212; &#x41;usten</title>"#;
            let root = XmlReader::parse(xml).unwrap();
            assert_eq!(root.text(), "Pride & Prejudice \u{2014} Austen");
        }

        #[test]
        fn test_parse_cdata_text() {
            let root = XmlReader::parse("<title><![CDATA[A <b> C]]></title>").unwrap();
            assert_eq!(root.text(), "A <b> C");
        }

        #[test]
        fn test_parse_unescapes_attributes() {
            let root = XmlReader::parse(r#"<item href="a&amp;b.xhtml"/>"#).unwrap();
            assert_eq!(root.get_attr("href"), Some("a&b.xhtml".to_string()));
        }

        #[test]
        fn test_find_elements_in_document_order() {
            let xml = "<a><b id=\"1\"><b id=\"2\"/></b><c><b id=\"3\"/></c></a>";
            let root = XmlReader::parse(xml).unwrap();
            let ids = root
                .find_elements_by_name("b")
                .filter_map(|element| element.get_attr("id"))
                .collect::<Vec<_>>();
            assert_eq!(ids, vec!["1", "2", "3"]);

            assert_eq!(root.find_children_by_name("b").count(), 1);
        }

        #[test]
        fn test_parse_bytes_with_bom() {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(b"<container><rootfiles/></container>");
            let root = XmlReader::parse_bytes(&bytes).unwrap();
            assert_eq!(root.name, "container");
            assert_eq!(root.children().count(), 1);
        }
    }
}
