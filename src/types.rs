use std::{collections::HashMap, path::PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpubVersion {
    Version2_0,
    Version3_0,
}

/// Metadata vocabularies recognised inside the package `<metadata>` element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Dublin Core elements (`http://purl.org/dc/elements/1.1/`)
    Dc,

    /// OPF `<meta>` elements (`http://www.idpf.org/2007/opf`)
    Opf,
}

impl Namespace {
    pub const DC_URI: &'static str = "http://purl.org/dc/elements/1.1/";
    pub const OPF_URI: &'static str = "http://www.idpf.org/2007/opf";

    /// Maps a resolved namespace URI onto a known vocabulary
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            Self::DC_URI => Some(Namespace::Dc),
            Self::OPF_URI => Some(Namespace::Opf),
            _ => None,
        }
    }
}

/// Represents a metadata item in the EPUB publication
///
/// Dublin Core items use the local element name as `property` and the element
/// text as `value`. OPF `<meta>` items take `property` from the `name`
/// attribute (EPUB 2) or the `property` attribute (EPUB 3), and `value` from
/// `content` or the element text respectively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataItem {
    /// Vocabulary the item belongs to
    pub namespace: Namespace,

    /// Optional unique identifier for this metadata item
    pub id: Option<String>,

    /// The metadata property name, e.g. "title", "creator", "cover"
    pub property: String,

    /// The metadata value, with whitespace normalized
    pub value: String,

    /// Optional language code for this metadata item
    pub lang: Option<String>,

    /// Any remaining attributes of the element, such as `opf:role`
    /// or `opf:file-as` on EPUB 2 creators
    pub attributes: HashMap<String, String>,
}

/// Classification of a manifest resource
///
/// The classification is derived once while the manifest is parsed and
/// never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Unknown,
    Image,
    Style,
    Script,
    Navigation,
    Vector,
    Font,
    Video,
    Audio,
    Document,
    Cover,
}

impl ItemType {
    /// Classifies a manifest entry
    ///
    /// `declared_cover` is true when the item id is referenced by an EPUB 2
    /// `<meta name="cover" content="..."/>` declaration.
    pub fn classify(mime: &str, properties: Option<&str>, declared_cover: bool) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        let has_property = |wanted: &str| {
            properties.is_some_and(|props| props.split_whitespace().any(|prop| prop == wanted))
        };

        if mime.starts_with("image/") && (has_property("cover-image") || declared_cover) {
            return ItemType::Cover;
        }

        match mime.as_str() {
            "application/x-dtbncx+xml" => ItemType::Navigation,
            "application/xhtml+xml" if has_property("nav") => ItemType::Navigation,
            "application/xhtml+xml" | "text/html" => ItemType::Document,
            "image/svg+xml" => ItemType::Vector,
            "text/css" => ItemType::Style,
            "application/javascript" | "application/ecmascript" | "text/javascript" => {
                ItemType::Script
            }
            "application/vnd.ms-opentype" => ItemType::Font,
            mime if mime.starts_with("image/") => ItemType::Image,
            mime if mime.starts_with("font/")
                || mime.starts_with("application/font-")
                || mime.starts_with("application/x-font-") =>
            {
                ItemType::Font
            }
            mime if mime.starts_with("video/") => ItemType::Video,
            mime if mime.starts_with("audio/") => ItemType::Audio,
            _ => ItemType::Unknown,
        }
    }
}

/// Represents a resource item declared in the EPUB manifest
///
/// Every resource that is part of the publication is declared in the
/// manifest. Items are kept in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// The id attribute, unique within the manifest
    pub id: String,

    /// The href exactly as written in the package document
    pub href: String,

    /// The path to the resource file relative to the root of the container
    ///
    /// Resolved against the directory holding the package document;
    /// a leading `/` is taken relative to the container root.
    pub path: PathBuf,

    /// The media type of the resource
    pub mime: String,

    /// Optional space-separated properties, e.g. `cover-image` or `nav`
    pub properties: Option<String>,

    /// Optional fallback resource identifier
    pub fallback: Option<String>,

    /// Classification derived from media type and properties
    pub item_type: ItemType,
}

impl ManifestItem {
    pub fn get_type(&self) -> ItemType {
        self.item_type
    }

    /// Checks whether the space-separated `properties` contain `property`
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .is_some_and(|props| props.split_whitespace().any(|prop| prop == property))
    }
}
