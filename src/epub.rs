use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, warn};
use zip::ZipArchive;

use crate::{
    error::EpubError,
    types::{EpubVersion, ItemType, ManifestItem, MetadataItem, Namespace},
    utils::{NormalizeWhitespace, XmlElement, XmlReader, get_file_in_zip_archive, resolve_href},
};

/// EPUB document model, the parsed package document of one publication
///
/// `EpubDoc` reads the OCF container, locates the package document through
/// `META-INF/container.xml` and keeps the `<metadata>` and `<manifest>`
/// sections. Only parsed data is retained; the underlying archive and file
/// handle are released as soon as parsing ends, whether it succeeds or not.
///
/// Lookups never fail. Missing metadata is reported as an empty result and
/// left to the caller to interpret.
#[derive(Debug)]
pub struct EpubDoc {
    /// The path to the OPF file inside the container
    pub package_path: PathBuf,

    /// The directory holding the OPF file, used to resolve manifest hrefs
    pub base_path: PathBuf,

    /// The epub version
    pub version: EpubVersion,

    /// Metadata items from the DC and OPF vocabularies, in document order
    pub metadata: Vec<MetadataItem>,

    /// Resources declared in the manifest, keyed by id, in document order
    pub manifest: IndexMap<String, ManifestItem>,
}

impl EpubDoc {
    /// Opens and parses the EPUB file at `path`
    ///
    /// The file is read through a buffered reader and closed before this
    /// function returns.
    ///
    /// # Return
    /// - `Ok(EpubDoc)`: The parsed document
    /// - `Err(EpubError)`: The file is missing, unreadable, not a ZIP container,
    ///   or its package document is malformed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Creates a new EPUB document from a reader
    ///
    /// # Parameters
    /// - `reader`: Any `Read + Seek` source holding the ZIP container
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, EpubError> {
        // 1. Open the ZIP container
        // 2. Locate the OPF file through META-INF/container.xml
        // 3. Parse the OPF file and determine the version
        // 4. Parse metadata, then the manifest, which needs the EPUB 2 cover id

        let mut archive = ZipArchive::new(reader)?;

        let container = get_file_in_zip_archive(&mut archive, "META-INF/container.xml")?;
        let package_file = Self::parse_container(&container)?;
        let package_path = PathBuf::from(&package_file);
        let base_path = package_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        debug!("package document located at {}", package_file);

        let opf_file = get_file_in_zip_archive(&mut archive, &package_file)?;
        let package = XmlReader::parse_bytes(&opf_file)?;

        let metadata_element = Self::required_element(&package, "metadata")?;
        let manifest_element = Self::required_element(&package, "manifest")?;

        let metadata = Self::parse_metadata(metadata_element);
        let cover_id = metadata
            .iter()
            .find(|item| item.namespace == Namespace::Opf && item.property == "cover")
            .map(|item| item.value.clone());
        let manifest = Self::parse_manifest(manifest_element, &base_path, cover_id.as_deref())?;
        let version = Self::determine_epub_version(&package, &manifest);
        debug!("detected {:?} for {}", version, package_file);

        Ok(Self {
            package_path,
            base_path,
            version,
            metadata,
            manifest,
        })
    }

    /// Parse the EPUB container file (META-INF/container.xml)
    ///
    /// When multiple `rootfile` elements exist, the first one is used.
    fn parse_container(data: &[u8]) -> Result<String, EpubError> {
        let root = XmlReader::parse_bytes(data)?;
        let rootfile = Self::required_element(&root, "rootfile")?;

        let full_path =
            rootfile
                .get_attr("full-path")
                .ok_or_else(|| EpubError::MissingRequiredAttribute {
                    tag: rootfile.tag_name(),
                    attribute: "full-path".to_string(),
                })?;

        Ok(full_path.trim_start_matches('/').to_string())
    }

    fn required_element<'a>(
        root: &'a XmlElement,
        name: &'a str,
    ) -> Result<&'a XmlElement, EpubError> {
        root.find_elements_by_name(name)
            .next()
            .ok_or_else(|| EpubError::NonCanonicalFile {
                tag: name.to_string(),
            })
    }

    /// Parse the EPUB metadata section
    ///
    /// Elements from the Dublin Core and OPF namespaces are kept; anything
    /// else is ignored. Legacy `<dc-metadata>`/`<x-metadata>` wrappers are
    /// looked through. Malformed `<meta>` elements are skipped with a warning
    /// rather than failing the whole document.
    fn parse_metadata(metadata_element: &XmlElement) -> Vec<MetadataItem> {
        let mut metadata = Vec::new();
        Self::collect_metadata(metadata_element, &mut metadata);
        metadata
    }

    fn collect_metadata(parent: &XmlElement, metadata: &mut Vec<MetadataItem>) {
        for element in parent.children() {
            if matches!(element.name.as_str(), "dc-metadata" | "x-metadata") {
                Self::collect_metadata(element, metadata);
                continue;
            }

            let namespace = element
                .namespace
                .as_deref()
                .and_then(Namespace::from_uri)
                .or_else(|| (element.prefix.as_deref() == Some("dc")).then_some(Namespace::Dc));

            match namespace {
                Some(Namespace::Dc) => metadata.push(Self::parse_dc_element(element)),
                Some(Namespace::Opf) if element.name == "meta" => {
                    match Self::parse_meta_element(element) {
                        Some(item) => metadata.push(item),
                        None => warn!(
                            "Skipping <{}> without a name or property attribute.",
                            element.tag_name()
                        ),
                    }
                }
                _ => {}
            }
        }
    }

    fn parse_dc_element(element: &XmlElement) -> MetadataItem {
        let (id, lang, attributes) = Self::split_attributes(element);

        MetadataItem {
            namespace: Namespace::Dc,
            id,
            property: element.name.clone(),
            value: element.text().normalize_whitespace(),
            lang,
            attributes,
        }
    }

    /// Parses an OPF `<meta>` element
    ///
    /// EPUB 2 uses `name`/`content` pairs, EPUB 3 uses `property` with the
    /// value as element text. Both forms are accepted regardless of version.
    fn parse_meta_element(element: &XmlElement) -> Option<MetadataItem> {
        let (id, lang, mut attributes) = Self::split_attributes(element);

        let (property, value) = if let Some(name) = attributes.remove("name") {
            let content = attributes.remove("content").unwrap_or_default();
            (name, content.normalize_whitespace())
        } else {
            let property = attributes.remove("property")?;
            (property, element.text().normalize_whitespace())
        };

        Some(MetadataItem {
            namespace: Namespace::Opf,
            id,
            property,
            value,
            lang,
            attributes,
        })
    }

    fn split_attributes(
        element: &XmlElement,
    ) -> (Option<String>, Option<String>, HashMap<String, String>) {
        let mut attributes = element.attributes.clone();
        let id = attributes.remove("id");
        let lang = attributes.remove("xml:lang").or_else(|| attributes.remove("lang"));

        (id, lang, attributes)
    }

    /// Parse the EPUB manifest section
    ///
    /// Every `<item>` must carry `id`, `href` and `media-type`. Hrefs are
    /// resolved against the package directory and classified into an
    /// [ItemType]. `cover_id` is the target of an EPUB 2 cover declaration.
    fn parse_manifest(
        manifest_element: &XmlElement,
        base_path: &Path,
        cover_id: Option<&str>,
    ) -> Result<IndexMap<String, ManifestItem>, EpubError> {
        let mut resources = IndexMap::new();

        for element in manifest_element.find_children_by_name("item") {
            let require = |attribute: &str| {
                element
                    .get_attr(attribute)
                    .ok_or_else(|| EpubError::MissingRequiredAttribute {
                        tag: element.tag_name(),
                        attribute: attribute.to_string(),
                    })
            };

            let id = require("id")?;
            let href = require("href")?;
            let mime = require("media-type")?;
            let properties = element.get_attr("properties");
            let fallback = element.get_attr("fallback");

            let item_type =
                ItemType::classify(&mime, properties.as_deref(), cover_id == Some(id.as_str()));

            let item = ManifestItem {
                id: id.clone(),
                path: resolve_href(base_path, &href)?,
                href,
                mime,
                properties,
                fallback,
                item_type,
            };

            if resources.insert(id.clone(), item).is_some() {
                warn!("Duplicate manifest id \"{}\", keeping the last declaration.", id);
            }
        }

        if let Some(cover_id) = cover_id {
            if !resources.contains_key(cover_id) {
                warn!(
                    "Cover declared as \"{}\" but no manifest item has that id.",
                    cover_id
                );
            }
        }

        Ok(resources)
    }

    /// Determine the EPUB version from the OPF file
    ///
    /// The `version` attribute wins when it names a 2.x or 3.x release.
    /// Otherwise EPUB 3 is assumed when a navigation document is declared,
    /// and EPUB 2 in every other case.
    fn determine_epub_version(
        opf_element: &XmlElement,
        manifest: &IndexMap<String, ManifestItem>,
    ) -> EpubVersion {
        if let Some(version) = opf_element.get_attr("version") {
            let version = version.trim();
            if version.starts_with("2.") || version == "2" {
                return EpubVersion::Version2_0;
            }
            if version.starts_with("3.") || version == "3" {
                return EpubVersion::Version3_0;
            }
        }

        if manifest.values().any(|item| item.has_property("nav")) {
            EpubVersion::Version3_0
        } else {
            EpubVersion::Version2_0
        }
    }

    /// Retrieves all metadata items of a vocabulary with the given property
    ///
    /// Items are returned in document order. The result is empty when the
    /// property is absent.
    pub fn get_metadata(&self, namespace: Namespace, field: &str) -> Vec<&MetadataItem> {
        self.metadata
            .iter()
            .filter(|item| item.namespace == namespace && item.property == field)
            .collect()
    }

    /// Retrieves the values of the matching metadata items
    pub fn get_metadata_value(&self, namespace: Namespace, field: &str) -> Vec<&str> {
        self.get_metadata(namespace, field)
            .into_iter()
            .map(|item| item.value.as_str())
            .collect()
    }

    /// Iterates over the manifest in document order
    pub fn get_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest.values()
    }

    pub fn get_items_of_type(&self, item_type: ItemType) -> impl Iterator<Item = &ManifestItem> {
        self.get_items()
            .filter(move |item| item.get_type() == item_type)
    }

    pub fn get_item_with_id(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.get(id)
    }

    /// The first manifest item classified as the cover image
    pub fn cover_item(&self) -> Option<&ManifestItem> {
        self.get_items_of_type(ItemType::Cover).next()
    }
}
