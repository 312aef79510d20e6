//! Tag registry and the tag classification capability
//!
//! The reconstruction logic never hard-codes what a tag means beyond the
//! handful of geometry tags it must read. Everything else (whether a tag
//! holds file offsets, which tag holds its block lengths, which tags point
//! at nested IFD chains, GeoKey datatypes) is answered by a `TagClassifier`.
//! The default classifier is built from the embedded `tag_registry.toml`.

use std::collections::HashMap;
use lazy_static::lazy_static;
use log::warn;

use crate::tiff::constants::field_types;
use crate::tiff::errors::{TiffError, TiffResult};

lazy_static! {
    static ref DEFAULT_REGISTRY: TagRegistry = {
        let content = include_str!("../../tag_registry.toml");
        TagRegistry::from_str(content).unwrap_or_else(|e| {
            warn!("Failed to parse tag registry: {}", e);
            TagRegistry::default()
        })
    };
}

/// Returns the registry built from the embedded tag table
pub fn default_registry() -> &'static TagRegistry {
    &DEFAULT_REGISTRY
}

/// GeoKey identity and the datatype its value is stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoKeyInfo {
    pub id: u16,
    pub datatype: u16,
}

/// Answers questions about tag semantics
pub trait TagClassifier: Send + Sync {
    /// Tag id for a tag name
    fn tag_id(&self, name: &str) -> Option<u16>;

    /// Canonical name of a tag
    fn tag_name(&self, tag: u16) -> Option<&str>;

    /// Numeric code of a datatype name (e.g. "SHORT")
    fn datatype_code(&self, name: &str) -> Option<u16>;

    /// Whether the tag's values are offsets into the file
    fn is_offset_data(&self, tag: u16) -> bool;

    /// Tag holding the block lengths for an offset tag
    fn byte_counts_tag(&self, tag: u16) -> Option<u16>;

    /// Block length for offset tags that have no length tag
    fn fixed_length(&self, tag: u16) -> Option<u64>;

    /// Whether the tag points at nested IFD chains
    fn is_sub_ifd(&self, tag: u16) -> bool;

    /// Looks up a GeoKey by name
    fn geo_key(&self, name: &str) -> Option<GeoKeyInfo>;

    /// Offset tag whose block lengths live in `byte_counts`
    fn offsets_tag_for(&self, byte_counts: u16) -> Option<u16>;

    /// Whether the tag looks like a byte-count tag by its name
    fn is_byte_count(&self, tag: u16) -> bool {
        self.tag_name(tag)
            .map(|name| name.to_lowercase().contains("bytecount"))
            .unwrap_or(false)
    }

    /// Resolves a tag by name, falling back to a numeric id
    fn resolve_tag(&self, name: &str) -> Option<u16> {
        self.tag_id(name).or_else(|| name.parse::<u16>().ok())
    }
}

/// Semantics of one registered tag
#[derive(Debug, Clone, Default)]
pub struct TagInfo {
    pub id: u16,
    pub name: String,
    pub offset_data: bool,
    pub byte_counts: Option<u16>,
    pub fixed_length: Option<u64>,
    pub sub_ifd: bool,
}

/// Table-driven `TagClassifier`
#[derive(Debug, Default)]
pub struct TagRegistry {
    tags: HashMap<u16, TagInfo>,
    tag_ids: HashMap<String, u16>,
    datatypes: HashMap<String, u16>,
    geo_keys: HashMap<String, GeoKeyInfo>,
}

impl TagRegistry {
    /// Parse a registry from a TOML string
    pub fn from_str(content: &str) -> TiffResult<Self> {
        let toml_value: toml::Value = match content.parse() {
            Ok(value) => value,
            Err(e) => return Err(TiffError::GenericError(format!("Failed to parse TOML: {}", e))),
        };

        let mut registry = TagRegistry::default();

        if let Some(table) = toml_value.get("datatypes").and_then(|v| v.as_table()) {
            for (name, code) in table {
                if let Some(code) = code.as_integer() {
                    registry.datatypes.insert(name.clone(), code as u16);
                }
            }
        }

        if let Some(entries) = toml_value.get("tags").and_then(|v| v.as_array()) {
            for entry in entries {
                registry.add_tag_entry(entry)?;
            }
        }

        if let Some(entries) = toml_value.get("geokeys").and_then(|v| v.as_array()) {
            for entry in entries {
                registry.add_geo_key_entry(entry)?;
            }
        }

        Ok(registry)
    }

    fn add_tag_entry(&mut self, entry: &toml::Value) -> TiffResult<()> {
        let id = Self::required_id(entry)?;
        let name = Self::required_name(entry)?;

        let info = TagInfo {
            id,
            name: name.clone(),
            offset_data: entry.get("offset_data").and_then(|v| v.as_bool()).unwrap_or(false),
            byte_counts: entry.get("byte_counts").and_then(|v| v.as_integer()).map(|v| v as u16),
            fixed_length: entry.get("fixed_length").and_then(|v| v.as_integer()).map(|v| v as u64),
            sub_ifd: entry.get("sub_ifd").and_then(|v| v.as_bool()).unwrap_or(false),
        };

        self.tag_ids.insert(name, id);
        for alt in Self::alt_names(entry) {
            self.tag_ids.insert(alt, id);
        }
        self.tags.insert(id, info);
        Ok(())
    }

    fn add_geo_key_entry(&mut self, entry: &toml::Value) -> TiffResult<()> {
        let id = Self::required_id(entry)?;
        let name = Self::required_name(entry)?;
        let datatype_name = entry.get("datatype").and_then(|v| v.as_str()).unwrap_or("SHORT");
        let datatype = self.datatypes.get(datatype_name).copied()
            .ok_or_else(|| TiffError::UnknownDatatype(datatype_name.to_string()))?;

        let info = GeoKeyInfo { id, datatype };
        self.geo_keys.insert(name, info);
        for alt in Self::alt_names(entry) {
            self.geo_keys.insert(alt, info);
        }
        Ok(())
    }

    fn required_id(entry: &toml::Value) -> TiffResult<u16> {
        entry.get("id")
            .and_then(|v| v.as_integer())
            .map(|v| v as u16)
            .ok_or_else(|| TiffError::GenericError(format!("Registry entry without id: {}", entry)))
    }

    fn required_name(entry: &toml::Value) -> TiffResult<String> {
        entry.get("name")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| TiffError::GenericError(format!("Registry entry without name: {}", entry)))
    }

    fn alt_names(entry: &toml::Value) -> Vec<String> {
        entry.get("alt_names")
            .and_then(|v| v.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str().map(String::from)).collect())
            .unwrap_or_default()
    }

    /// Full information on a registered tag
    pub fn tag_info(&self, tag: u16) -> Option<&TagInfo> {
        self.tags.get(&tag)
    }

    /// Number of registered tags
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

impl TagClassifier for TagRegistry {
    fn tag_id(&self, name: &str) -> Option<u16> {
        self.tag_ids.get(name).copied()
    }

    fn tag_name(&self, tag: u16) -> Option<&str> {
        self.tags.get(&tag).map(|info| info.name.as_str())
    }

    fn datatype_code(&self, name: &str) -> Option<u16> {
        self.datatypes.get(name).copied()
    }

    fn is_offset_data(&self, tag: u16) -> bool {
        self.tags.get(&tag).map(|info| info.offset_data).unwrap_or(false)
    }

    fn byte_counts_tag(&self, tag: u16) -> Option<u16> {
        self.tags.get(&tag).and_then(|info| info.byte_counts)
    }

    fn fixed_length(&self, tag: u16) -> Option<u64> {
        self.tags.get(&tag).and_then(|info| info.fixed_length)
    }

    fn is_sub_ifd(&self, tag: u16) -> bool {
        self.tags.get(&tag).map(|info| info.sub_ifd).unwrap_or(false)
    }

    fn geo_key(&self, name: &str) -> Option<GeoKeyInfo> {
        self.geo_keys.get(name).copied()
    }

    fn offsets_tag_for(&self, byte_counts: u16) -> Option<u16> {
        self.tags.values()
            .find(|info| info.byte_counts == Some(byte_counts))
            .map(|info| info.id)
    }
}

/// Whether a datatype stores IFD pointers
pub fn is_ifd_datatype(datatype: u16) -> bool {
    datatype == field_types::IFD || datatype == field_types::IFD8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_registry() {
        let registry = default_registry();
        std::assert!(registry.tag_count() > 50);
        std::assert_eq!(registry.tag_id("StripOffsets"), Some(273));
        std::assert_eq!(registry.tag_name(279), Some("StripByteCounts"));
        std::assert_eq!(registry.datatype_code("IFD8"), Some(field_types::IFD8));

        let strips = registry.tag_info(273).unwrap();
        std::assert!(strips.offset_data);
        std::assert_eq!(strips.byte_counts, Some(279));
        std::assert_eq!(registry.offsets_tag_for(279), Some(273));
        std::assert!(registry.is_byte_count(279));
        std::assert!(registry.is_sub_ifd(330));
        std::assert!(!registry.is_sub_ifd(256));
    }

    #[test]
    fn test_jpeg_tables_are_fixed_blocks() {
        let registry = default_registry();
        for (tag, length) in [(519u16, 64u64), (520, 33), (521, 272)] {
            std::assert!(registry.is_offset_data(tag));
            std::assert_eq!(registry.fixed_length(tag), Some(length));
        }
        std::assert_eq!(registry.tag_id("JPEGACTables"), Some(521));
    }

    #[test]
    fn test_geo_keys_and_resolution() {
        let registry = default_registry();
        let key = registry.geo_key("GTCitationGeoKey").unwrap();
        std::assert_eq!(key.id, 1026);
        std::assert_eq!(key.datatype, field_types::ASCII);

        std::assert_eq!(registry.resolve_tag("256"), Some(256));
        std::assert_eq!(registry.resolve_tag("ImageWidth"), Some(256));
        std::assert_eq!(registry.resolve_tag("NoSuchTag"), None);
    }

    #[test]
    fn test_rejects_malformed_table() {
        std::assert!(TagRegistry::from_str("[[tags]]\nname = \"NoId\"\n").is_err());
    }
}
