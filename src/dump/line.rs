//! Line classification for `tifftools dump` text
//!
//! Every line of a dump is one of a small closed set of kinds. Lines are
//! classified once, up front, so the parser can dispatch on the kind instead
//! of re-testing patterns.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DIRECTORY_RE: Regex = Regex::new(r"^ *Directory ([0-9]+)[,:].*$").expect("valid regex");
    static ref SUB_IFD_RE: Regex = Regex::new(r"^ *([0-9a-zA-Z]+):([0-9]+)$").expect("valid regex");
    static ref TAG_RE: Regex = Regex::new(
        r"^ *(([^ ]+) |)([0-9]+) \(0x([0-9A-F]+)\) ([A-Z]+[A-Z0-9]*): (<([0-9]+)> |)(.*)$"
    ).expect("valid regex");
    static ref GEO_KEY_RE: Regex = Regex::new(r"^ *([A-Za-z]+): (.*)$").expect("valid regex");
}

/// A tag line: `[name ]id (0xHEX) DATATYPE: [<count> ]value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLine<'a> {
    /// Tag name as printed, when the dumper knew it
    pub name: Option<&'a str>,
    /// Decimal tag id as printed
    pub id: &'a str,
    /// Datatype name
    pub datatype: &'a str,
    /// Explicit `<n>` count
    pub count: Option<&'a str>,
    /// Everything after the datatype (and count)
    pub value: &'a str,
}

/// Kinds of dump lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpLine<'a> {
    /// `-- <name> --`
    RecordName(&'a str),
    /// `Header: ...`
    Header { big_endian: bool, big_tiff: bool },
    /// `Directory N: ...` or `Directory N,M: ...`
    Directory,
    /// `<tagset>:<index>`, opening a sub-IFD chain
    SubIfdList { tagset: &'a str },
    /// A tag with its value
    Tag(TagLine<'a>),
    /// `<KeyName>: <value>` inside a GeoKey listing
    GeoKey { name: &'a str, value: &'a str },
    /// Anything else; continuation text for an open ASCII tag
    Text,
}

impl<'a> DumpLine<'a> {
    /// Whether this line ends an open ASCII value and the GeoKey listing
    pub fn is_structural(&self) -> bool {
        !matches!(self, DumpLine::Text)
    }

    /// Whether this line is subject to indentation-based nesting
    pub fn is_nested(&self) -> bool {
        matches!(self, DumpLine::Directory | DumpLine::SubIfdList { .. } | DumpLine::Tag(_) | DumpLine::GeoKey { .. })
    }
}

/// Classifies one right-trimmed dump line
///
/// GeoKey lines are only recognised while `geo_context` is set, i.e. right
/// after a GeoKeyDirectoryTag line.
pub fn classify(line: &str, geo_context: bool) -> DumpLine<'_> {
    if line.starts_with("-- ") && line.ends_with(" --") && line.len() >= 6 {
        return DumpLine::RecordName(&line[3..line.len() - 3]);
    }

    if line.starts_with("Header: ") {
        return DumpLine::Header {
            big_endian: line.contains("big-endian"),
            big_tiff: line.contains("BigTIFF"),
        };
    }

    if DIRECTORY_RE.is_match(line) {
        return DumpLine::Directory;
    }

    if let Some(caps) = SUB_IFD_RE.captures(line) {
        if let Some(tagset) = caps.get(1) {
            return DumpLine::SubIfdList { tagset: tagset.as_str() };
        }
    }

    if let Some(caps) = TAG_RE.captures(line) {
        if let (Some(id), Some(datatype), Some(value)) = (caps.get(3), caps.get(5), caps.get(8)) {
            return DumpLine::Tag(TagLine {
                name: caps.get(2).map(|m| m.as_str()),
                id: id.as_str(),
                datatype: datatype.as_str(),
                count: caps.get(7).map(|m| m.as_str()),
                value: value.as_str(),
            });
        }
    }

    if geo_context {
        if let Some(caps) = GEO_KEY_RE.captures(line) {
            if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
                return DumpLine::GeoKey { name: name.as_str(), value: value.as_str() };
            }
        }
    }

    DumpLine::Text
}

/// Number of leading spaces required for a line nested `depth` frames deep
pub fn has_indent(line: &str, depth: usize) -> bool {
    let required = depth * 2;
    line.len() >= required && line.as_bytes()[..required].iter().all(|&b| b == b' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_name_and_header() {
        std::assert_eq!(classify("-- sample.svs --", false), DumpLine::RecordName("sample.svs"));
        std::assert_eq!(
            classify("Header: 0x4d4d <big-endian> <BigTIFF>", false),
            DumpLine::Header { big_endian: true, big_tiff: true }
        );
        std::assert_eq!(
            classify("Header: 0x4949 <little-endian> <ClassicTIFF>", false),
            DumpLine::Header { big_endian: false, big_tiff: false }
        );
    }

    #[test]
    fn test_directory_lines() {
        std::assert_eq!(classify("Directory 0: offset 8 (0x8)", false), DumpLine::Directory);
        std::assert_eq!(classify("    Directory 0,1: offset 1234", false), DumpLine::Directory);
        std::assert_eq!(classify("Directory zero:", false), DumpLine::Text);
    }

    #[test]
    fn test_sub_ifd_list() {
        std::assert_eq!(classify("  SubIFD:0", false), DumpLine::SubIfdList { tagset: "SubIFD" });
        std::assert_eq!(classify("  EXIFIFD:0", false), DumpLine::SubIfdList { tagset: "EXIFIFD" });
    }

    #[test]
    fn test_tag_line_with_name_and_count() {
        let line = "  StripOffsets 273 (0x111) LONG: <10> 8 1008 2008 ...";
        match classify(line, false) {
            DumpLine::Tag(tag) => {
                std::assert_eq!(tag.name, Some("StripOffsets"));
                std::assert_eq!(tag.id, "273");
                std::assert_eq!(tag.datatype, "LONG");
                std::assert_eq!(tag.count, Some("10"));
                std::assert_eq!(tag.value, "8 1008 2008 ...");
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tag_line_without_name() {
        match classify("  65426 (0xFF92) LONG8: <3> 0 10 20", false) {
            DumpLine::Tag(tag) => {
                std::assert_eq!(tag.name, None);
                std::assert_eq!(tag.id, "65426");
                std::assert_eq!(tag.datatype, "LONG8");
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_geo_key_only_in_context() {
        std::assert_eq!(classify("    GTModelTypeGeoKey: 1", false), DumpLine::Text);
        std::assert_eq!(
            classify("    GTModelTypeGeoKey: 1", true),
            DumpLine::GeoKey { name: "GTModelTypeGeoKey", value: "1" }
        );
    }

    #[test]
    fn test_indent() {
        std::assert!(has_indent("    x", 2));
        std::assert!(!has_indent("  x", 2));
        std::assert!(has_indent("x", 0));
    }
}
