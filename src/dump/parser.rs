//! Text dump parser
//!
//! Turns the lines of a `tifftools dump` listing into `DumpRecord`s. Nesting
//! is tracked with an explicit stack of frames: a `Directory` frame for each
//! open IFD and a `Chain` frame for each open sub-IFD listing. A frame is
//! identified by its path from the top-level IFD list, so the tree itself
//! stays a plain owned value.

use std::collections::HashSet;
use log::{debug, trace, warn};

use crate::dump::line::{self, DumpLine, TagLine};
use crate::dump::values;
use crate::tiff::constants::{field_types, tags};
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::geokeys::GeoKeyDirectoryBuilder;
use crate::tiff::ifd::{value_count, Ifd, TagData, TagRecord};
use crate::tiff::registry::TagClassifier;
use crate::tiff::types::{DumpRecord, TiffStructure};

/// Location of an IFD inside a record's tree
///
/// `steps` descends through (tag, chain index, IFD index) triples.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IfdPath {
    top: usize,
    steps: Vec<(u16, usize, usize)>,
}

impl IfdPath {
    fn top(index: usize) -> Self {
        IfdPath { top: index, steps: Vec::new() }
    }

    /// Nesting depth; 0 for a top-level IFD
    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    fn resolve<'a>(&self, ifds: &'a mut [Ifd]) -> Option<&'a mut Ifd> {
        let mut ifd = ifds.get_mut(self.top)?;
        for &(tag, chain, index) in &self.steps {
            ifd = ifd.tags.get_mut(&tag)?.ifds.get_mut(chain)?.get_mut(index)?;
        }
        Some(ifd)
    }
}

/// Location of one sub-IFD chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPath {
    parent: IfdPath,
    tag: u16,
    chain: usize,
}

impl ChainPath {
    fn resolve<'a>(&self, ifds: &'a mut [Ifd]) -> Option<&'a mut Vec<Ifd>> {
        self.parent.resolve(ifds)?.tags.get_mut(&self.tag)?.ifds.get_mut(self.chain)
    }

    fn child(&self, index: usize) -> IfdPath {
        let mut path = self.parent.clone();
        path.steps.push((self.tag, self.chain, index));
        path
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Directory(IfdPath),
    Chain(ChainPath),
}

struct GeoState {
    path: IfdPath,
    builder: GeoKeyDirectoryBuilder,
}

enum GeoValue<'a> {
    Short(u16),
    Doubles(Vec<f64>),
    Ascii(&'a str),
}

fn syntax_error(line: usize, message: impl Into<String>) -> TiffError {
    TiffError::DumpSyntax(line, message.into())
}

/// Parses text dumps into records
pub struct DumpParser<'a> {
    classifier: &'a dyn TagClassifier,
    records: Vec<DumpRecord>,
    current: Option<TiffStructure>,
    current_name: Option<String>,
    pending_name: Option<String>,
    stack: Vec<Frame>,
    open_ascii: Option<(IfdPath, u16)>,
    geo_context: bool,
    geo: Option<GeoState>,
    assembled_geo: HashSet<IfdPath>,
    line_number: usize,
}

impl<'a> DumpParser<'a> {
    pub fn new(classifier: &'a dyn TagClassifier) -> Self {
        DumpParser {
            classifier,
            records: Vec::new(),
            current: None,
            current_name: None,
            pending_name: None,
            stack: Vec::new(),
            open_ascii: None,
            geo_context: false,
            geo: None,
            assembled_geo: HashSet::new(),
            line_number: 0,
        }
    }

    /// Parses a whole dump
    ///
    /// # Returns
    /// Every record found, in input order. An input without a `Header:`
    /// line yields an empty list.
    pub fn parse(mut self, content: &str) -> TiffResult<Vec<DumpRecord>> {
        for (index, raw) in content.lines().enumerate() {
            self.line_number = index + 1;
            self.parse_line(raw.trim_end())?;
        }
        self.finish_record()?;
        debug!("Parsed {} dump records from {} lines", self.records.len(), self.line_number);
        Ok(self.records)
    }

    fn parse_line(&mut self, text: &str) -> TiffResult<()> {
        let kind = line::classify(text, self.geo_context);

        if !kind.is_structural() {
            if let Some((path, tag)) = self.open_ascii.clone() {
                self.append_text(&path, tag, text)?;
            }
            return Ok(());
        }

        self.open_ascii = None;
        if !matches!(kind, DumpLine::GeoKey { .. }) {
            self.end_geo_context()?;
        }

        if kind.is_nested() {
            while !self.stack.is_empty() && !line::has_indent(text, self.stack.len()) {
                self.stack.pop();
            }
        }

        match kind {
            DumpLine::RecordName(name) => {
                self.pending_name = Some(name.to_string());
            },
            DumpLine::Header { big_endian, big_tiff } => {
                self.finish_record()?;
                debug!("Record header at line {}: big_endian={}, big_tiff={}",
                       self.line_number, big_endian, big_tiff);
                self.current = Some(TiffStructure::new(big_endian, big_tiff));
                self.current_name = self.pending_name.take();
            },
            DumpLine::Directory => self.open_directory()?,
            DumpLine::SubIfdList { tagset } => self.open_chain(tagset)?,
            DumpLine::Tag(tag_line) => self.add_tag(&tag_line)?,
            DumpLine::GeoKey { name, value } => self.add_geo_key(name, value)?,
            DumpLine::Text => {},
        }

        Ok(())
    }

    fn finish_record(&mut self) -> TiffResult<()> {
        self.end_geo_context()?;
        self.stack.clear();
        self.open_ascii = None;
        self.assembled_geo.clear();

        if let Some(tiff) = self.current.take() {
            self.records.push(DumpRecord { name: self.current_name.take(), tiff });
        }
        Ok(())
    }

    fn ifd_mut(&mut self, path: &IfdPath) -> TiffResult<&mut Ifd> {
        let line = self.line_number;
        self.current.as_mut()
            .and_then(|tiff| path.resolve(&mut tiff.ifds))
            .ok_or_else(|| syntax_error(line, "Directory is no longer reachable"))
    }

    fn current_directory(&self, context: &str) -> TiffResult<IfdPath> {
        match self.stack.last() {
            Some(Frame::Directory(path)) => Ok(path.clone()),
            _ => Err(syntax_error(self.line_number, context)),
        }
    }

    fn open_directory(&mut self) -> TiffResult<()> {
        let line = self.line_number;
        let tiff = self.current.as_mut()
            .ok_or_else(|| syntax_error(line, "Directory before any header"))?;

        let path = match self.stack.last() {
            None => {
                tiff.ifds.push(Ifd::new());
                IfdPath::top(tiff.ifds.len() - 1)
            },
            Some(Frame::Chain(chain)) => {
                let ifds = chain.resolve(&mut tiff.ifds)
                    .ok_or_else(|| syntax_error(line, "Sub-IFD chain is no longer reachable"))?;
                ifds.push(Ifd::new());
                chain.child(ifds.len() - 1)
            },
            Some(Frame::Directory(_)) => {
                return Err(syntax_error(line, "Directory nested directly inside another directory"));
            },
        };

        trace!("Line {}: directory at depth {}", line, path.depth());
        self.stack.push(Frame::Directory(path));
        Ok(())
    }

    fn open_chain(&mut self, tagset: &str) -> TiffResult<()> {
        let tag = self.classifier.resolve_tag(tagset)
            .ok_or_else(|| TiffError::UnknownTagName(tagset.to_string()))?;
        let parent = self.current_directory("Sub-IFD listing outside a directory")?;

        let ifd = self.ifd_mut(&parent)?;
        let record = ifd.tags.entry(tag)
            .or_insert_with(|| TagRecord::sub_ifd_holder(field_types::IFD));
        record.ifds.push(Vec::new());
        let chain = record.ifds.len() - 1;

        trace!("Line {}: sub-IFD chain {} of tag {}", self.line_number, chain, tag);
        self.stack.push(Frame::Chain(ChainPath { parent, tag, chain }));
        Ok(())
    }

    fn add_tag(&mut self, tag_line: &TagLine<'_>) -> TiffResult<()> {
        let line = self.line_number;
        let path = self.current_directory("Tag outside a directory")?;

        let tag: u16 = tag_line.id.parse()
            .map_err(|_| syntax_error(line, format!("Bad tag id {}", tag_line.id)))?;
        let datatype = self.classifier.datatype_code(tag_line.datatype)
            .ok_or_else(|| TiffError::UnknownDatatype(tag_line.datatype.to_string()))?;
        let count = match tag_line.count {
            Some(count) => count.parse::<u64>()
                .map_err(|_| syntax_error(line, format!("Bad count <{}>", count)))?,
            None => 1,
        };

        let data = match datatype {
            field_types::ASCII => TagData::Ascii(tag_line.value.to_string()),
            field_types::BYTE | field_types::UNDEFINED => {
                TagData::Bytes(values::parse_byte_value(tag, tag_line.value)?)
            },
            _ if self.classifier.is_offset_data(tag) => {
                TagData::Integers(vec![8; count as usize])
            },
            _ => values::parse_numeric_value(tag, datatype, count, tag_line.value)?,
        };

        if tag == tags::GEO_KEY_DIRECTORY_TAG {
            self.geo_context = true;
        }
        if (tag == tags::GEO_DOUBLE_PARAMS_TAG || tag == tags::GEO_ASCII_PARAMS_TAG)
            && self.assembled_geo.contains(&path)
        {
            debug!("Line {}: ignoring dumped tag {} in favour of the assembled GeoKey directory", line, tag);
            return Ok(());
        }

        trace!("Line {}: tag {} type {} count {} ({} values)", line, tag, datatype, count, data.len());
        let mut record = TagRecord::new(datatype, data);
        let ifd = self.ifd_mut(&path)?;
        if let Some(existing) = ifd.remove(tag) {
            record.ifds = existing.ifds;
        }
        ifd.insert(tag, record);

        if datatype == field_types::ASCII {
            self.open_ascii = Some((path, tag));
        }
        Ok(())
    }

    fn append_text(&mut self, path: &IfdPath, tag: u16, text: &str) -> TiffResult<()> {
        let ifd = self.ifd_mut(path)?;
        if let Some(record) = ifd.get_mut(tag) {
            if let TagData::Ascii(value) = &mut record.data {
                value.push('\n');
                value.push_str(text);
            }
            record.count = value_count(record.datatype, &record.data);
        }
        Ok(())
    }

    fn add_geo_key(&mut self, name: &str, value: &str) -> TiffResult<()> {
        let path = self.current_directory("GeoKey outside a directory")?;

        let info = match self.classifier.geo_key(name) {
            Some(info) => info,
            None => {
                self.abandon_geo(&format!("unknown GeoKey {}", name));
                return Ok(());
            },
        };

        let parsed = match info.datatype {
            field_types::DOUBLE => parse_geo_doubles(value).map(GeoValue::Doubles),
            field_types::ASCII => Some(GeoValue::Ascii(value)),
            _ => parse_geo_short(value)
                .map_err(|msg| TiffError::DumpSyntax(self.line_number, format!("{} for {}", msg, name)))?
                .map(GeoValue::Short),
        };
        let parsed = match parsed {
            Some(parsed) => parsed,
            None => {
                self.abandon_geo(&format!("unreadable value '{}' for {}", value, name));
                return Ok(());
            },
        };

        let state = self.geo.get_or_insert_with(|| GeoState {
            path,
            builder: GeoKeyDirectoryBuilder::new(),
        });
        match parsed {
            GeoValue::Short(value) => state.builder.add_short(info.id, value),
            GeoValue::Doubles(values) => state.builder.add_double(info.id, &values)?,
            GeoValue::Ascii(text) => state.builder.add_ascii(info.id, text)?,
        }
        Ok(())
    }

    fn abandon_geo(&mut self, reason: &str) {
        warn!("Line {}: {}; keeping the dumped GeoKeyDirectoryTag", self.line_number, reason);
        self.geo = None;
        self.geo_context = false;
    }

    fn end_geo_context(&mut self) -> TiffResult<()> {
        self.geo_context = false;
        if let Some(state) = self.geo.take() {
            let ifd = self.ifd_mut(&state.path)?;
            state.builder.apply_to(ifd);
            debug!("Assembled GeoKey directory with {} keys", state.builder.key_count());
            self.assembled_geo.insert(state.path);
        }
        Ok(())
    }
}

/// First integer token of a SHORT GeoKey value, parentheses ignored
///
/// `Ok(None)` means there is no number to read; a number outside the SHORT
/// range is an error.
fn parse_geo_short(value: &str) -> Result<Option<u16>, String> {
    let number = value.split_whitespace()
        .map(|token| token.trim_matches(|c| c == '(' || c == ')'))
        .find_map(|token| token.parse::<i64>().ok());
    match number {
        Some(number) => u16::try_from(number)
            .map(Some)
            .map_err(|_| format!("GeoKey value {} is outside the SHORT range", number)),
        None => Ok(None),
    }
}

/// Numeric tokens of a DOUBLE GeoKey value, up to any description
fn parse_geo_doubles(value: &str) -> Option<Vec<f64>> {
    let values = value.split_whitespace()
        .take_while(|token| !token.starts_with('('))
        .map(|token| token.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;
    if values.is_empty() { None } else { Some(values) }
}
