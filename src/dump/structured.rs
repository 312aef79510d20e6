//! Structured (JSON) dumps
//!
//! A JSON dump carries the tag tree directly:
//!
//! ```json
//! {"bigEndian": false, "bigtiff": false,
//!  "ifds": [{"tags": {"256": {"datatype": 3, "count": 1, "data": [100]}}}]}
//! ```
//!
//! Tag keys may be numeric ids or registered names, datatypes may be codes or
//! names, and IFD-valued tags carry `"ifds": [[...chain...], ...]`. The top
//! level may also be an array of such objects, one per record.

use std::collections::BTreeMap;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::tiff::constants::field_types;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::{Ifd, TagData, TagRecord};
use crate::tiff::registry::TagClassifier;
use crate::tiff::types::{DumpRecord, TiffStructure};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDump {
    Many(Vec<JsonTiff>),
    One(JsonTiff),
}

#[derive(Debug, Deserialize)]
struct JsonTiff {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "bigEndian", default)]
    big_endian: bool,
    #[serde(rename = "bigtiff", default)]
    big_tiff: bool,
    ifds: Vec<JsonIfd>,
}

#[derive(Debug, Deserialize)]
struct JsonIfd {
    #[serde(default)]
    tags: BTreeMap<String, JsonTag>,
}

#[derive(Debug, Deserialize)]
struct JsonTag {
    #[serde(default)]
    datatype: Option<Value>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    ifds: Vec<Vec<JsonIfd>>,
}

/// Converts a parsed JSON document into records
pub fn records_from_json(value: Value, classifier: &dyn TagClassifier) -> TiffResult<Vec<DumpRecord>> {
    let dump: JsonDump = serde_json::from_value(value)?;
    let documents = match dump {
        JsonDump::Many(documents) => documents,
        JsonDump::One(document) => vec![document],
    };

    let converter = JsonConverter { classifier };
    documents.into_iter()
        .map(|document| {
            let mut tiff = TiffStructure::new(document.big_endian, document.big_tiff);
            tiff.ifds = converter.chain(&document.ifds)?;
            debug!("Structured record with {} IFDs", tiff.total_ifd_count());
            Ok(DumpRecord { name: document.name, tiff })
        })
        .collect()
}

struct JsonConverter<'a> {
    classifier: &'a dyn TagClassifier,
}

impl<'a> JsonConverter<'a> {
    fn chain(&self, ifds: &[JsonIfd]) -> TiffResult<Vec<Ifd>> {
        ifds.iter().map(|ifd| self.ifd(ifd)).collect()
    }

    fn ifd(&self, json: &JsonIfd) -> TiffResult<Ifd> {
        let mut ifd = Ifd::new();
        for (key, json_tag) in &json.tags {
            let tag = self.classifier.resolve_tag(key)
                .ok_or_else(|| TiffError::UnknownTagName(key.clone()))?;
            ifd.insert(tag, self.tag(tag, json_tag)?);
        }
        Ok(ifd)
    }

    fn tag(&self, tag: u16, json: &JsonTag) -> TiffResult<TagRecord> {
        let datatype = match &json.datatype {
            Some(Value::Number(code)) => code.as_u64()
                .map(|code| code as u16)
                .ok_or_else(|| TiffError::InvalidTagValue(tag, format!("Bad datatype {}", code)))?,
            Some(Value::String(name)) => self.classifier.datatype_code(name)
                .ok_or_else(|| TiffError::UnknownDatatype(name.clone()))?,
            Some(other) => return Err(TiffError::InvalidTagValue(tag, format!("Bad datatype {}", other))),
            None if !json.ifds.is_empty() => field_types::IFD,
            None => return Err(TiffError::InvalidTagValue(tag, "Missing datatype".to_string())),
        };

        let data = self.data(tag, datatype, json)?;
        let mut record = TagRecord::new(datatype, data);
        for chain in &json.ifds {
            record.ifds.push(self.chain(chain)?);
        }
        Ok(record)
    }

    fn data(&self, tag: u16, datatype: u16, json: &JsonTag) -> TiffResult<TagData> {
        let data = json.data.as_ref().unwrap_or(&Value::Null);

        if datatype == field_types::ASCII {
            return match data {
                Value::String(text) => Ok(TagData::Ascii(text.clone())),
                Value::Null => Ok(TagData::Ascii(String::new())),
                other => Err(TiffError::InvalidTagValue(tag, format!("Expected text, found {}", other))),
            };
        }

        let items: Vec<&Value> = match data {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            Value::String(text) if datatype == field_types::BYTE || datatype == field_types::UNDEFINED => {
                return Ok(TagData::Bytes(text.chars().map(|c| c as u32 as u8).collect()));
            },
            scalar => vec![scalar],
        };

        match datatype {
            field_types::BYTE | field_types::UNDEFINED => items.iter()
                .map(|item| item.as_i64().map(|v| v as u8)
                    .ok_or_else(|| TiffError::InvalidTagValue(tag, format!("Bad byte {}", item))))
                .collect::<TiffResult<Vec<u8>>>()
                .map(TagData::Bytes),
            field_types::FLOAT | field_types::DOUBLE => items.iter()
                .map(|item| item.as_f64()
                    .ok_or_else(|| TiffError::InvalidTagValue(tag, format!("Bad float {}", item))))
                .collect::<TiffResult<Vec<f64>>>()
                .map(TagData::Floats),
            _ if self.classifier.is_offset_data(tag) => {
                let count = json.count.unwrap_or(items.len() as u64);
                Ok(TagData::Integers(vec![8; count as usize]))
            },
            _ => {
                let mut values = Vec::with_capacity(items.len());
                for item in &items {
                    match item {
                        Value::Array(pair) if datatype == field_types::RATIONAL || datatype == field_types::SRATIONAL => {
                            for part in pair {
                                values.push(integer(tag, part)?);
                            }
                        },
                        _ => values.push(integer(tag, item)?),
                    }
                }
                Ok(TagData::Integers(values))
            },
        }
    }
}

fn integer(tag: u16, value: &Value) -> TiffResult<i64> {
    value.as_i64()
        .or_else(|| value.as_u64().map(|v| v as i64))
        .ok_or_else(|| TiffError::InvalidTagValue(tag, format!("Bad integer {}", value)))
}
