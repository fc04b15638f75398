use crate::schedule::{Channel, Program, TimestampError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::{ChannelPage, ProgramPage};

/// Errors raised while mapping an API document onto channels or programs.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("XML parse error: {0}")]
    Syntax(String),

    #[error("Document is not valid UTF-8")]
    Encoding,

    /// Well-formed XML, but not the listing we asked for (e.g. an HTML error page).
    #[error("Unexpected document: no <{0}> element")]
    UnexpectedDocument(&'static str),

    #[error("Invalid page count '{0}'")]
    PageCount(String),

    #[error("Schedule entry #{index} has no <{field}>")]
    MissingField { index: usize, field: &'static str },

    #[error("Schedule entry #{index}: {source}")]
    Timestamp {
        index: usize,
        #[source]
        source: TimestampError,
    },
}

/// Attributes and direct-child text of one record element.
#[derive(Debug, Default)]
struct RawRecord {
    attributes: Vec<(String, String)>,
    fields: Vec<(String, String)>,
}

impl RawRecord {
    fn attribute(&self, key: &str) -> Option<&str> {
        lookup(&self.attributes, key)
    }

    fn field(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Default)]
struct RawDocument {
    records: Vec<RawRecord>,
    total_pages: Option<String>,
    saw_container: bool,
}

/// Walks the document once, collecting every `record_tag` element.
///
/// Only text of direct children is kept, so nested elements such as the
/// `<channel>` reference inside a `<scheduledepisode>` never leak into the
/// record's fields.
fn read_records(bytes: &[u8], container_tag: &[u8], record_tag: &[u8]) -> Result<RawDocument, XmlError> {
    let content = std::str::from_utf8(bytes).map_err(|_| XmlError::Encoding)?;
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut doc = RawDocument::default();
    let mut depth: usize = 0;
    // (depth of the record element, record being built)
    let mut current: Option<(usize, RawRecord)> = None;
    // Open direct child of the current record: (tag, text)
    let mut field: Option<(String, String)> = None;
    let mut in_total_pages = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.name();
                if name.as_ref() == container_tag {
                    doc.saw_container = true;
                }
                let record_depth = current.as_ref().map(|(d, _)| *d);
                match record_depth {
                    None if name.as_ref() == record_tag => {
                        let attributes = read_attributes(&e, &reader)?;
                        current = Some((
                            depth,
                            RawRecord {
                                attributes,
                                fields: Vec::new(),
                            },
                        ));
                    }
                    None if name.as_ref() == b"totalpages" && doc.total_pages.is_none() => {
                        in_total_pages = true;
                    }
                    Some(record_depth) if depth == record_depth + 1 => {
                        field = Some((String::from_utf8_lossy(name.as_ref()).into_owned(), String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if name.as_ref() == container_tag {
                    doc.saw_container = true;
                }
                if current.is_none() && name.as_ref() == record_tag {
                    doc.records.push(RawRecord {
                        attributes: read_attributes(&e, &reader)?,
                        fields: Vec::new(),
                    });
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| XmlError::Syntax(e.to_string()))?;
                if in_total_pages {
                    doc.total_pages = Some(text.into_owned());
                } else if let Some((_, value)) = field.as_mut() {
                    value.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, value)) = field.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(_)) => {
                in_total_pages = false;
                match current.take() {
                    Some((record_depth, mut record)) => {
                        if depth == record_depth + 1 {
                            if let Some(done) = field.take() {
                                record.fields.push(done);
                            }
                            current = Some((record_depth, record));
                        } else if depth == record_depth {
                            doc.records.push(record);
                        } else {
                            current = Some((record_depth, record));
                        }
                    }
                    None => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(XmlError::Syntax(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(doc)
}

fn read_attributes(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Vec<(String, String)>, XmlError> {
    let mut attributes = Vec::new();
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed XML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| XmlError::Syntax(e.to_string()))?;
        attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(attributes)
}

/// A missing `<totalpages>` means a single page; "0" (no hits) is one empty page.
fn page_count(raw: Option<&str>) -> Result<u32, XmlError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(text) => text
            .parse::<u32>()
            .map(|n| n.max(1))
            .map_err(|_| XmlError::PageCount(text.to_string())),
    }
}

/// Parses one page of the channel catalog (`<channels><channel id name>`).
///
/// Channels without an id or a name are skipped with a warning.
pub fn parse_channel_page(bytes: &[u8], page: u32) -> Result<ChannelPage, XmlError> {
    let doc = read_records(bytes, b"channels", b"channel")?;
    if !doc.saw_container && doc.records.is_empty() {
        return Err(XmlError::UnexpectedDocument("channels"));
    }
    let total_pages = page_count(doc.total_pages.as_deref())?;

    let mut channels = Vec::with_capacity(doc.records.len());
    for record in &doc.records {
        let (Some(id), Some(name)) = (record.attribute("id"), record.attribute("name")) else {
            tracing::warn!(page, attributes = ?record.attributes, "Skipping channel without id or name");
            continue;
        };
        channels.push(
            Channel::new(id, name)
                .with_description(record.field("tagline").map(str::to_string))
                .with_image_url(record.field("image").map(str::to_string)),
        );
    }

    Ok(ChannelPage {
        items: channels,
        page,
        total_pages,
    })
}

/// Parses one page of a channel's day schedule (`<schedule><scheduledepisode>`).
///
/// Every entry needs a title and both UTC timestamps; a missing or malformed
/// one fails the whole page.
pub fn parse_schedule_page(bytes: &[u8], page: u32) -> Result<ProgramPage, XmlError> {
    let doc = read_records(bytes, b"schedule", b"scheduledepisode")?;
    if !doc.saw_container && doc.records.is_empty() {
        return Err(XmlError::UnexpectedDocument("schedule"));
    }
    let total_pages = page_count(doc.total_pages.as_deref())?;

    let mut programs = Vec::with_capacity(doc.records.len());
    for (index, record) in doc.records.iter().enumerate() {
        let required = |field: &'static str| {
            record
                .field(field)
                .ok_or(XmlError::MissingField { index, field })
        };
        let program = Program::from_source(
            required("title")?,
            required("starttimeutc")?,
            required("endtimeutc")?,
        )
        .map_err(|source| XmlError::Timestamp { index, source })?
        .with_description(record.field("description").map(str::to_string))
        .with_image_url(record.field("imageurl").map(str::to_string));
        programs.push(program);
    }

    Ok(ProgramPage {
        items: programs,
        page,
        total_pages,
    })
}
