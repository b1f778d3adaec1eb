//! XML reader
//!
//! Each direct child of the root element is a candidate record. Every element
//! in the candidate's subtree (the candidate included) that carries non-blank
//! text contributes `tag → text`; repeated tags collect into a list. When no
//! candidate yields a field, the whole document becomes one record, which
//! only happens when the root carries text of its own.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::encoding::{SourceEncoding, read_text};
use super::{ReadError, SourceReader};
use crate::models::{RawRecord, RecordOutcome, Value};
use crate::validation::xml::check_well_formed;

/// Reader for XML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlReader;

/// Minimal element tree: tag, concatenated text, children
#[derive(Debug, Default)]
struct Element {
    tag: String,
    text: String,
    children: Vec<Element>,
}

impl XmlReader {
    /// Parse already-decoded text
    pub fn read_str(&self, text: &str) -> Result<Vec<RecordOutcome>, ReadError> {
        if text.trim().is_empty() {
            return Err(ReadError::Empty);
        }
        check_well_formed(text).map_err(|e| ReadError::Preflight(format!("{:#}", e)))?;

        let root = parse_tree(text)?;

        let mut outcomes: Vec<RecordOutcome> = root
            .children
            .iter()
            .filter_map(|child| {
                let mut record = RawRecord::new();
                collect_text(child, &mut record);
                (!record.is_empty()).then_some(RecordOutcome::Parsed(record))
            })
            .collect();

        if outcomes.is_empty() {
            let mut record = RawRecord::new();
            collect_text(&root, &mut record);
            if !record.is_empty() {
                outcomes.push(RecordOutcome::Parsed(record));
            }
        }

        Ok(outcomes)
    }
}

impl SourceReader for XmlReader {
    fn read(
        &self,
        path: &Path,
        encoding: SourceEncoding,
    ) -> Result<Vec<RecordOutcome>, ReadError> {
        let text = read_text(path, encoding)?;
        self.read_str(&text)
    }
}

fn parse_tree(text: &str) -> Result<Element, ReadError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ReadError::Corrupt(format!("XML parsing error: {}", e)))?;

        match event {
            Event::Start(e) => {
                stack.push(Element {
                    tag: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                });
            }
            Event::Empty(e) => {
                let element = Element {
                    tag: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                attach(&mut stack, &mut root, element);
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let content = e
                        .unescape()
                        .map_err(|e| ReadError::Corrupt(format!("XML text error: {}", e)))?;
                    current.text.push_str(&content);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ReadError::Corrupt("Unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| ReadError::Corrupt("No root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn collect_text(element: &Element, record: &mut RawRecord) {
    let text = element.text.trim();
    if !text.is_empty() {
        let value = Value::Text(text.to_string());
        match record.0.get_mut(&element.tag) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Value::Null);
                *existing = Value::List(vec![first, value]);
            }
            None => {
                record.0.insert(element.tag.clone(), value);
            }
        }
    }
    for child in &element.children {
        collect_text(child, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_record_per_root_child() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<people>
  <person id="1">
    <name>Ann Smith</name>
    <contact><email>ann@x.com</email><phone>555</phone><phone>556</phone></contact>
  </person>
  <person>
    <name>Bob</name>
  </person>
  <person/>
</people>"#;
        let outcomes = XmlReader.read_str(xml).unwrap();
        assert_eq!(outcomes.len(), 2);

        let ann = outcomes[0].record().unwrap();
        assert_eq!(ann.get("name"), Some(&Value::from("Ann Smith")));
        assert_eq!(ann.get("email"), Some(&Value::from("ann@x.com")));
        assert_eq!(
            ann.get("phone"),
            Some(&Value::List(vec![Value::from("555"), Value::from("556")]))
        );
        assert!(ann.get("contact").is_none());
    }

    #[test]
    fn test_flat_root_children_each_form_a_record() {
        let xml = "<record><name>Ann</name><email>a@x.com</email></record>";
        let outcomes = XmlReader.read_str(xml).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0].record().unwrap().get("name"),
            Some(&Value::from("Ann"))
        );
    }

    #[test]
    fn test_entities_and_cdata() {
        let xml = "<rows><row><name>A &amp; B</name><note><![CDATA[x<y]]></note></row></rows>";
        let outcomes = XmlReader.read_str(xml).unwrap();
        let record = outcomes[0].record().unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("A & B")));
        assert_eq!(record.get("note"), Some(&Value::from("x<y")));
    }

    #[test]
    fn test_malformed_document_skips_file() {
        assert!(matches!(
            XmlReader.read_str("<rows><row><name>A</row></rows>"),
            Err(ReadError::Preflight(_))
        ));
        assert!(matches!(
            XmlReader.read_str("<rows><row>"),
            Err(ReadError::Preflight(_))
        ));
    }

    #[test]
    fn test_root_text_becomes_single_record() {
        let outcomes = XmlReader.read_str("<note>just text</note>").unwrap();
        assert_eq!(outcomes.len(), 1);
        let record = outcomes[0].record().unwrap();
        assert_eq!(record.get("note"), Some(&Value::from("just text")));
    }

    #[test]
    fn test_blank_children_fall_back_to_whole_document() {
        let outcomes = XmlReader
            .read_str("<person>Ann Smith<email> </email><phone/></person>")
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        let record = outcomes[0].record().unwrap();
        assert_eq!(record.get("person"), Some(&Value::from("Ann Smith")));
        assert!(record.get("email").is_none());
    }

    #[test]
    fn test_empty_root_yields_nothing() {
        let outcomes = XmlReader.read_str("<rows><row/><row></row></rows>").unwrap();
        assert!(outcomes.is_empty());
    }
}
