//! XML validation utilities
//!
//! Provides well-formedness checking used as the XML reader's pre-flight.

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Check that XML content is well-formed.
///
/// # Arguments
///
/// * `xml_content` - The XML content to validate
///
/// # Returns
///
/// `Ok(())` when every start tag is closed by a matching end tag, nothing is
/// left open at end of input, and there is exactly one root element.
pub fn check_well_formed(xml_content: &str) -> Result<()> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut depth: usize = 0;
    let mut roots: usize = 0;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| {
                anyhow::anyhow!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                )
            })
            .context("XML validation failed")?;

        match event {
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(_) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| anyhow::anyhow!("Unexpected closing tag"))
                    .context("XML validation failed")?;
            }
            Event::Text(text) if depth == 0 => {
                let content = text.unescape().unwrap_or_default();
                if !content.trim().is_empty() {
                    return Err(anyhow::anyhow!("Text outside of the root element"))
                        .context("XML validation failed");
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(anyhow::anyhow!("{} element(s) left unclosed", depth))
            .context("XML validation failed");
    }
    match roots {
        0 => Err(anyhow::anyhow!("No root element")).context("XML validation failed"),
        1 => Ok(()),
        n => Err(anyhow::anyhow!("Expected one root element, found {}", n))
            .context("XML validation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_document() {
        let xml = r#"<?xml version="1.0"?><people><person><name>A</name></person><person/></people>"#;
        assert!(check_well_formed(xml).is_ok());
    }

    #[test]
    fn test_mismatched_end_tag() {
        assert!(check_well_formed("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_unclosed_element() {
        assert!(check_well_formed("<a><b>text</b>").is_err());
    }

    #[test]
    fn test_multiple_roots_and_empty() {
        assert!(check_well_formed("<a/><b/>").is_err());
        assert!(check_well_formed("").is_err());
        assert!(check_well_formed("just text").is_err());
    }
}
