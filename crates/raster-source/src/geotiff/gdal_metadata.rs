//! GDAL_METADATA tag (42112) XML.
//!
//! ```xml
//! <GDALMetadata>
//!   <Item name="SCENE_ID">LC08_044034</Item>
//!   <Item name="UNITS" sample="0">K</Item>
//! </GDALMetadata>
//! ```
//!
//! Items carrying a `domain` attribute belong to GDAL-internal domains
//! (IMAGE_STRUCTURE, RPC, ...) and are not exposed as tags.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;

use crate::error::{RasterSourceError, Result};
use crate::metadata::Tags;

#[derive(Default)]
struct PendingItem {
    name: Option<String>,
    sample: Option<usize>,
    has_domain: bool,
    value: String,
}

impl PendingItem {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let mut item = PendingItem::default();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| RasterSourceError::format_parse(format!("GDAL_METADATA: {}", e)))?;
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            match attr.key.as_ref() {
                b"name" => item.name = Some(value),
                b"sample" => item.sample = value.trim().parse().ok(),
                b"domain" => item.has_domain = !value.is_empty(),
                _ => {}
            }
        }
        Ok(item)
    }

    fn finish(self, tags: &mut Tags, band_count: usize) {
        let Some(name) = self.name else {
            return;
        };
        if self.has_domain {
            return;
        }
        match self.sample {
            Some(band) if band < band_count => {
                tags.bands[band].insert(name, self.value);
            }
            Some(_) => {}
            None => {
                tags.head.insert(name, self.value);
            }
        }
    }
}

/// Merge the items of a GDAL_METADATA document into `tags`.
///
/// `tags.bands` is grown to `band_count` entries.
pub fn merge_gdal_metadata(xml: &str, band_count: usize, tags: &mut Tags) -> Result<()> {
    if tags.bands.len() < band_count {
        tags.bands.resize_with(band_count, BTreeMap::new);
    }

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut current: Option<PendingItem> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                current = Some(PendingItem::from_start(&e)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Item" => {
                PendingItem::from_start(&e)?.finish(tags, band_count);
            }
            Ok(Event::Text(t)) => {
                if let Some(item) = current.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| RasterSourceError::format_parse(format!("GDAL_METADATA: {}", e)))?;
                    item.value.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(item) = current.as_mut() {
                    item.value.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Item" => {
                if let Some(item) = current.take() {
                    item.finish(tags, band_count);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(RasterSourceError::format_parse(format!(
                    "GDAL_METADATA XML error at position {}: {:?}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_and_band_items() {
        let xml = r#"<GDALMetadata>
  <Item name="SCENE_ID">LC08 &amp; friends</Item>
  <Item name="UNITS" sample="0">K</Item>
  <Item name="UNITS" sample="1">m</Item>
  <Item name="COMPRESSION" domain="IMAGE_STRUCTURE">DEFLATE</Item>
  <Item name="EMPTY"/>
</GDALMetadata>"#;

        let mut tags = Tags::default();
        merge_gdal_metadata(xml, 2, &mut tags).unwrap();

        assert_eq!(tags.get("SCENE_ID"), Some("LC08 & friends"));
        assert_eq!(tags.get("EMPTY"), Some(""));
        assert_eq!(tags.get("COMPRESSION"), None);
        assert_eq!(tags.bands.len(), 2);
        assert_eq!(tags.bands[0].get("UNITS").map(String::as_str), Some("K"));
        assert_eq!(tags.bands[1].get("UNITS").map(String::as_str), Some("m"));
    }

    #[test]
    fn test_band_index_out_of_range_is_dropped() {
        let xml = r#"<GDALMetadata><Item name="X" sample="5">1</Item></GDALMetadata>"#;
        let mut tags = Tags::default();
        merge_gdal_metadata(xml, 1, &mut tags).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        let mut tags = Tags::default();
        let result = merge_gdal_metadata("<GDALMetadata><Item name=\"a\">x</Oops>", 1, &mut tags);
        assert!(result.is_err());
    }
}
