use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use super::tree::XmlNode;
use crate::error::Error;

/// Serialize an [`XmlNode`] tree into a compact XML string.
///
/// Attribute values and text are escaped; no indentation is emitted
/// because the result travels inside form-encoded request bodies.
pub fn to_string(node: &XmlNode) -> Result<String, Error> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node).map_err(|e| Error::Encode(e.to_string()))?;
    String::from_utf8(writer.into_inner()).map_err(|e| Error::Encode(e.to_string()))
}

/// Serialize only the children of `node`, concatenated.
pub fn children_to_string(node: &XmlNode) -> Result<String, Error> {
    let mut out = String::new();
    for child in &node.children {
        out.push_str(&to_string(child)?);
    }
    Ok(out)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(node.tag.as_str());

    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }

    for child in &node.children {
        write_node(writer, child)?;
    }

    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}
