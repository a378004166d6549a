use std::borrow::Cow;

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use serde_json::{Map, Value};

use crate::{ConfigError, Result, Snapshot, format::Format};

use super::{
    Codec,
    scalar::{infer, render},
    utf8,
};

const ROOT: &str = "config";
const ENTRY: &str = "entry";
const KEY_ATTR: &str = "key";
const TYPE_ATTR: &str = "type";
const MAP_TYPE: &str = "map";

/// XML rooted at `<config>`.
///
/// Mappings are child elements and leaves are element text. Keys that are not
/// valid element names are written as `<entry key="...">`. Empty mappings are
/// tagged `type="map"` so they do not load back as empty strings.
pub struct XmlCodec;

impl Codec for XmlCodec {
    fn format(&self) -> Format {
        Format::Xml
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        let mut reader = Reader::from_str(utf8(Format::Xml, bytes)?);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<Snapshot> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    if stack.is_empty() {
                        expect_root(&start, root.is_some())?;
                        stack.push(Frame::new(ROOT.to_string(), true));
                    } else {
                        stack.push(Frame::new(key_of(&start)?, is_map(&start)?));
                    }
                }
                Event::Empty(start) => {
                    if stack.is_empty() {
                        expect_root(&start, root.is_some())?;
                        root = Some(Snapshot::new());
                        continue;
                    }
                    let value = if is_map(&start)? {
                        Value::Object(Map::new())
                    } else {
                        infer("")
                    };
                    insert(&mut stack, key_of(&start)?, value)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data).map_err(xml_error)?;
                    push_text(&mut stack, text)?;
                }
                Event::End(_) => {
                    let Some(frame) = stack.pop() else {
                        return Err(xml_error("unbalanced closing tag"));
                    };
                    let key = frame.key.clone();
                    let value = frame.into_value()?;
                    if stack.is_empty() {
                        match value {
                            Value::Object(map) => root = Some(map),
                            _ => return Err(xml_error("<config> must contain elements")),
                        }
                    } else {
                        insert(&mut stack, key, value)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error("unexpected end of document"));
        }

        Ok(root.unwrap_or_default())
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        write_map(&mut writer, BytesStart::new(ROOT), snapshot)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

struct Frame {
    key: String,
    map: Map<String, Value>,
    text: String,
    tagged_map: bool,
}

impl Frame {
    fn new(key: String, tagged_map: bool) -> Self {
        Self {
            key,
            map: Map::new(),
            text: String::new(),
            tagged_map,
        }
    }

    fn into_value(self) -> Result<Value> {
        if self.map.is_empty() && !self.tagged_map {
            return Ok(infer(&self.text));
        }
        if !self.text.trim().is_empty() {
            return Err(xml_error(format!(
                "element <{}> mixes text and child elements",
                self.key
            )));
        }
        Ok(Value::Object(self.map))
    }
}

fn insert(stack: &mut [Frame], key: String, value: Value) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.map.insert(key, value);
            Ok(())
        }
        None => Err(xml_error("element outside <config>")),
    }
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(xml_error("text outside <config>")),
    }
}

fn expect_root(start: &BytesStart<'_>, seen: bool) -> Result<()> {
    if seen {
        return Err(xml_error("document has more than one root element"));
    }
    let name = element_name(start)?;
    if name != ROOT {
        return Err(xml_error(format!("root element must be <{ROOT}>, found <{name}>")));
    }
    Ok(())
}

fn element_name<'a>(start: &'a BytesStart<'_>) -> Result<&'a str> {
    std::str::from_utf8(start.name().into_inner()).map_err(xml_error)
}

fn key_of(start: &BytesStart<'_>) -> Result<String> {
    if let Some(key) = attribute(start, KEY_ATTR)? {
        return Ok(key.into_owned());
    }
    element_name(start).map(str::to_string)
}

fn is_map(start: &BytesStart<'_>) -> Result<bool> {
    Ok(attribute(start, TYPE_ATTR)?.is_some_and(|kind| kind == MAP_TYPE))
}

fn attribute<'a>(start: &'a BytesStart<'_>, name: &str) -> Result<Option<Cow<'a, str>>> {
    match start.try_get_attribute(name).map_err(xml_error)? {
        Some(attr) => attr
            .unescape_value()
            .map(|value| Some(Cow::Owned(value.into_owned())))
            .map_err(xml_error),
        None => Ok(None),
    }
}

fn write_map(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    map: &Map<String, Value>,
) -> Result<()> {
    let end = BytesEnd::new(element_name(&start)?.to_string());
    writer.write_event(Event::Start(start)).map_err(xml_error)?;

    for (key, value) in map {
        let mut child = element_for(key);
        match value {
            Value::Object(inner) if inner.is_empty() => {
                child.push_attribute((TYPE_ATTR, MAP_TYPE));
                writer.write_event(Event::Empty(child)).map_err(xml_error)?;
            }
            Value::Object(inner) => write_map(writer, child, inner)?,
            leaf => {
                let text = render(leaf);
                if text.is_empty() {
                    writer.write_event(Event::Empty(child)).map_err(xml_error)?;
                    continue;
                }
                let child_end = BytesEnd::new(element_name(&child)?.to_string());
                writer.write_event(Event::Start(child)).map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&text)))
                    .map_err(xml_error)?;
                writer.write_event(Event::End(child_end)).map_err(xml_error)?;
            }
        }
    }

    writer.write_event(Event::End(end)).map_err(xml_error)?;
    Ok(())
}

fn element_for(key: &str) -> BytesStart<'static> {
    if is_element_name(key) && key != ENTRY {
        BytesStart::new(key.to_string())
    } else {
        let mut start = BytesStart::new(ENTRY);
        start.push_attribute((KEY_ATTR, key));
        start
    }
}

fn is_element_name(key: &str) -> bool {
    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    valid_start
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        && !key.to_ascii_lowercase().starts_with("xml")
}

fn xml_error(error: impl std::fmt::Display) -> ConfigError {
    ConfigError::codec(Format::Xml, error)
}
