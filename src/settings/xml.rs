//! A small owned XML tree on top of quick-xml, enough for persisted
//! settings: elements, attributes and text.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::settings::SettingsError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XElement>,
    text: Option<String>,
}

fn xml_error(err: impl std::fmt::Display) -> SettingsError { SettingsError::Xml(err.to_string()) }

impl XElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn require_attr(&self, key: &'static str) -> Result<&str, SettingsError> {
        self.attr(key).ok_or_else(|| SettingsError::MissingAttribute {
            element: self.name.clone(),
            attribute: key,
        })
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Appends `child` and returns it for further filling.
    pub fn add(&mut self, child: XElement) -> &mut XElement {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn with_child(mut self, child: XElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(&self) -> &[XElement] { &self.children }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XElement> { self.children.iter().find(|c| c.name == name) }

    pub fn text(&self) -> Option<&str> { self.text.as_deref() }

    pub fn set_text(&mut self, text: impl Into<String>) { self.text = Some(text.into()); }

    pub fn to_xml_string(&self) -> Result<String, SettingsError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_into(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(|_| SettingsError::InvalidUtf8)
    }

    fn write_into(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), SettingsError> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() && self.text.is_none() {
            writer.write_event(Event::Empty(start)).map_err(xml_error)?;
            return Ok(());
        }
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_error)?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str()))).map_err(xml_error)?;
        Ok(())
    }

    pub fn parse(xml: &str) -> Result<XElement, SettingsError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut open: Vec<XElement> = Vec::new();
        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => open.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    match open.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| SettingsError::Xml("unbalanced closing tag".into()))?;
                    match open.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    if let Some(current) = open.last_mut() {
                        current.text = Some(text.into_owned());
                    }
                }
                Event::Eof => return Err(SettingsError::Xml("document has no root element".into())),
                _ => {}
            }
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XElement, SettingsError> {
        let mut element = XElement::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn nested_elements_with_text_and_escaping() {
        let mut root = XElement::new("modes").with_attr("version", "2");
        root.add(XElement::new("entry").with_attr("area", "a<b\"c"))
            .add(XElement::new("path"))
            .set_text("0 1");
        root.add(XElement::new("empty"));

        let xml = root.to_xml_string().unwrap();
        let parsed = XElement::parse(&xml).unwrap();
        assert_eq!(parsed, root);
        assert_eq!(parsed.child("entry").unwrap().attr("area"), Some("a<b\"c"));
        assert_eq!(
            parsed.child("entry").and_then(|e| e.child("path")).and_then(XElement::text),
            Some("0 1")
        );
    }

    #[test]
    fn missing_attribute_names_the_element() {
        let element = XElement::new("location");
        assert!(matches!(
            element.require_attr("root"),
            Err(SettingsError::MissingAttribute { attribute: "root", .. })
        ));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(XElement::parse("").is_err());
        assert!(XElement::parse("<a><b></a>").is_err());
    }
}
