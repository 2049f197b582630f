//! A small owned XML tree for structured merges.
//!
//! Elements match by name and are compared on their attributes. Merging
//! adds what the fragment has and the document lacks; `except` removes
//! what the fragment put there. Conflicting attribute values keep the
//! two elements apart.

use std::collections::HashMap;

use anyhow::{Context, bail};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Add the fragment's attributes and children that this element lacks.
    pub fn merge_with(&mut self, fragment: &Element) {
        for (key, value) in &fragment.attributes {
            if self.attribute(key).is_none() {
                self.attributes.push((key.clone(), value.clone()));
            }
        }

        for child in fragment.elements() {
            match self.find_match(child) {
                Some(index) if !has_conflict(self.element_at(index), child) => {
                    if let Node::Element(existing) = &mut self.children[index] {
                        existing.merge_with(child);
                    }
                }
                _ => self.children.push(Node::Element(child.clone())),
            }
        }
    }

    /// Remove the attributes and children this element shares with
    /// `fragment`. Children left with neither attributes nor elements are
    /// dropped, along with their counterpart in the fragment.
    pub fn except(&mut self, fragment: &mut Element) {
        self.attributes
            .retain(|(key, value)| fragment.attribute(key) != Some(value.as_str()));

        let mut index = 0;
        while index < self.children.len() {
            let Node::Element(child) = &mut self.children[index] else {
                index += 1;
                continue;
            };

            let counterpart = fragment
                .find_match(child)
                .filter(|&at| !has_conflict(fragment.element_at(at), child));
            let Some(at) = counterpart else {
                index += 1;
                continue;
            };

            if let Node::Element(other) = &mut fragment.children[at] {
                child.except(other);
            }
            if child.attributes.is_empty() && !child.has_elements() {
                self.children.remove(index);
                fragment.children.remove(at);
            } else {
                index += 1;
            }
        }
    }

    fn element_at(&self, index: usize) -> &Element {
        match &self.children[index] {
            Node::Element(element) => element,
            _ => unreachable!("find_match only yields element indices"),
        }
    }

    /// Index of the same-named child that best matches `target`: most equal
    /// attributes first, then most shared attribute names.
    fn find_match(&self, target: &Element) -> Option<usize> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                Node::Element(element) if element.name == target.name => Some((index, element)),
                _ => None,
            })
            .min_by_key(|(_, candidate)| {
                let exact = count_matches(candidate, target, |a, b| a == b);
                let names = count_matches(candidate, target, |a, b| a.0 == b.0);
                (std::cmp::Reverse(exact), std::cmp::Reverse(names))
            })
            .map(|(index, _)| index)
    }
}

fn count_matches(
    left: &Element,
    right: &Element,
    matches: impl Fn(&(String, String), &(String, String)) -> bool,
) -> usize {
    left.attributes
        .iter()
        .filter(|a| right.attributes.iter().any(|b| matches(a, b)))
        .count()
}

/// Two elements conflict when they share an attribute name with different
/// values.
fn has_conflict(source: &Element, target: &Element) -> bool {
    let values: HashMap<&str, &str> = source
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    target
        .attributes
        .iter()
        .any(|(k, v)| values.get(k.as_str()).is_some_and(|existing| *existing != v))
}

/// A parsed document: optional declaration plus the root element.
#[derive(Debug, Clone)]
pub struct Document {
    declaration: Option<BytesDecl<'static>>,
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Some(BytesDecl::new("1.0", Some("utf-8"), None)),
            root,
        }
    }

    pub fn parse(bytes: &[u8]) -> anyhow::Result<Self> {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        let text = std::str::from_utf8(bytes).context("XML is not valid UTF-8")?;

        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut declaration = None;
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().context("Malformed XML")? {
                Event::Decl(decl) => declaration = Some(decl.into_owned()),
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let Some(element) = stack.pop() else {
                        bail!("Unbalanced closing tag");
                    };
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text.unescape().context("Invalid text content")?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(value.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(value));
                    }
                }
                Event::Comment(comment) => {
                    let value = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Comment(value));
                    }
                }
                Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            bail!("Unclosed element <{}>", stack[stack.len() - 1].name);
        }
        let root = root.context("XML document has no root element")?;
        Ok(Self { declaration, root })
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if let Some(decl) = &self.declaration {
            writer.write_event(Event::Decl(decl.clone()))?;
        }
        write_element(&mut writer, &self.root)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn element_from(start: &BytesStart<'_>) -> anyhow::Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.context("Malformed attribute")?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .context("Invalid attribute value")?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> anyhow::Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => bail!("XML document has more than one root element"),
    }
    Ok(())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> anyhow::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(inner) => write_element(writer, inner)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::Comment(comment) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
