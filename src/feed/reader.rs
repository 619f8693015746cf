// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::BufRead;

use quick_xml::encoding::Decoder;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::ParseError;

/// Whether a tag opens or closes an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Start,
    End,
}

/// The tag a [`FeedReader`] is positioned on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    /// Element name without its prefix
    pub local_name: String,
    /// Namespace URI the element is bound to, `None` if unbound
    pub namespace: Option<String>,
    /// Unprefixed attributes as (name, value); always empty on end tags
    pub attributes: Vec<(String, String)>,
}

impl Tag {
    pub fn is_start(&self) -> bool {
        self.kind == TagKind::Start
    }

    pub fn is_end(&self) -> bool {
        self.kind == TagKind::End
    }

    /// Case-insensitive comparison of the local name
    pub fn name_is(&self, name: &str) -> bool {
        self.local_name.eq_ignore_ascii_case(name)
    }

    /// Exact match on both local name and namespace URI
    pub fn is_qualified(&self, namespace: &str, name: &str) -> bool {
        self.local_name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Value of an attribute that carries no namespace prefix
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn closing(&self) -> Tag {
        Tag {
            kind: TagKind::End,
            local_name: self.local_name.clone(),
            namespace: self.namespace.clone(),
            attributes: Vec::new(),
        }
    }

    fn describe(&self) -> String {
        match self.kind {
            TagKind::Start => format!("<{}>", self.local_name),
            TagKind::End => format!("</{}>", self.local_name),
        }
    }
}

enum Token {
    Tag(Tag),
    Text(String),
    Eof,
}

/// Namespace-aware pull cursor over an XML document.
///
/// Wraps [`NsReader`] and keeps track of the tag it currently sits on, so
/// element parsers can be handed a reader positioned at their start tag and
/// return it positioned at the matching end tag. Self-closing elements are
/// reported as a start tag followed by an end tag.
pub struct FeedReader<R> {
    inner: NsReader<R>,
    buf: Vec<u8>,
    current: Option<Tag>,
    pending_end: Option<Tag>,
}

impl<'a> FeedReader<&'a [u8]> {
    pub fn from_bytes(xml: &'a [u8]) -> Self {
        Self::new(xml)
    }
}

impl<R: BufRead> FeedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: NsReader::from_reader(reader),
            buf: Vec::new(),
            current: None,
            pending_end: None,
        }
    }

    /// The tag the cursor is positioned on, if any tag has been read yet
    pub fn current(&self) -> Option<&Tag> {
        self.current.as_ref()
    }

    /// Advance to the next start or end tag.
    ///
    /// Whitespace, comments, processing instructions and declarations are
    /// skipped. Any other text, or the end of the document, is an error.
    pub fn next_tag(&mut self) -> Result<&Tag, ParseError> {
        loop {
            match self.read_token()? {
                Token::Tag(tag) => return Ok(&*self.current.insert(tag)),
                Token::Text(text) if text.trim().is_empty() => continue,
                Token::Text(_) => {
                    return Err(ParseError::UnexpectedText {
                        element: self.current_name(),
                    });
                }
                Token::Eof => {
                    return Err(ParseError::UnexpectedEof {
                        expected: "a start or end tag".to_string(),
                    });
                }
            }
        }
    }

    /// Read the text content of the current element.
    ///
    /// The cursor must be on a start tag; afterwards it sits on the matching
    /// end tag. Text and CDATA sections are concatenated with references
    /// resolved. An empty element yields an empty string.
    pub fn next_text(&mut self) -> Result<String, ParseError> {
        let element = self.current_start_name()?;
        let mut text = String::new();

        loop {
            match self.read_token()? {
                Token::Text(fragment) => text.push_str(&fragment),
                Token::Tag(tag) if tag.is_end() => {
                    self.current = Some(tag);
                    return Ok(text);
                }
                Token::Tag(tag) => {
                    return Err(ParseError::NestedElement {
                        element,
                        child: tag.local_name,
                    });
                }
                Token::Eof => {
                    return Err(ParseError::UnexpectedEof {
                        expected: format!("</{element}>"),
                    });
                }
            }
        }
    }

    /// Consume the current element and all of its descendants.
    ///
    /// The cursor must be on a start tag and ends on the matching end tag.
    pub fn skip_subtree(&mut self) -> Result<(), ParseError> {
        let element = self.current_start_name()?;
        let mut depth = 1usize;

        loop {
            match self.read_token()? {
                Token::Tag(tag) if tag.is_start() => depth += 1,
                Token::Tag(tag) => {
                    depth -= 1;
                    if depth == 0 {
                        self.current = Some(tag);
                        return Ok(());
                    }
                }
                Token::Text(_) => {}
                Token::Eof => {
                    return Err(ParseError::UnexpectedEof {
                        expected: format!("</{element}>"),
                    });
                }
            }
        }
    }

    /// Check that the cursor is on the given tag.
    ///
    /// `namespace` of `None` requires the element to be unbound.
    pub fn require(
        &self,
        kind: TagKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), ParseError> {
        let expected = || match kind {
            TagKind::Start => format!("<{name}>"),
            TagKind::End => format!("</{name}>"),
        };

        match &self.current {
            Some(tag)
                if tag.kind == kind
                    && tag.local_name == name
                    && tag.namespace.as_deref() == namespace =>
            {
                Ok(())
            }
            Some(tag) => Err(ParseError::Mismatch {
                expected: expected(),
                found: tag.describe(),
            }),
            None => Err(ParseError::Mismatch {
                expected: expected(),
                found: "start of document".to_string(),
            }),
        }
    }

    /// Scan forward to the next start tag with the given local name.
    ///
    /// Returns `false` if the document ends first.
    pub fn advance_to_start(&mut self, name: &str) -> Result<bool, ParseError> {
        loop {
            match self.read_token()? {
                Token::Tag(tag) if tag.is_start() && tag.name_is(name) => {
                    self.current = Some(tag);
                    return Ok(true);
                }
                Token::Tag(tag) => self.current = Some(tag),
                Token::Text(_) => {}
                Token::Eof => return Ok(false),
            }
        }
    }

    fn current_start_name(&self) -> Result<String, ParseError> {
        match &self.current {
            Some(tag) if tag.is_start() => Ok(tag.local_name.clone()),
            Some(tag) => Err(ParseError::Mismatch {
                expected: "a start tag".to_string(),
                found: tag.describe(),
            }),
            None => Err(ParseError::Mismatch {
                expected: "a start tag".to_string(),
                found: "start of document".to_string(),
            }),
        }
    }

    fn current_name(&self) -> String {
        self.current
            .as_ref()
            .map(|tag| tag.local_name.clone())
            .unwrap_or_default()
    }

    fn read_token(&mut self) -> Result<Token, ParseError> {
        if let Some(end) = self.pending_end.take() {
            return Ok(Token::Tag(end));
        }

        loop {
            self.buf.clear();
            let (resolved, event) = self.inner.read_resolved_event_into(&mut self.buf)?;
            let namespace = namespace_uri(resolved);
            let decoder = self.inner.decoder();

            match event {
                Event::Start(start) => {
                    return Ok(Token::Tag(start_tag(&start, namespace, decoder)?));
                }
                Event::Empty(start) => {
                    let tag = start_tag(&start, namespace, decoder)?;
                    self.pending_end = Some(tag.closing());
                    return Ok(Token::Tag(tag));
                }
                Event::End(end) => {
                    let local_name = decoder.decode(end.local_name().as_ref())?.into_owned();
                    return Ok(Token::Tag(Tag {
                        kind: TagKind::End,
                        local_name,
                        namespace,
                        attributes: Vec::new(),
                    }));
                }
                Event::Text(text) => return Ok(Token::Text(text.decode()?.into_owned())),
                Event::CData(cdata) => return Ok(Token::Text(cdata.decode()?.into_owned())),
                Event::GeneralRef(reference) => {
                    return Ok(Token::Text(resolve_reference(&reference)?));
                }
                Event::Eof => return Ok(Token::Eof),
                _ => {}
            }
        }
    }
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(namespace) => {
            Some(String::from_utf8_lossy(namespace.as_ref()).into_owned())
        }
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    }
}

fn start_tag(
    start: &BytesStart<'_>,
    namespace: Option<String>,
    decoder: Decoder,
) -> Result<Tag, ParseError> {
    let local_name = decoder.decode(start.local_name().as_ref())?.into_owned();

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.prefix().is_some() || attribute.key.as_ref() == b"xmlns" {
            continue;
        }
        let key = decoder.decode(attribute.key.local_name().as_ref())?.into_owned();
        let value = attribute
            .decode_and_unescape_value(decoder)?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Tag {
        kind: TagKind::Start,
        local_name,
        namespace,
        attributes,
    })
}

/// Character references resolve to their character, the five predefined
/// entities to their text. Unknown entities are kept verbatim.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, ParseError> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }

    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{name};"),
    })
}
