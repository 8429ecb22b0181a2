//! Turns departure board markup into a flat stream of events in document order.


use scraper::{ElementRef, Html, Node};
use serde::{Deserialize, Serialize};
use sxd_document::dom::{ChildOfElement, Element};
use tracing::debug;

use crate::errors::MalformedInputError;


/// Name of the element wrapped around the board so that several top-level
/// elements form one XML document. It never shows up as an event.
const WRAPPER_ELEMENT: &str = "livebus-board";


#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupMode {
    /// The board must be well-formed XML (XHTML); anything else fails.
    #[default]
    Xml,

    /// The board is read as HTML and the HTML parser's error recovery is
    /// accepted. Only undecodable input fails.
    Html,
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MarkupEvent {
    Start(String),
    Text(String),
    End(String),
}


/// Skips a leading XML declaration and document type declaration, which
/// cannot appear inside the wrapper element.
fn strip_prolog(markup: &str) -> &str {
    let mut rest = markup.trim_start();
    if rest.starts_with("<?xml") {
        match rest.find("?>") {
            Some(end) => rest = rest[end+2..].trim_start(),
            None => return markup,
        }
    }
    let head: String = rest.chars().take(9).collect();
    if head.eq_ignore_ascii_case("<!doctype") {
        match rest.find('>') {
            Some(end) if !rest[..end].contains('[') => rest = rest[end+1..].trim_start(),
            _ => return markup,
        }
    }
    rest
}

/// Parses the markup and returns its start/text/end events.
///
/// An empty element (`<span/>`) yields a start and an end event.
pub fn tokenize(markup: &[u8], mode: MarkupMode) -> Result<Vec<MarkupEvent>, MalformedInputError> {
    let text = std::str::from_utf8(markup)?;
    match mode {
        MarkupMode::Xml => tokenize_xml(text),
        MarkupMode::Html => Ok(tokenize_html(text)),
    }
}


enum XmlStep<'d> {
    Open(Element<'d>),
    Text(&'d str),
    Close(String),
}

fn tokenize_xml(markup: &str) -> Result<Vec<MarkupEvent>, MalformedInputError> {
    let wrapped = format!("<{0}>{1}</{0}>", WRAPPER_ELEMENT, strip_prolog(markup));
    let package = sxd_document::parser::parse(&wrapped)
        .map_err(|e| MalformedInputError::Markup(vec![e.to_string()]))?;
    let document = package.as_document();

    let mut events = Vec::new();
    let mut stack = Vec::new();
    for root_child in document.root().children() {
        if let Some(wrapper) = root_child.element() {
            push_xml_children(wrapper, &mut stack);
        }
    }
    while let Some(step) = stack.pop() {
        match step {
            XmlStep::Open(element) => {
                let name = element.name().local_part().to_owned();
                events.push(MarkupEvent::Start(name.clone()));
                stack.push(XmlStep::Close(name));
                push_xml_children(element, &mut stack);
            },
            XmlStep::Text(t) => events.push(MarkupEvent::Text(t.to_owned())),
            XmlStep::Close(name) => events.push(MarkupEvent::End(name)),
        }
    }
    Ok(events)
}

fn push_xml_children<'d>(element: Element<'d>, stack: &mut Vec<XmlStep<'d>>) {
    // reversed so that the first child is popped first
    for child in element.children().into_iter().rev() {
        match child {
            ChildOfElement::Element(e) => stack.push(XmlStep::Open(e)),
            ChildOfElement::Text(t) => stack.push(XmlStep::Text(t.text())),
            _ => {},
        }
    }
}


enum HtmlStep<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Close(&'a str),
}

fn tokenize_html(markup: &str) -> Vec<MarkupEvent> {
    let markup = strip_prolog(markup);
    let html = Html::parse_fragment(markup);
    if !html.errors.is_empty() {
        debug!("recovered from {} markup errors: {:?}", html.errors.len(), html.errors);
    }

    let mut events = Vec::new();
    let mut stack = vec![HtmlStep::Open(html.root_element())];
    while let Some(step) = stack.pop() {
        match step {
            HtmlStep::Open(element) => {
                let name = element.value().name();
                events.push(MarkupEvent::Start(name.to_owned()));
                stack.push(HtmlStep::Close(name));

                let children: Vec<_> = element.children().collect();
                for child in children.into_iter().rev() {
                    match child.value() {
                        Node::Text(t) => stack.push(HtmlStep::Text(&**t)),
                        Node::Element(_) => {
                            if let Some(child_element) = ElementRef::wrap(child) {
                                stack.push(HtmlStep::Open(child_element));
                            }
                        },
                        _ => {},
                    }
                }
            },
            HtmlStep::Text(t) => events.push(MarkupEvent::Text(t.to_owned())),
            HtmlStep::Close(name) => events.push(MarkupEvent::End(name.to_owned())),
        }
    }
    events
}
