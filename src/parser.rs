//! Recovers stop, service and bus records from a live departure board.
//!
//! The board is markup meant for people, so the fields are recovered
//! positionally from the text of three kinds of element: the stop header
//! (`<stopCode> <stopName>/<route>`), the bus entry
//! (`<service> <destination...> <time>`) and the accessibility marker nested
//! inside a bus entry.


use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::MalformedInputError;
use crate::markup::{tokenize, MarkupEvent, MarkupMode};
use crate::model::{BusArrival, BusServiceRecord, StopDepartures};


static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("\\s+").expect("failed to compile whitespace regex"));


#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(default)]
pub struct TagNames {
    pub stop_header: String,
    pub bus_entry: String,
    pub accessibility_marker: String,
}
impl Default for TagNames {
    fn default() -> Self {
        Self {
            stop_header: "a".to_owned(),
            bus_entry: "pre".to_owned(),
            accessibility_marker: "span".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(default)]
pub struct ParserOptions {
    pub tags: TagNames,
    pub mode: MarkupMode,
}
impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            tags: TagNames::default(),
            mode: MarkupMode::Xml,
        }
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParserState {
    Idle,
    InHeader,
    InBusEntry,
    InAccessibilityMarker,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
enum TagKind {
    StopHeader,
    BusEntry,
    AccessibilityMarker,
    Other,
}


/// The parts of a stop header line.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct StopHeader {
    pub stop_code: String,
    pub stop_name: String,
    pub route: String,
}

/// The parts of a bus entry line.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct BusEntry {
    pub service_name: String,
    pub destination: String,
    pub arrival_time: String,
}


/// Collapses every run of spaces into a single space. Other whitespace is
/// kept as-is and nothing is trimmed.
pub fn collapse_spaces(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        collapsed.push(c);
    }
    collapsed
}

/// Splits `<stopCode> <stopName>/<route>`.
///
/// The stop code ends at the first space and the stop name at the first
/// slash after it, so stop names may contain spaces but not slashes.
pub fn parse_stop_header(line: &str) -> StopHeader {
    let (stop_code, rest) = match line.split_once(' ') {
        Some((code, rest)) => (code, rest),
        None => (line, ""),
    };
    let (stop_name, route) = match rest.split_once('/') {
        Some((name, route)) => (name, route),
        None => (rest, ""),
    };
    StopHeader {
        stop_code: stop_code.trim().to_owned(),
        stop_name: stop_name.trim().to_owned(),
        route: route.trim().to_owned(),
    }
}

/// Splits `<service> <destination...> <time>` on whitespace.
///
/// The arrival time is always the last token alone, so "5 min" comes out as
/// "min". Lines with fewer than three tokens are rejected.
pub fn parse_bus_entry(line: &str) -> Option<BusEntry> {
    let tokens: Vec<&str> = WHITESPACE_RE.split(line)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 3 {
        return None;
    }
    Some(BusEntry {
        service_name: tokens[0].to_owned(),
        destination: tokens[1..tokens.len()-1].join(" "),
        arrival_time: tokens[tokens.len()-1].to_owned(),
    })
}


/// Builds a [`StopDepartures`] from the markup events of one document.
///
/// A parser is used for exactly one document: feed it every event, then call
/// [`DeparturesParser::finish`].
///
/// Later stop headers overwrite the stop code and name of earlier ones, and
/// every accepted bus entry overwrites the service name of the service block
/// it belongs to.
#[derive(Debug)]
pub struct DeparturesParser {
    tags: TagNames,
    state: ParserState,
    text: String,
    in_header: bool,
    marker_depth: usize,
    draft: Option<BusArrival>,
    departures: StopDepartures,
}
impl DeparturesParser {
    pub fn new(tags: TagNames) -> Self {
        Self {
            tags,
            state: ParserState::Idle,
            text: String::new(),
            in_header: false,
            marker_depth: 0,
            draft: None,
            departures: StopDepartures::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    fn tag_kind(&self, name: &str) -> TagKind {
        if name.eq_ignore_ascii_case(&self.tags.stop_header) {
            TagKind::StopHeader
        } else if name.eq_ignore_ascii_case(&self.tags.bus_entry) {
            TagKind::BusEntry
        } else if name.eq_ignore_ascii_case(&self.tags.accessibility_marker) {
            TagKind::AccessibilityMarker
        } else {
            TagKind::Other
        }
    }

    fn next_state(&self) -> ParserState {
        if self.marker_depth > 0 {
            ParserState::InAccessibilityMarker
        } else if self.draft.is_some() {
            ParserState::InBusEntry
        } else if self.in_header {
            ParserState::InHeader
        } else {
            ParserState::Idle
        }
    }

    pub fn feed(&mut self, event: &MarkupEvent) {
        match event {
            MarkupEvent::Start(name) => self.start_element(name),
            MarkupEvent::Text(text) => self.characters(text),
            MarkupEvent::End(name) => self.end_element(name),
        }
        self.state = self.next_state();
    }

    fn start_element(&mut self, name: &str) {
        match self.tag_kind(name) {
            TagKind::StopHeader => {
                self.in_header = true;
                self.text.clear();
            },
            TagKind::BusEntry => {
                self.draft = Some(BusArrival::default());
                self.text.clear();
            },
            TagKind::AccessibilityMarker => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.accessible = true;
                }
                self.marker_depth += 1;
            },
            TagKind::Other => {},
        }
    }

    fn characters(&mut self, text: &str) {
        if self.state == ParserState::InAccessibilityMarker {
            return;
        }
        self.text.push_str(&collapse_spaces(text));
    }

    fn end_element(&mut self, name: &str) {
        match self.tag_kind(name) {
            TagKind::StopHeader => {
                self.handle_stop_header();
                self.in_header = false;
            },
            TagKind::BusEntry => self.handle_bus_entry(),
            TagKind::AccessibilityMarker => {
                self.marker_depth = self.marker_depth.saturating_sub(1);
            },
            TagKind::Other => {},
        }
    }

    fn handle_stop_header(&mut self) {
        let header = parse_stop_header(&self.text);
        self.departures.stop_code = header.stop_code;
        self.departures.stop_name = header.stop_name;
        self.departures.services.push(BusServiceRecord {
            service_name: String::new(),
            route: header.route,
            buses: Vec::new(),
        });
    }

    fn handle_bus_entry(&mut self) {
        let Some(mut bus) = self.draft.take() else {
            return;
        };
        let Some(entry) = parse_bus_entry(&self.text) else {
            debug!("discarding bus entry with too few fields: {:?}", self.text);
            return;
        };
        let Some(service) = self.departures.services.last_mut() else {
            warn!("discarding bus entry {:?} preceding any stop header", self.text);
            return;
        };
        service.service_name = entry.service_name;
        bus.destination = entry.destination;
        bus.arrival_time = entry.arrival_time;
        service.buses.push(bus);
    }

    pub fn finish(self) -> StopDepartures {
        self.departures
    }
}


/// Parses a complete departure board document.
pub fn parse_departures(markup: &[u8], options: &ParserOptions) -> Result<StopDepartures, MalformedInputError> {
    let events = tokenize(markup, options.mode)?;
    let mut parser = DeparturesParser::new(options.tags.clone());
    for event in &events {
        parser.feed(event);
    }
    Ok(parser.finish())
}


#[cfg(test)]
mod tests {
    use super::*;

    const BOARD: &str = concat!(
        "<a>36241601 Princes Street/ 22  , 3  , X28</a>",
        "<pre>22   City Centre   5</pre>",
        "<pre>22 Ocean Terminal <span>LF</span>12</pre>",
        "<a>36241601 Princes Street/ 3  , 29</a>",
        "<pre>3 Mayfield DUE</pre>",
        "<pre>3 DUE</pre>",
    );

    fn parse(markup: &str) -> StopDepartures {
        parse_departures(markup.as_bytes(), &ParserOptions::default()).unwrap()
    }

    #[test]
    fn test_collapse_spaces() {
        assert_eq!(collapse_spaces("22   City  Centre 5"), "22 City Centre 5");
        assert_eq!(collapse_spaces("  leading and trailing  "), " leading and trailing ");
        assert_eq!(collapse_spaces("tabs\t\tstay"), "tabs\t\tstay");
        assert_eq!(collapse_spaces(""), "");
    }

    #[test]
    fn test_collapse_spaces_idempotent() {
        for input in ["a  b   c", "   ", " x ", "22 , 3 , X28", "no-spaces"] {
            let once = collapse_spaces(input);
            assert_eq!(collapse_spaces(&once), once);
        }
    }

    #[test]
    fn test_stop_header() {
        let header = parse_stop_header(&collapse_spaces("36241601 Princes Street/ 22  , 3  , X28"));
        assert_eq!(header.stop_code, "36241601");
        assert_eq!(header.stop_name, "Princes Street");
        assert_eq!(header.route, "22 , 3 , X28");
    }

    #[test]
    fn test_stop_header_missing_parts() {
        let header = parse_stop_header("36241601");
        assert_eq!(header.stop_code, "36241601");
        assert_eq!(header.stop_name, "");
        assert_eq!(header.route, "");

        let header = parse_stop_header("36241601 Princes Street");
        assert_eq!(header.stop_name, "Princes Street");
        assert_eq!(header.route, "");

        let header = parse_stop_header("36241601 A/B/C");
        assert_eq!(header.stop_name, "A");
        assert_eq!(header.route, "B/C");
    }

    #[test]
    fn test_bus_entry_last_token_is_time() {
        let entry = parse_bus_entry("22   City Centre   5 min").unwrap();
        assert_eq!(entry.service_name, "22");
        assert_eq!(entry.destination, "City Centre 5");
        assert_eq!(entry.arrival_time, "min");

        let entry = parse_bus_entry("22 City DUE").unwrap();
        assert_eq!(entry.destination, "City");
        assert_eq!(entry.arrival_time, "DUE");
    }

    #[test]
    fn test_bus_entry_too_short() {
        assert_eq!(parse_bus_entry("22 DUE"), None);
        assert_eq!(parse_bus_entry("  22 \n DUE  "), None);
        assert_eq!(parse_bus_entry(""), None);
    }

    #[test]
    fn test_board() {
        let departures = parse(BOARD);
        assert_eq!(departures.stop_code, "36241601");
        assert_eq!(departures.stop_name, "Princes Street");
        assert_eq!(departures.services.len(), 2);

        let first = &departures.services[0];
        assert_eq!(first.service_name, "22");
        assert_eq!(first.route, "22 , 3 , X28");
        assert_eq!(
            first.buses,
            vec![
                BusArrival { destination: "City Centre".to_owned(), arrival_time: "5".to_owned(), accessible: false },
                BusArrival { destination: "Ocean Terminal".to_owned(), arrival_time: "12".to_owned(), accessible: true },
            ],
        );

        // the two-token entry is dropped
        let second = &departures.services[1];
        assert_eq!(second.service_name, "3");
        assert_eq!(second.route, "3 , 29");
        assert_eq!(second.buses.len(), 1);
        assert_eq!(second.buses[0].destination, "Mayfield");
    }

    #[test]
    fn test_multi_word_time_keeps_last_token() {
        let departures = parse("<a>1 Stop/ 22</a><pre>22   City Centre   5 min</pre>");
        let bus = &departures.services[0].buses[0];
        assert_eq!(bus.destination, "City Centre 5");
        assert_eq!(bus.arrival_time, "min");
    }

    #[test]
    fn test_marker_text_excluded() {
        let departures = parse("<a>1 Stop/ 22</a><pre>22 Leith <span>Low Floor Bus</span> 7</pre>");
        let bus = &departures.services[0].buses[0];
        assert!(bus.accessible);
        assert_eq!(bus.destination, "Leith");
        assert_eq!(bus.arrival_time, "7");
    }

    #[test]
    fn test_marker_after_entry_does_not_mark_it() {
        let departures = parse("<a>1 Stop/ 22</a><pre>22 Leith 7</pre><span>LF</span>");
        assert!(!departures.services[0].buses[0].accessible);
    }

    #[test]
    fn test_last_header_wins() {
        let departures = parse("<a>1 First Stop/ 1</a><a>2 Second Stop/ 2</a>");
        assert_eq!(departures.stop_code, "2");
        assert_eq!(departures.stop_name, "Second Stop");
        assert_eq!(departures.services.len(), 2);
        assert_eq!(departures.services[0].service_name, "");
    }

    #[test]
    fn test_last_entry_sets_service_name() {
        let departures = parse("<a>1 Stop/ 22</a><pre>22 Leith 7</pre><pre>22N Leith 9</pre>");
        assert_eq!(departures.services[0].service_name, "22N");
        assert_eq!(departures.services[0].buses.len(), 2);
    }

    #[test]
    fn test_entry_before_header_dropped() {
        let departures = parse("<pre>22 Leith 7</pre><a>1 Stop/ 22</a>");
        assert_eq!(departures.services.len(), 1);
        assert!(departures.services[0].buses.is_empty());
    }

    #[test]
    fn test_counts_match_elements() {
        let mut markup = String::new();
        for service in 0..4 {
            markup.push_str(&format!("<a>36241601 Princes Street/ {}</a>", service));
            for bus in 0..service {
                markup.push_str(&format!("<pre>{} Somewhere {}</pre>", service, bus));
            }
        }
        let departures = parse(&markup);
        assert_eq!(departures.services.len(), 4);
        for (i, service) in departures.services.iter().enumerate() {
            assert_eq!(service.buses.len(), i);
        }
        assert_eq!(departures.bus_count(), 6);
    }

    #[test]
    fn test_custom_tags() {
        let options = ParserOptions {
            tags: TagNames {
                stop_header: "H2".to_owned(),
                bus_entry: "li".to_owned(),
                accessibility_marker: "em".to_owned(),
            },
            mode: MarkupMode::Xml,
        };
        let markup = "<h2>36241601 Princes Street/ 22</h2><ul><li>22 Leith <em>x</em>4</li></ul><a>ignored</a>";
        let departures = parse_departures(markup.as_bytes(), &options).unwrap();
        assert_eq!(departures.stop_name, "Princes Street");
        assert_eq!(departures.services.len(), 1);
        assert!(departures.services[0].buses[0].accessible);
        assert_eq!(departures.services[0].buses[0].arrival_time, "4");
    }

    #[test]
    fn test_state_transitions() {
        let mut parser = DeparturesParser::new(TagNames::default());
        assert_eq!(parser.state(), ParserState::Idle);
        parser.feed(&MarkupEvent::Start("a".to_owned()));
        assert_eq!(parser.state(), ParserState::InHeader);
        parser.feed(&MarkupEvent::Text("1 Stop/ 22".to_owned()));
        parser.feed(&MarkupEvent::End("a".to_owned()));
        assert_eq!(parser.state(), ParserState::Idle);
        parser.feed(&MarkupEvent::Start("PRE".to_owned()));
        assert_eq!(parser.state(), ParserState::InBusEntry);
        parser.feed(&MarkupEvent::Start("span".to_owned()));
        assert_eq!(parser.state(), ParserState::InAccessibilityMarker);
        parser.feed(&MarkupEvent::Text("22 not counted".to_owned()));
        parser.feed(&MarkupEvent::End("span".to_owned()));
        assert_eq!(parser.state(), ParserState::InBusEntry);
        parser.feed(&MarkupEvent::Text("22 Leith 3".to_owned()));
        parser.feed(&MarkupEvent::End("pre".to_owned()));
        assert_eq!(parser.state(), ParserState::Idle);

        let departures = parser.finish();
        assert_eq!(departures.services[0].buses[0].destination, "Leith");
        assert!(departures.services[0].buses[0].accessible);
    }

    #[test]
    fn test_nested_markers() {
        let mut parser = DeparturesParser::new(TagNames::default());
        parser.feed(&MarkupEvent::Start("a".to_owned()));
        parser.feed(&MarkupEvent::Text("1 Stop/ 22".to_owned()));
        parser.feed(&MarkupEvent::End("a".to_owned()));
        parser.feed(&MarkupEvent::Start("pre".to_owned()));
        parser.feed(&MarkupEvent::Text("22 Leith ".to_owned()));
        parser.feed(&MarkupEvent::Start("span".to_owned()));
        parser.feed(&MarkupEvent::Start("span".to_owned()));
        parser.feed(&MarkupEvent::Text("inner".to_owned()));
        parser.feed(&MarkupEvent::End("span".to_owned()));
        assert_eq!(parser.state(), ParserState::InAccessibilityMarker);
        parser.feed(&MarkupEvent::Text("outer".to_owned()));
        parser.feed(&MarkupEvent::End("span".to_owned()));
        assert_eq!(parser.state(), ParserState::InBusEntry);
        parser.feed(&MarkupEvent::Text("7".to_owned()));
        parser.feed(&MarkupEvent::End("pre".to_owned()));

        let departures = parser.finish();
        assert_eq!(
            departures.services[0].buses,
            vec![BusArrival { destination: "Leith".to_owned(), arrival_time: "7".to_owned(), accessible: true }],
        );
    }

    #[test]
    fn test_empty_marker_element() {
        let departures = parse(concat!(
            "<a>36241601 Princes Street/ 22</a>",
            "<pre>22 Leith <span class=\"lf\"/>7</pre>",
            "<pre>22 Ocean Terminal 9</pre>",
        ));
        assert_eq!(
            departures.services[0].buses,
            vec![
                BusArrival { destination: "Leith".to_owned(), arrival_time: "7".to_owned(), accessible: true },
                BusArrival { destination: "Ocean Terminal".to_owned(), arrival_time: "9".to_owned(), accessible: false },
            ],
        );
    }

    #[test]
    fn test_block_level_tag_names() {
        let cases = [
            ("stop", "p", "div"),
            ("p", "tr", "td"),
            ("div", "p", "br"),
        ];
        for (stop_header, bus_entry, accessibility_marker) in cases {
            let options = ParserOptions {
                tags: TagNames {
                    stop_header: stop_header.to_owned(),
                    bus_entry: bus_entry.to_owned(),
                    accessibility_marker: accessibility_marker.to_owned(),
                },
                mode: MarkupMode::Xml,
            };
            let markup = format!(
                "<{h}>36241601 Princes Street/ 22</{h}><{e}>22 Leith <{m}>LF</{m}>7</{e}><{e}>22 Ocean Terminal 9</{e}>",
                h = stop_header, e = bus_entry, m = accessibility_marker,
            );
            let departures = parse_departures(markup.as_bytes(), &options).unwrap();
            assert_eq!(departures.stop_code, "36241601");
            assert_eq!(departures.services.len(), 1);
            let buses = &departures.services[0].buses;
            assert_eq!(buses.len(), 2, "tags {:?}", (stop_header, bus_entry, accessibility_marker));
            assert_eq!(buses[0].destination, "Leith");
            assert_eq!(buses[0].arrival_time, "7");
            assert!(buses[0].accessible);
            assert!(!buses[1].accessible);
        }
    }

    #[test]
    fn test_xhtml_board() {
        let board = concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Live times</title></head><body>\n",
            "<a href=\"/stop/36241601\">36241601 Princes Street/ 22  , 3</a><br/>\n",
            "<pre><![CDATA[22  Leith & Docks  ]]><span>LF</span>DUE</pre>\n",
            "<pre>3 Mayfield &amp; Fairmilehead 12</pre>\n",
            "</body></html>",
        );
        let departures = parse(board);
        assert_eq!(departures.stop_code, "36241601");
        assert_eq!(departures.stop_name, "Princes Street");
        assert_eq!(departures.services[0].route, "22 , 3");
        assert_eq!(departures.services[0].service_name, "3");
        assert_eq!(
            departures.services[0].buses,
            vec![
                BusArrival { destination: "Leith & Docks".to_owned(), arrival_time: "DUE".to_owned(), accessible: true },
                BusArrival { destination: "Mayfield & Fairmilehead".to_owned(), arrival_time: "12".to_owned(), accessible: false },
            ],
        );
    }

    #[test]
    fn test_malformed_markup_fails() {
        let malformed: [&[u8]; 3] = [
            b"<a>1 Stop/ 22</a><pre>22 Leith 7",
            b"<a>1 Stop/ 22</a><pre>22 Leith <span>LF</pre></span>",
            b"<a>1 Stop/ 22</a><pre>22 Leith 7</pre></a>",
        ];
        for markup in malformed {
            let result = parse_departures(markup, &ParserOptions::default());
            assert!(matches!(result, Err(MalformedInputError::Markup(_))));
        }
    }

    #[test]
    fn test_html_mode_recovers() {
        let options = ParserOptions {
            tags: TagNames::default(),
            mode: MarkupMode::Html,
        };
        let departures = parse_departures(b"<a>1 Stop/ 22</a><pre>22 Leith&nbsp;Links 7", &options).unwrap();
        assert_eq!(departures.services[0].buses.len(), 1);
        assert_eq!(departures.services[0].buses[0].arrival_time, "7");
    }
}
