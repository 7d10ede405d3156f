//! Streaming marker scanner.
//!
//! Model output carries inline markers of the form `[FIELD:<name>:<value>]`. Deltas
//! split markers at arbitrary points, so the scanner keeps the unclassified tail of
//! the stream in a buffer and only releases text once it is known not to belong to
//! a marker.
//!
//! Closing rule for a marker value:
//! - the search window ends at the next `[FIELD:` tag, if one is present;
//! - a value starting with `[` closes at the first `]` for which the value decodes
//!   as a list literal;
//! - otherwise the first `]` in the window closes it, as soon as the value can no
//!   longer become a list or the window is bounded (next tag seen, or end of stream);
//! - no `]` in a bounded window means the tag is malformed and its span is dropped.
//!
//! Every decision depends only on text already seen, so feeding a stream in one
//! piece or split at any boundary yields the same items.

use serde_json::Value;

use crate::extractor;
use crate::state::FieldValue;

/// Literal that opens every marker.
pub const MARKER_TAG: &str = "[FIELD:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub name: String,
    pub raw_value: String,
}

impl Marker {
    pub fn decode(&self) -> FieldValue {
        extractor::decode(&self.raw_value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    /// Text safe to forward to the client.
    Text(String),
    Marker(Marker),
    /// A span that opened with the marker tag but could not be parsed. Never
    /// forwarded as text.
    Malformed(String),
}

enum Step {
    Literal,
    Wait,
    Marker {
        len: usize,
        name_end: usize,
        value_start: usize,
        value_end: usize,
    },
    Malformed {
        len: usize,
    },
}

#[derive(Debug, Default)]
pub struct MarkerScanner {
    buffer: String,
}

impl MarkerScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text held back because it may still turn into a marker.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn feed(&mut self, fragment: &str) -> Vec<ScanItem> {
        self.buffer.push_str(fragment);
        self.scan(false)
    }

    /// Resolve everything still buffered as if the stream ended here.
    pub fn finish(&mut self) -> Vec<ScanItem> {
        self.scan(true)
    }

    /// End-of-stream release of residual plain text.
    ///
    /// Unterminated marker spans are discarded. Markers that only resolve here are
    /// not returned; [`extract_markers`] over the full turn text recovers them.
    pub fn flush(&mut self) -> Option<String> {
        let mut text = String::new();
        for item in self.finish() {
            match item {
                ScanItem::Text(t) => text.push_str(&t),
                ScanItem::Marker(marker) => {
                    log::debug!("Marker '{}' resolved at end of stream", marker.name);
                }
                ScanItem::Malformed(span) => {
                    log::debug!("Discarding unterminated marker span: {:?}", span);
                }
            }
        }
        (!text.is_empty()).then_some(text)
    }

    fn scan(&mut self, at_end: bool) -> Vec<ScanItem> {
        let mut items = Vec::new();
        let mut text = String::new();
        let mut cursor = 0;
        let buf = self.buffer.as_str();

        loop {
            let rest = &buf[cursor..];
            let Some(offset) = rest.find('[') else {
                text.push_str(rest);
                cursor = buf.len();
                break;
            };
            text.push_str(&rest[..offset]);
            let start = cursor + offset;
            let candidate = &buf[start..];

            match classify(candidate, at_end) {
                Step::Literal => {
                    text.push('[');
                    cursor = start + 1;
                }
                Step::Wait => {
                    cursor = start;
                    break;
                }
                Step::Marker {
                    len,
                    name_end,
                    value_start,
                    value_end,
                } => {
                    push_text(&mut items, &mut text);
                    items.push(ScanItem::Marker(Marker {
                        name: candidate[MARKER_TAG.len()..name_end].to_string(),
                        raw_value: candidate[value_start..value_end].to_string(),
                    }));
                    cursor = start + len;
                }
                Step::Malformed { len } => {
                    push_text(&mut items, &mut text);
                    items.push(ScanItem::Malformed(candidate[..len].to_string()));
                    cursor = start + len;
                }
            }
        }

        push_text(&mut items, &mut text);
        self.buffer.drain(..cursor);
        items
    }
}

/// Parse every marker in a complete text.
pub fn extract_markers(text: &str) -> Vec<Marker> {
    let mut scanner = MarkerScanner::new();
    let mut items = scanner.feed(text);
    items.extend(scanner.finish());
    items
        .into_iter()
        .filter_map(|item| match item {
            ScanItem::Marker(marker) => Some(marker),
            _ => None,
        })
        .collect()
}

fn push_text(items: &mut Vec<ScanItem>, text: &mut String) {
    if !text.is_empty() {
        items.push(ScanItem::Text(std::mem::take(text)));
    }
}

fn is_name_byte(b: &u8) -> bool {
    b.is_ascii_alphanumeric() || *b == b'_'
}

/// Decide what the `[` at the start of `s` is.
fn classify(s: &str, at_end: bool) -> Step {
    if s.len() < MARKER_TAG.len() {
        return if MARKER_TAG.starts_with(s) && !at_end {
            Step::Wait
        } else {
            Step::Literal
        };
    }
    if !s.starts_with(MARKER_TAG) {
        return Step::Literal;
    }

    let after_tag = &s[MARKER_TAG.len()..];
    let name_len = after_tag.bytes().take_while(is_name_byte).count();
    match after_tag.as_bytes().get(name_len) {
        None if at_end => return Step::Malformed { len: s.len() },
        None => return Step::Wait,
        Some(b':') if name_len > 0 => {}
        Some(_) => return malformed_span(s, at_end),
    }

    let name_end = MARKER_TAG.len() + name_len;
    let value_start = name_end + 1;
    let limit = s[value_start..]
        .find(MARKER_TAG)
        .map(|i| value_start + i);
    let bounded = at_end || limit.is_some();
    let window_end = limit.unwrap_or(s.len());
    let window = &s[value_start..window_end];
    let leading = window.trim_start();

    if leading.is_empty() && !bounded {
        return Step::Wait;
    }

    if leading.starts_with('[') {
        let list_close = window
            .match_indices(']')
            .map(|(i, _)| i)
            .find(|&i| extractor::decode_list(&window[..i]).is_some());
        if let Some(i) = list_close {
            return Step::Marker {
                len: value_start + i + 1,
                name_end,
                value_start,
                value_end: value_start + i,
            };
        }
        if !bounded && list_still_possible(leading) {
            return Step::Wait;
        }
    }

    match window.find(']') {
        Some(i) if window[..i].trim().is_empty() => Step::Malformed {
            len: value_start + i + 1,
        },
        Some(i) => Step::Marker {
            len: value_start + i + 1,
            name_end,
            value_start,
            value_end: value_start + i,
        },
        None if bounded => Step::Malformed { len: window_end },
        None => Step::Wait,
    }
}

/// Whether more input could still turn `value` into a list literal: it is a
/// truncated JSON document, or a complete list of scalars awaiting the closer.
fn list_still_possible(value: &str) -> bool {
    let mut values = serde_json::Deserializer::from_str(value).into_iter::<Value>();
    match values.next() {
        Some(Err(err)) => err.is_eof(),
        Some(Ok(Value::Array(_))) => {
            let end = values.byte_offset();
            value[end..].trim().is_empty() && extractor::decode_list(&value[..end]).is_some()
        }
        _ => false,
    }
}

/// Span of a tag whose name is invalid: through its first `]`, or up to the next
/// tag when it never closes.
fn malformed_span(s: &str, at_end: bool) -> Step {
    let body_start = MARKER_TAG.len();
    let limit = s[body_start..].find(MARKER_TAG).map(|i| body_start + i);
    let window_end = limit.unwrap_or(s.len());

    match s[body_start..window_end].find(']') {
        Some(i) => Step::Malformed {
            len: body_start + i + 1,
        },
        None if at_end || limit.is_some() => Step::Malformed { len: window_end },
        None => Step::Wait,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed all fragments, flush, and collect (text, markers, malformed spans).
    fn run(fragments: &[&str]) -> (String, Vec<Marker>, Vec<String>) {
        let mut scanner = MarkerScanner::new();
        let mut text = String::new();
        let mut markers = Vec::new();
        let mut malformed = Vec::new();

        for fragment in fragments {
            for item in scanner.feed(fragment) {
                match item {
                    ScanItem::Text(t) => text.push_str(&t),
                    ScanItem::Marker(m) => markers.push(m),
                    ScanItem::Malformed(span) => malformed.push(span),
                }
            }
        }
        if let Some(rest) = scanner.flush() {
            text.push_str(&rest);
        }
        (text, markers, malformed)
    }

    fn marker(name: &str, raw: &str) -> Marker {
        Marker {
            name: name.to_string(),
            raw_value: raw.to_string(),
        }
    }

    #[test]
    fn plain_text_passes_through_in_order() {
        let fragments = ["Hello", ", ", "world", "! No markers here."];
        let (text, markers, _) = run(&fragments);

        assert_eq!(text, fragments.concat());
        assert!(markers.is_empty());
    }

    #[test]
    fn text_without_brackets_is_released_immediately() {
        let mut scanner = MarkerScanner::new();
        let items = scanner.feed("no brackets");

        assert_eq!(items, vec![ScanItem::Text("no brackets".to_string())]);
        assert!(scanner.pending().is_empty());
    }

    #[test]
    fn markers_split_across_fragments_are_stripped() {
        let (text, markers, _) = run(&[
            "Sure, here: [FIELD:valueProp:Fast shipping]",
            " and call to action [FIELD",
            ":cta:Buy now]!",
        ]);

        assert_eq!(text, "Sure, here:  and call to action !");
        assert_eq!(
            markers,
            vec![marker("valueProp", "Fast shipping"), marker("cta", "Buy now")]
        );
    }

    #[test]
    fn partial_tag_is_held_back_until_resolved() {
        let mut scanner = MarkerScanner::new();

        let items = scanner.feed("before [FIE");
        assert_eq!(items, vec![ScanItem::Text("before ".to_string())]);
        assert_eq!(scanner.pending(), "[FIE");

        let items = scanner.feed("LD:cta:Go]after");
        assert_eq!(
            items,
            vec![
                ScanItem::Marker(marker("cta", "Go")),
                ScanItem::Text("after".to_string()),
            ]
        );
        assert!(scanner.pending().is_empty());
    }

    #[test]
    fn ordinary_brackets_are_plain_text() {
        let (text, markers, _) = run(&["items[0] and [link](url) and [", "x]"]);

        assert_eq!(text, "items[0] and [link](url) and [x]");
        assert!(markers.is_empty());
    }

    #[test]
    fn list_value_with_nested_brackets() {
        let (text, markers, _) = run(&[r#"Pains: [FIELD:painPoints:["slow", "costly"]] done"#]);

        assert_eq!(text, "Pains:  done");
        assert_eq!(markers, vec![marker("painPoints", r#"["slow", "costly"]"#)]);
        assert_eq!(
            markers[0].decode(),
            FieldValue::List(vec!["slow".to_string(), "costly".to_string()])
        );
    }

    #[test]
    fn list_value_containing_closing_bracket_in_string() {
        let (_, markers, _) = run(&[r#"[FIELD:painPoints:["a]b", "c"]]"#]);

        assert_eq!(markers, vec![marker("painPoints", r#"["a]b", "c"]"#)]);
    }

    #[test]
    fn list_value_waits_for_list_close() {
        let mut scanner = MarkerScanner::new();

        assert!(scanner.feed(r#"[FIELD:painPoints:["slow"]"#).is_empty());
        let items = scanner.feed("] tail");

        assert_eq!(
            items,
            vec![
                ScanItem::Marker(marker("painPoints", r#"["slow"]"#)),
                ScanItem::Text(" tail".to_string()),
            ]
        );
    }

    #[test]
    fn bracketed_prose_closes_at_first_bracket_without_waiting() {
        let mut scanner = MarkerScanner::new();

        let items = scanner.feed("[FIELD:offer:[Limited] 50% off] ");
        assert_eq!(
            items,
            vec![
                ScanItem::Marker(marker("offer", "[Limited")),
                ScanItem::Text(" 50% off] ".to_string()),
            ]
        );
        assert_eq!(
            scanner.feed("Hello"),
            vec![ScanItem::Text("Hello".to_string())]
        );
    }

    #[test]
    fn bracketed_prose_is_released_once_it_cannot_be_a_list() {
        let mut scanner = MarkerScanner::new();

        assert!(scanner.feed("[FIELD:offer:[").is_empty());
        assert!(scanner.feed("Lim").is_empty(), "no closer seen yet");
        assert_eq!(
            scanner.feed("ited] now"),
            vec![
                ScanItem::Marker(marker("offer", "[Limited")),
                ScanItem::Text(" now".to_string()),
            ]
        );
    }

    #[test]
    fn complete_list_followed_by_prose_closes_at_first_bracket() {
        let (text, markers, _) = run(&[r#"[FIELD:painPoints:["a"] and more] x"#]);

        assert_eq!(markers, vec![marker("painPoints", r#"["a""#)]);
        assert_eq!(text, r#" and more] x"#);
    }

    #[test]
    fn unterminated_list_string_falls_back_to_first_close_at_end_of_stream() {
        let (text, markers, _) = run(&[r#"[FIELD:painPoints:["a] tail"#]);

        assert_eq!(text, " tail");
        assert!(markers.is_empty(), "flush does not report markers");
        assert_eq!(
            extract_markers(r#"[FIELD:painPoints:["a] tail"#),
            vec![marker("painPoints", r#"["a"#)]
        );
    }

    #[test]
    fn unbalanced_list_value_falls_back_before_next_tag() {
        let (text, markers, _) = run(&["[FIELD:painPoints:[broken] x [FIELD:cta:Go]"]);

        assert_eq!(text, " x ");
        assert_eq!(
            markers,
            vec![marker("painPoints", "[broken"), marker("cta", "Go")]
        );
    }

    #[test]
    fn dangling_marker_is_discarded_on_flush() {
        let (text, markers, _) = run(&["Thanks! [FIELD:cta:Buy no"]);

        assert_eq!(text, "Thanks! ");
        assert!(markers.is_empty());
    }

    #[test]
    fn dangling_partial_tag_is_flushed_as_text() {
        let (text, _, _) = run(&["see [FIE"]);
        assert_eq!(text, "see [FIE");
    }

    #[test]
    fn unterminated_marker_before_next_tag_is_malformed() {
        let (text, markers, malformed) = run(&["a [FIELD:cta:Buy b [FIELD:offer:Half off] c"]);

        assert_eq!(text, "a  c");
        assert_eq!(markers, vec![marker("offer", "Half off")]);
        assert_eq!(malformed, vec!["[FIELD:cta:Buy b ".to_string()]);
    }

    #[test]
    fn invalid_name_is_dropped_as_malformed() {
        let (text, markers, malformed) = run(&["x [FIELD:bad name:v] y"]);

        assert_eq!(text, "x  y");
        assert!(markers.is_empty());
        assert_eq!(malformed, vec!["[FIELD:bad name:v]".to_string()]);
    }

    #[test]
    fn empty_value_is_malformed() {
        let (text, markers, malformed) = run(&["x[FIELD:cta: ]y"]);

        assert_eq!(text, "xy");
        assert!(markers.is_empty());
        assert_eq!(malformed.len(), 1);
    }

    #[test]
    fn unknown_field_names_are_still_markers() {
        let (_, markers, _) = run(&["[FIELD:budget:10k]"]);
        assert_eq!(markers, vec![marker("budget", "10k")]);
    }

    #[test]
    fn tag_text_never_leaks_into_output() {
        let inputs: &[&[&str]] = &[
            &["[FIELD:a:1][FIELD:b:2]"],
            &["[", "F", "I", "E", "L", "D", ":", "a", ":", "1", "]"],
            &["x [FIELD:a:[\"p\", \"q\"]] y [FIELD:b:v]"],
            &["[FIELD:a:unterminated"],
            &["[FIELD:bad-name:x] ok"],
        ];

        for fragments in inputs {
            let mut scanner = MarkerScanner::new();
            for fragment in *fragments {
                for item in scanner.feed(fragment) {
                    if let ScanItem::Text(t) = item {
                        assert!(!t.contains(MARKER_TAG), "leaked in {fragments:?}: {t}");
                    }
                }
            }
            if let Some(rest) = scanner.flush() {
                assert!(!rest.contains(MARKER_TAG), "leaked on flush: {rest}");
            }
        }
    }

    #[test]
    fn every_split_point_matches_single_feed() {
        let streams = [
            "Sure, here: [FIELD:valueProp:Fast shipping] and call to action [FIELD:cta:Buy now]!",
            r#"Pains [FIELD:painPoints:["slow", "co]stly"]] then [x] and [FIELD:cta:Go] [FIE"#,
            "a [FIELD:cta:Buy b [FIELD:offer:Half off] c [FIELD:bad!:z] d",
            "café [FIELD:tone:Ünïcode ☕] fin [FIELD:painPoints:[broken] end",
            r#"[FIELD:offer:[Limited] 50% off] then [FIELD:painPoints:["x"] y] [FIELD:cta:["z"]"#,
        ];

        for stream in streams {
            let expected = run(&[stream]);
            for (split, _) in stream.char_indices().skip(1) {
                let (head, tail) = stream.split_at(split);
                assert_eq!(run(&[head, tail]), expected, "split at {split} of {stream:?}");
            }
        }
    }

    #[test]
    fn single_character_fragments_match_single_feed() {
        let stream = r#"Hi [FIELD:valueProp:Speed] and [FIELD:painPoints:["a", "b"]] bye"#;
        let chars: Vec<String> = stream.chars().map(String::from).collect();
        let fragments: Vec<&str> = chars.iter().map(String::as_str).collect();

        assert_eq!(run(&fragments), run(&[stream]));
    }

    #[test]
    fn extract_markers_finds_all_markers() {
        let markers = extract_markers(
            "[FIELD:valueProp:Fast] text [FIELD:painPoints:[\"a\"]] more [FIELD:cta:Go]",
        );

        let names: Vec<&str> = markers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["valueProp", "painPoints", "cta"]);
    }
}
