//! A lenient, incremental parser for XML-like markup streamed in chunks.
//!
//! [`Parser`] is the only type most callers need: construct one with an
//! [`Options`], feed it successive chunks of a document via
//! [`Parser::parse_stream`], and read back a [`ParseResult`] snapshot of
//! everything parsed so far after each call. Chunk boundaries may split any
//! construct — a tag, an attribute, a comment, CDATA — and the parser
//! carries whatever state is needed to resume correctly on the next call.
//! The markup itself need only be loosely well-formed: unbalanced or
//! interleaved tags are absorbed as literal text rather than rejected. See
//! the crate's design notes for the full data model and component design.

mod attributes;
mod context;
mod driver;
mod errors;
mod incomplete_state;
mod macros;
mod options;
mod reparse_hint;
mod resumer;
mod serializer;
mod stop_nodes;
mod str_fns;
mod tokenizer;
mod tree;

pub use errors::ParseError;
pub use options::Options;
pub use serializer::serialize;
pub use tree::{XmlItem, XmlNode, XmlValue};

use context::{ParserContext, RootDecision};

/// One chunk of input accepted by [`Parser::parse_stream`]: ordinary text, or
/// the `Eof` sentinel that flushes the session.
///
/// Rust's static typing already rules out the "caller passed something
/// unconvertible" failure mode [`ParseError::InvalidChunkType`] exists for in
/// a dynamically-typed counterpart — only types with a `Chunk` conversion
/// compile at all — but the error variant and the `Result`-returning
/// `parse_stream` signature are kept for parity with that contract and in
/// case a future conversion (e.g. from raw bytes) needs to reject input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Str(String),
    Eof,
}

impl From<&str> for Chunk {
    fn from(s: &str) -> Self {
        Chunk::Str(s.to_string())
    }
}

impl From<String> for Chunk {
    fn from(s: String) -> Self {
        Chunk::Str(s)
    }
}

impl From<&String> for Chunk {
    fn from(s: &String) -> Self {
        Chunk::Str(s.clone())
    }
}

impl From<Option<&str>> for Chunk {
    fn from(s: Option<&str>) -> Self {
        match s {
            Some(s) => Chunk::Str(s.to_string()),
            None => Chunk::Eof,
        }
    }
}

impl Chunk {
    /// Builds a chunk from any `Display`-able value, for callers whose
    /// generator hands back an object rather than a bare string (the
    /// "stringifiable object" input the data model allows).
    pub fn from_display(value: impl std::fmt::Display) -> Chunk {
        Chunk::Str(value.to_string())
    }
}

/// The snapshot [`Parser::parse_stream`] returns after every chunk: the
/// document parsed so far, and whether more input may still be needed to
/// complete it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    /// `true` if the stack is non-empty, a construct was left suspended, the
    /// residual buffer still holds unprocessed bytes, or the root gate is
    /// still undecided. `false` only once none of those hold.
    pub partial: bool,
    /// The accumulator materialized into owned, arena-free values: `None`
    /// only when nothing has ever been seen and no partial structure
    /// remains; otherwise `Some`, possibly an empty list.
    pub xml: Option<Vec<XmlItem>>,
}

/// A streaming parser session.
///
/// Not [`Sync`] by design (see the crate's concurrency notes): a single
/// `Parser` owns one [`ParserContext`] and is meant to be driven by one
/// caller feeding it chunks in order. Feeding [`Chunk::Eof`] flushes the
/// session and resets it in place, ready for a fresh stream without
/// constructing a new `Parser`.
#[derive(Debug)]
pub struct Parser {
    options: Options,
    ctx: ParserContext,
}

impl Parser {
    pub fn new(options: Options) -> Self {
        Self { options, ctx: ParserContext::new() }
    }

    /// Feeds the next chunk and returns a snapshot of the document parsed so
    /// far. Feeding [`Chunk::Eof`] (equivalently, `None`) flushes the
    /// session: the returned result reflects final state, and the session is
    /// then reset in place for a new stream.
    pub fn parse_stream(&mut self, chunk: impl Into<Chunk>) -> Result<ParseResult, ParseError> {
        match chunk.into() {
            Chunk::Str(s) => {
                let partial = driver::feed(&mut self.ctx, &self.options, Some(&s));
                Ok(self.snapshot(partial))
            }
            Chunk::Eof => {
                let partial = driver::feed(&mut self.ctx, &self.options, None);
                let result = self.snapshot(partial);
                self.ctx = ParserContext::new();
                Ok(result)
            }
        }
    }

    fn snapshot(&self, partial: bool) -> ParseResult {
        let xml = if self.ctx.root_decision == Some(RootDecision::PlainText) {
            Some(vec![XmlItem::Leaf(XmlValue::String(self.ctx.root_passthrough.clone()))])
        } else if self.ctx.accumulator.is_empty() {
            if partial {
                Some(Vec::new())
            } else {
                None
            }
        } else {
            Some(tree::materialize_accumulator(
                &self.ctx.arena,
                &self.ctx.accumulator,
                &self.options.text_node_name,
                self.options.parse_primitives,
            ))
        };
        ParseResult { partial, xml }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_document_scenario() {
        let mut parser = Parser::default();
        parser.parse_stream(r#"<root><item id="1">Text1</item><item id="2">Text2</item></root>"#).unwrap();
        let result = parser.parse_stream(None).unwrap();
        assert!(!result.partial);
        let serialized = serialize(&result.xml.unwrap(), &Options::default());
        assert_eq!(
            serialized,
            r#"<root><item id="1">Text1</item><item id="2">Text2</item></root>"#
        );
    }

    #[test]
    fn chunked_tag_scenario() {
        let mut parser = Parser::default();
        let first = parser.parse_stream("<ro").unwrap();
        assert!(first.partial);
        let second = parser.parse_stream("ot>hi</root>").unwrap();
        assert!(!second.partial);
        match second.xml.unwrap().as_slice() {
            [XmlItem::Element { tag, value: XmlValue::Node(node) }] => {
                assert_eq!(&**tag, "root");
                assert_eq!(node.get("#text"), Some(&XmlValue::String("hi".into())));
            }
            other => panic!("unexpected xml: {other:?}"),
        }
    }

    #[test]
    fn interleaved_tags_scenario() {
        let mut parser = Parser::default();
        parser.parse_stream("<a><b></a></b>").unwrap();
        let result = parser.parse_stream(None).unwrap();
        assert!(!result.partial);
        match result.xml.unwrap().as_slice() {
            [XmlItem::Element { tag, value: XmlValue::Node(node) }, XmlItem::Leaf(XmlValue::String(tail))] => {
                assert_eq!(&**tag, "a");
                assert_eq!(node.get("#text"), Some(&XmlValue::String("<b>".into())));
                assert_eq!(tail, "</b>");
            }
            other => panic!("unexpected xml: {other:?}"),
        }
    }

    #[test]
    fn stop_node_scenario() {
        let opts = Options::default().with_stop_nodes(["script"]);
        let mut parser = Parser::new(opts);
        parser.parse_stream("<root><script>if (a<b) x()</script>y</root>").unwrap();
        let result = parser.parse_stream(None).unwrap();
        assert!(!result.partial);
        match result.xml.unwrap().as_slice() {
            [XmlItem::Element { tag, value: XmlValue::Node(root) }] => {
                assert_eq!(&**tag, "root");
                match root.get("script") {
                    Some(XmlValue::Node(script)) => {
                        assert_eq!(script.get("#text"), Some(&XmlValue::String("if (a<b) x()".into())));
                    }
                    other => panic!("expected script node, got {other:?}"),
                }
                assert_eq!(root.get("#text"), Some(&XmlValue::String("y".into())));
            }
            other => panic!("unexpected xml: {other:?}"),
        }
    }

    #[test]
    fn cdata_split_across_chunks_scenario() {
        let mut parser = Parser::default();
        let first = parser.parse_stream("<r><![CDATA[hel").unwrap();
        assert!(first.partial);
        match first.xml.unwrap().as_slice() {
            [XmlItem::Element { value: XmlValue::Node(node), .. }] => {
                assert_eq!(node.get("#text"), Some(&XmlValue::String("hel".into())));
            }
            other => panic!("unexpected xml after first chunk: {other:?}"),
        }
        parser.parse_stream("lo]]></r>").unwrap();
        let result = parser.parse_stream(None).unwrap();
        assert!(!result.partial);
        match result.xml.unwrap().as_slice() {
            [XmlItem::Element { value: XmlValue::Node(node), .. }] => {
                assert_eq!(node.get("#text"), Some(&XmlValue::String("hello".into())));
            }
            other => panic!("unexpected final xml: {other:?}"),
        }
    }

    #[test]
    fn root_gate_scenario() {
        let opts = Options::default().with_allowed_root_nodes(["data"]);
        let mut parser = Parser::new(opts);
        let first = parser.parse_stream("hello world").unwrap();
        assert!(first.partial);
        assert_eq!(first.xml, Some(vec![XmlItem::Leaf(XmlValue::String("hello world".into()))]));
        let result = parser.parse_stream(None).unwrap();
        assert!(!result.partial);
        assert_eq!(result.xml, Some(vec![XmlItem::Leaf(XmlValue::String("hello world".into()))]));
    }

    #[test]
    fn flush_resets_the_session_for_a_new_stream() {
        let mut parser = Parser::default();
        parser.parse_stream("<a>one</a>").unwrap();
        parser.parse_stream(None).unwrap();
        parser.parse_stream("<b>two</b>").unwrap();
        let result = parser.parse_stream(None).unwrap();
        match result.xml.unwrap().as_slice() {
            [XmlItem::Element { tag, value: XmlValue::Node(node) }] => {
                assert_eq!(&**tag, "b");
                assert_eq!(node.get("#text"), Some(&XmlValue::String("two".into())));
            }
            other => panic!("unexpected xml after reset: {other:?}"),
        }
    }

    #[test]
    fn empty_string_chunk_is_a_no_op() {
        let mut parser = Parser::default();
        let result = parser.parse_stream("").unwrap();
        assert!(!result.partial);
        assert_eq!(result.xml, None);
    }
}
