//! Resolves whatever construct was left suspended by the previous chunk,
//! using the freshly extended buffer, before the main tokenizer loop runs.
//!
//! Mirrors, at the granularity of one suspended construct, the
//! rewind-and-retry discipline the teacher's `base_class_next_token` applies
//! at the granularity of a whole token.

use crate::context::ParserContext;
use crate::incomplete_state::IncompleteState;
use crate::options::Options;
use crate::reparse_hint::ReparseHint;
use crate::tokenizer;

/// Tries to resolve `ctx.incomplete`, if any. Returns whether the main
/// tokenizer loop should still run afterward: `true` when the suspended
/// construct resolved (or was re-armed for the main loop's own dispatch to
/// retry), `false` when it's still pending and nothing else in this chunk
/// is left to scan.
pub(crate) fn resume(ctx: &mut ParserContext, opts: &Options) -> bool {
    let Some(state) = ctx.incomplete.take() else {
        return true;
    };

    match state {
        IncompleteState::TagStart => {
            if ctx.buffer.len() > ctx.cursor + 1 {
                true
            } else {
                ctx.incomplete = Some(IncompleteState::TagStart);
                false
            }
        }

        // The `<`/marker prefix is still sitting at `ctx.cursor` (it was
        // never advanced past), so re-entering the main loop at the same
        // position re-derives the same marker and retries the search for
        // its close over the now-longer buffer — no bespoke resume logic
        // needed for any of these three.
        IncompleteState::Comment | IncompleteState::Doctype | IncompleteState::XmlDecl => true,

        IncompleteState::Cdata { sink } => tokenizer::process_cdata_delta(ctx, opts, sink),

        IncompleteState::OpeningTag { sink, provisional } | IncompleteState::ClosingTag { sink, provisional } => {
            // Cursor is already parked at the start of the tag fragment
            // (buffer compaction never drops bytes at or after it), so
            // there's no offset to restore. Publishing the hint lets the
            // tag handler retract the provisional preview exactly once a
            // real tag (or renewed suspension) is recognized.
            ctx.reparse_hint = Some(ReparseHint::new(sink, provisional));
            true
        }

        IncompleteState::StopNodeContent { tag_name, depth, sink } => {
            tokenizer::scan_stop_node_delta(ctx, opts, tag_name, depth, sink)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::{AccumulatorItem, Value};

    fn run_chunk(ctx: &mut ParserContext, opts: &Options, chunk: &str) {
        ctx.buffer.push_str(chunk);
        let should_run = resume(ctx, opts);
        if should_run {
            tokenizer::run(ctx, opts);
        }
    }

    #[test]
    fn resumes_a_comment_split_across_chunks() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "before<!-- unfinished");
        assert!(matches!(ctx.incomplete, Some(IncompleteState::Comment)));
        run_chunk(&mut ctx, &opts, " comment -->after");
        assert!(ctx.incomplete.is_none());
        match &ctx.accumulator[..] {
            [AccumulatorItem::Leaf(Value::String(a)), AccumulatorItem::Leaf(Value::String(b))] => {
                assert_eq!(a, "before");
                assert_eq!(b, "after");
            }
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }

    #[test]
    fn resumes_an_opening_tag_split_mid_attribute() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "<item id=\"1");
        assert!(matches!(ctx.incomplete, Some(IncompleteState::OpeningTag { .. })));
        run_chunk(&mut ctx, &opts, "23\">hi</item>");
        assert!(ctx.incomplete.is_none());
        assert!(ctx.open_stack.is_empty());
        match &ctx.accumulator[0] {
            AccumulatorItem::Element { tag, value: Value::Node(id) } => {
                assert_eq!(&**tag, "item");
                let node = ctx.arena.get(*id);
                assert_eq!(node.get("@id"), Some(&Value::String("123".into())));
                assert_eq!(node.get("#text"), Some(&Value::String("hi".into())));
            }
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }

    #[test]
    fn opening_tag_that_never_completes_keeps_its_provisional_text() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "<item id=\"1");
        run_chunk(&mut ctx, &opts, "23");
        match &ctx.accumulator[0] {
            AccumulatorItem::Leaf(Value::String(s)) => assert_eq!(s, "<item id=\"123"),
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }

    #[test]
    fn resumes_a_stop_node_closer_split_across_chunks() {
        let opts = Options::default().with_stop_nodes(["script"]);
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "<script>var x = 1; </scri");
        assert!(matches!(ctx.incomplete, Some(IncompleteState::StopNodeContent { .. })));
        run_chunk(&mut ctx, &opts, "pt>tail");
        assert!(ctx.incomplete.is_none());
        match &ctx.accumulator[0] {
            AccumulatorItem::Element { value: crate::tree::Value::Node(id), .. } => {
                let node = ctx.arena.get(*id);
                assert_eq!(node.get("#text"), Some(&Value::String("var x = 1; ".into())));
            }
            other => panic!("unexpected accumulator state: {other:?}"),
        }
        match &ctx.accumulator[1] {
            AccumulatorItem::Leaf(Value::String(s)) => assert_eq!(s, "tail"),
            other => panic!("unexpected trailing accumulator state: {other:?}"),
        }
    }

    #[test]
    fn resumes_a_cdata_section_split_across_chunks() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "<a><![CDATA[one two ]");
        assert!(matches!(ctx.incomplete, Some(IncompleteState::Cdata { .. })));
        run_chunk(&mut ctx, &opts, "] three]]></a>");
        assert!(ctx.incomplete.is_none());
        match &ctx.accumulator[0] {
            AccumulatorItem::Element { value: crate::tree::Value::Node(id), .. } => {
                let node = ctx.arena.get(*id);
                assert_eq!(node.get("#text"), Some(&Value::String("one two ]] three".into())));
            }
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }

    #[test]
    fn bare_lt_at_chunk_end_stays_pending_until_a_byte_follows() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        ctx.buffer.push_str("text<");
        let should_run = resume(&mut ctx, &opts);
        assert!(should_run);
        tokenizer::run(&mut ctx, &opts);
        assert!(matches!(ctx.incomplete, Some(IncompleteState::TagStart)));
        assert_eq!(ctx.cursor, 4);
    }

    #[test]
    fn resumes_a_bare_lt_once_a_tag_name_byte_arrives() {
        let opts = Options::default();
        let mut ctx = ParserContext::new();
        run_chunk(&mut ctx, &opts, "text<");
        run_chunk(&mut ctx, &opts, "b>more</b>");
        assert!(ctx.incomplete.is_none());
        assert!(ctx.open_stack.is_empty());
        match &ctx.accumulator[..] {
            [AccumulatorItem::Leaf(Value::String(s)), AccumulatorItem::Element { tag, value: Value::Node(id) }] => {
                assert_eq!(s, "text");
                assert_eq!(&**tag, "b");
                assert_eq!(ctx.arena.get(*id).get("#text"), Some(&Value::String("more".into())));
            }
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }
}
