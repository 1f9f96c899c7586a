//! The forward scan over the residual buffer that recognizes text runs,
//! tags, and the special `<?...?>`/`<!--...-->`/`<![CDATA[...]]>`/`<!DOCTYPE
//! ...>` constructs, folding each directly into the tree as it's recognized
//! rather than producing a token stream for a caller to walk.
//!
//! Mirrors the teacher's `base_class_next_token`/`parse_next_tag` dispatch,
//! generalized from "produce one token and stop" to "produce one token and
//! fold it into the tree immediately".

use crate::attributes::parse_attributes;
use crate::context::{ParserContext, StackFrame};
use crate::incomplete_state::IncompleteState;
use crate::options::Options;
use crate::stop_nodes::{is_stop_node, ScanOutcome};
use crate::str_fns::strpos;
use crate::tree::{add_value_to_node, AccumulatorItem, NodeId, TextSink, Value};
use crate::macros::strcspn;

/// Runs the dispatch loop from `ctx.cursor` to the end of `ctx.buffer`,
/// stopping early (cursor left wherever it landed) the moment a construct
/// can't be completed with the bytes on hand.
pub(crate) fn run(ctx: &mut ParserContext, opts: &Options) {
    loop {
        if ctx.cursor >= ctx.buffer.len() {
            return;
        }
        let progressed = if ctx.buffer.as_bytes()[ctx.cursor] == b'<' {
            handle_lt(ctx, opts)
        } else {
            handle_text_run(ctx, opts)
        };
        if !progressed {
            return;
        }
    }
}

fn is_tag_name_boundary(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')
}

/// Finds the `>` that closes a tag starting at `start`, skipping over any
/// `>` that falls inside a single- or double-quoted attribute value.
fn find_unquoted_gt(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Whether `text` ends in a byte span that could still grow into a complete
/// entity reference (`&amp;`, `&#60;`, ...) if more bytes arrive. Named
/// entities top out at five characters (`apos;`) and numeric ones are
/// bounded loosely at 16 to avoid scanning back across an entire chunk of
/// ordinary text looking for a lone `&`.
fn trailing_entity_candidate_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let Some(amp_at) = bytes.iter().rposition(|&b| b == b'&') else {
        return 0;
    };
    let candidate = &bytes[amp_at..];
    if candidate.contains(&b';') || candidate.len() > 16 {
        return 0;
    }
    if candidate[1..].iter().all(|&b| b.is_ascii_alphanumeric() || b == b'#') {
        candidate.len()
    } else {
        0
    }
}

/// Entity decodes `raw` and inserts it under the current pointer's text key
/// (or the accumulator at root), suppressing whitespace-only root-level
/// runs when `ignore_whitespace` is set.
///
/// `parse_primitives` is deliberately *not* applied here: coercing a text
/// run the moment it's seen would break chunk-boundary idempotence (a
/// number like `"123"` split as `"12"` + `"3"` would coerce to two
/// `Value::Number`s that can't concatenate, instead of one `123`).
/// Coercion is applied once, at snapshot time, over whatever text has fully
/// accumulated under the text key — see `tree::materialize_value`.
pub(crate) fn insert_text(ctx: &mut ParserContext, opts: &Options, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let decoded = xml_entities::decode_xml_entities(raw);
    if ctx.open_stack.is_empty() && opts.ignore_whitespace && decoded.trim().is_empty() {
        return;
    }
    let sink = current_sink(ctx, opts);
    crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, &decoded, &opts.text_node_name);
}

pub(crate) fn current_sink(ctx: &ParserContext, opts: &Options) -> TextSink {
    match ctx.current_parent() {
        Some(node) => TextSink::Node { node, key: opts.text_node_name.clone() },
        None => TextSink::Accumulator,
    }
}

fn handle_text_run(ctx: &mut ParserContext, opts: &Options) -> bool {
    let from = ctx.cursor;
    let bytes = ctx.buffer.as_bytes();
    let (scan_end, hit_lt) = match memchr::memchr(b'<', &bytes[from..]) {
        Some(rel) => (from + rel, true),
        None => (bytes.len(), false),
    };
    let holdback = if hit_lt {
        0
    } else {
        trailing_entity_candidate_len(&ctx.buffer[from..scan_end])
    };
    let consume_end = scan_end - holdback;
    let text: Box<str> = ctx.buffer[from..consume_end].into();
    insert_text(ctx, opts, &text);
    ctx.cursor = consume_end;
    ctx.incomplete = None;
    hit_lt || holdback == 0
}

fn handle_lt(ctx: &mut ParserContext, opts: &Options) -> bool {
    let rest = &ctx.buffer[ctx.cursor..];
    if rest.len() < 2 || (rest.len() < 9 && is_prefix_of_special(rest)) {
        tracing::trace!("ambiguous tag-start prefix, awaiting more bytes");
        ctx.incomplete = Some(IncompleteState::TagStart);
        return false;
    }
    if rest.starts_with("<?xml") {
        return handle_marker_construct(ctx, "<?xml", "?>", IncompleteState::XmlDecl);
    }
    if rest.starts_with("<!--") {
        return handle_marker_construct(ctx, "<!--", "-->", IncompleteState::Comment);
    }
    if rest.starts_with("<![CDATA[") {
        return handle_cdata_start(ctx, opts);
    }
    if rest.len() >= 9 && rest.as_bytes()[..9].eq_ignore_ascii_case(b"<!DOCTYPE") {
        return handle_marker_construct(ctx, "<!DOCTYPE", ">", IncompleteState::Doctype);
    }
    handle_generic_tag(ctx, opts)
}

fn is_prefix_of_special(rest: &str) -> bool {
    const MARKERS: [&str; 4] = ["<?xml", "<!--", "<![CDATA[", "<!DOCTYPE"];
    MARKERS.iter().any(|marker| {
        rest.len() < marker.len() && marker.as_bytes()[..rest.len()].eq_ignore_ascii_case(rest.as_bytes())
    })
}

fn handle_marker_construct(ctx: &mut ParserContext, open_marker: &str, close_marker: &str, state: IncompleteState) -> bool {
    let start = ctx.cursor;
    let search_from = start + open_marker.len();
    match strpos(ctx.buffer.as_bytes(), close_marker.as_bytes(), search_from) {
        Some(pos) => {
            ctx.cursor = pos + close_marker.len();
            ctx.incomplete = None;
            true
        }
        None => {
            tracing::trace!(marker = open_marker, "suspending pending closing marker");
            ctx.incomplete = Some(state);
            false
        }
    }
}

fn handle_cdata_start(ctx: &mut ParserContext, opts: &Options) -> bool {
    const MARKER_LEN: usize = "<![CDATA[".len();
    ctx.cursor += MARKER_LEN;
    let sink = current_sink(ctx, opts);
    process_cdata_delta(ctx, opts, sink)
}

/// Whether the as-yet-unmatched tail of a CDATA delta could be the start of
/// the closing `]]>` marker, and so must be held back rather than appended
/// now: appending it and then seeing the rest of the marker arrive next
/// chunk would otherwise require tracking a separate "already delivered"
/// buffer to avoid double-counting. Holding back 0–2 bytes and always
/// re-scanning from the residual buffer's start (which the held-back bytes
/// remain part of) makes the provisional text already written the only copy
/// that ever exists.
fn cdata_safe_holdback(bytes: &[u8]) -> usize {
    if bytes.ends_with(b"]]") {
        2
    } else if bytes.ends_with(b"]") {
        1
    } else {
        0
    }
}

pub(crate) fn process_cdata_delta(ctx: &mut ParserContext, opts: &Options, sink: TextSink) -> bool {
    let start = ctx.cursor;
    let region: Box<str> = ctx.buffer[start..].into();
    match strpos(region.as_bytes(), b"]]>", 0) {
        Some(rel) => {
            let content = &region[..rel];
            crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, content, &opts.text_node_name);
            ctx.cursor = start + rel + 3;
            ctx.incomplete = None;
            true
        }
        None => {
            let holdback = cdata_safe_holdback(region.as_bytes());
            let consume_end = region.len() - holdback;
            let delta = &region[..consume_end];
            if !delta.is_empty() {
                crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, delta, &opts.text_node_name);
            }
            ctx.cursor = start + consume_end;
            ctx.incomplete = Some(IncompleteState::Cdata { sink });
            false
        }
    }
}

fn retract_hint_if_matches_current(ctx: &mut ParserContext, opts: &Options) {
    let Some(hint) = ctx.reparse_hint.take() else {
        return;
    };
    let sink = current_sink(ctx, opts);
    if hint.sink == sink {
        crate::tree::retract_text(&mut ctx.arena, &mut ctx.accumulator, &hint.sink, &hint.fragment);
    }
}

fn handle_generic_tag(ctx: &mut ParserContext, opts: &Options) -> bool {
    let start = ctx.cursor;
    let is_closing = ctx.buffer.as_bytes().get(start + 1) == Some(&b'/');
    let scan_from = start + if is_closing { 2 } else { 1 };

    match find_unquoted_gt(ctx.buffer.as_bytes(), scan_from) {
        None => suspend_tag_fragment(ctx, opts, start, is_closing),
        Some(gt) => {
            if is_closing {
                complete_closing_tag(ctx, opts, start, gt)
            } else {
                complete_opening_tag(ctx, opts, start, gt)
            }
        }
    }
}

fn suspend_tag_fragment(ctx: &mut ParserContext, opts: &Options, start: usize, is_closing: bool) -> bool {
    let fragment: Box<str> = ctx.buffer[start..].into();
    let sink = current_sink(ctx, opts);

    if let Some(hint) = ctx.reparse_hint.take() {
        if hint.sink == sink {
            crate::tree::retract_text(&mut ctx.arena, &mut ctx.accumulator, &sink, &hint.fragment);
        }
    }

    crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, &fragment, &opts.text_node_name);
    // Cursor stays parked at `start`, not advanced past the fragment: buffer
    // compaction at the end of the chunk only drops bytes before the
    // cursor, so leaving it here keeps the whole unresolved tag in the
    // residual buffer for the resumer to rescan once more bytes arrive.
    ctx.cursor = start;
    ctx.incomplete = Some(if is_closing {
        IncompleteState::ClosingTag { sink, provisional: fragment }
    } else {
        IncompleteState::OpeningTag { sink, provisional: fragment }
    });
    tracing::trace!(is_closing, "suspending tag fragment awaiting '>'");
    false
}

/// Bounds a malformed `<...>` construct the same way a suspended one would —
/// up to the next `<` or buffer end — and inserts it as literal text. Used
/// both for shapes that are malformed outright (bad name, junk before `>`)
/// and, via `handle_generic_tag`'s depth-demotion caller, for tags pushed
/// past `max_depth`.
fn fallback_literal_text(ctx: &mut ParserContext, opts: &Options, start: usize) -> bool {
    let bytes = ctx.buffer.as_bytes();
    let end = match memchr::memchr(b'<', &bytes[start + 1..]) {
        Some(rel) => start + 1 + rel,
        None => bytes.len(),
    };
    let literal: Box<str> = ctx.buffer[start..end].into();
    insert_text(ctx, opts, &literal);
    ctx.cursor = end;
    ctx.incomplete = None;
    true
}

fn complete_closing_tag(ctx: &mut ParserContext, opts: &Options, start: usize, gt: usize) -> bool {
    let bytes = ctx.buffer.as_bytes();
    let name_start = start + 2;
    let name_len = strcspn!(bytes, b if is_tag_name_boundary(b), name_start);
    let trailing_ok = name_len > 0
        && bytes[name_start + name_len..gt].iter().all(|b| b.is_ascii_whitespace());

    if !trailing_ok {
        return fallback_literal_text(ctx, opts, start);
    }

    let tag_name: Box<str> = ctx.buffer[name_start..name_start + name_len].into();
    retract_hint_if_matches_current(ctx, opts);

    match ctx.open_stack.iter().rposition(|frame| frame.tag_name == tag_name) {
        None => {
            tracing::trace!(tag = %tag_name, "dangling closing tag absorbed as text");
            let token: Box<str> = ctx.buffer[start..=gt].into();
            let sink = current_sink(ctx, opts);
            crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, &token, &opts.text_node_name);
            ctx.mark_current_not_text_only();
            ctx.cursor = gt + 1;
            ctx.incomplete = None;
            true
        }
        Some(k) => {
            close_stack_down_to(ctx, opts, k);
            ctx.cursor = gt + 1;
            ctx.incomplete = None;
            true
        }
    }
}

/// Closes every frame down to and including `k`, recovering any frames
/// opened above it that never closed properly (an interleaved-tag case like
/// `<a><b></a></b>`): among those interrupted frames, only the innermost
/// occurrence of each distinct tag name is recovered — its (empty, or just
/// reattached) node is detached from its parent and the literal opening tag
/// text (`<b>`) is re-injected as text in its place. Shadowed duplicates
/// above it are simply dropped along with the rest of the stack.
fn close_stack_down_to(ctx: &mut ParserContext, opts: &Options, k: usize) {
    let mut seen_tags: Vec<Box<str>> = Vec::new();
    let mut kept: Vec<usize> = Vec::new();
    for i in (k + 1..ctx.open_stack.len()).rev() {
        let tag = ctx.open_stack[i].tag_name.clone();
        if !seen_tags.contains(&tag) {
            seen_tags.push(tag);
            kept.push(i);
        }
    }
    kept.sort_unstable();

    for i in kept {
        recover_interrupted_frame(ctx, opts, i);
    }

    let mut closed = None;
    while ctx.open_stack.len() > k {
        closed = ctx.open_stack.pop();
    }
    let closed = closed.expect("k is a valid index, so at least one frame is popped");
    maybe_collapse_text_only(ctx, opts, closed);
}

fn recover_interrupted_frame(ctx: &mut ParserContext, opts: &Options, i: usize) {
    let frame = ctx.open_stack[i].clone();
    let parent_id = ctx.open_stack[i - 1].node;

    let remove = match ctx.arena.get(parent_id).get(&frame.tag_name) {
        Some(Value::Node(id)) if *id == frame.node => true,
        _ => ctx.arena.get(frame.node).is_empty(),
    };
    if remove {
        ctx.arena.get_mut(parent_id).remove(&frame.tag_name);
    }

    let reinjected = format!("<{}>", frame.tag_name);
    add_value_to_node(&mut ctx.arena, parent_id, &opts.text_node_name, Value::String(reinjected), &opts.text_node_name);
    if let Some(parent_frame) = ctx.open_stack.get_mut(i - 1) {
        parent_frame.text_only = false;
    }
}

fn maybe_collapse_text_only(ctx: &mut ParserContext, opts: &Options, frame: StackFrame) {
    if opts.always_create_text_node || !frame.text_only {
        return;
    }
    let Some(only_key) = ctx.arena.get(frame.node).only_key() else {
        return;
    };
    if only_key != &*opts.text_node_name {
        return;
    }
    let text_value = ctx
        .arena
        .get_mut(frame.node)
        .remove(&opts.text_node_name)
        .expect("only_key just confirmed this key exists");
    replace_node_value(ctx, frame.node, text_value);
}

fn replace_node_value(ctx: &mut ParserContext, node_id: NodeId, replacement: Value) {
    match ctx.current_parent() {
        Some(parent) => {
            for (_, value) in ctx.arena.get_mut(parent).entries_mut() {
                replace_matching(value, node_id, &replacement);
            }
        }
        None => {
            for item in ctx.accumulator.iter_mut() {
                if let AccumulatorItem::Element { value, .. } = item {
                    replace_matching(value, node_id, &replacement);
                }
            }
        }
    }
}

fn replace_matching(value: &mut Value, node_id: NodeId, replacement: &Value) {
    match value {
        Value::Node(id) if *id == node_id => *value = replacement.clone(),
        Value::List(items) => {
            for item in items {
                replace_matching(item, node_id, replacement);
            }
        }
        _ => {}
    }
}

fn attach_element(ctx: &mut ParserContext, opts: &Options, tag_name: &str, node_id: NodeId) {
    match ctx.current_parent() {
        Some(parent) => {
            add_value_to_node(&mut ctx.arena, parent, tag_name, Value::Node(node_id), &opts.text_node_name);
            ctx.mark_current_not_text_only();
        }
        None => ctx.accumulator.push(AccumulatorItem::Element { tag: tag_name.into(), value: Value::Node(node_id) }),
    }
}

fn complete_opening_tag(ctx: &mut ParserContext, opts: &Options, start: usize, gt: usize) -> bool {
    let bytes = ctx.buffer.as_bytes();
    let name_start = start + 1;
    let name_len = strcspn!(bytes, b if is_tag_name_boundary(b), name_start);
    if name_len == 0 {
        return fallback_literal_text(ctx, opts, start);
    }

    let tag_name: Box<str> = ctx.buffer[name_start..name_start + name_len].into();
    let self_closing = gt > name_start + name_len && bytes[gt - 1] == b'/';
    let attrs_end = if self_closing { gt - 1 } else { gt };
    let attrs_region: Box<str> = ctx.buffer[name_start + name_len..attrs_end].into();

    retract_hint_if_matches_current(ctx, opts);

    if !self_closing && opts.max_depth.is_some_and(|max| ctx.open_stack.len() >= max) {
        tracing::trace!(tag = %tag_name, depth = ctx.open_stack.len(), "max_depth exceeded, demoting to text");
        return fallback_literal_text_for_demoted_tag(ctx, opts, start, gt);
    }

    let mut path_with_self: Vec<&str> = ctx.open_stack.iter().map(|f| &*f.tag_name).collect();
    path_with_self.push(&tag_name);
    let stop_node = !self_closing && is_stop_node(&opts.stop_nodes, &path_with_self);

    let attrs = parse_attributes(&attrs_region, opts.parse_primitives);
    let node_id = ctx.arena.alloc();
    for (key, value) in attrs {
        let prefixed = format!("{}{}", opts.attribute_name_prefix, key);
        ctx.arena.get_mut(node_id).push(&prefixed, value);
    }
    attach_element(ctx, opts, &tag_name, node_id);

    if stop_node {
        tracing::debug!(tag = %tag_name, "entering stop node");
        ctx.cursor = gt + 1;
        let sink = TextSink::Node { node: node_id, key: opts.text_node_name.clone() };
        return scan_stop_node_delta(ctx, opts, tag_name, 1, sink);
    }

    if !self_closing {
        ctx.open_stack.push(StackFrame { tag_name, node: node_id, text_only: true });
    }
    ctx.cursor = gt + 1;
    ctx.incomplete = None;
    true
}

fn fallback_literal_text_for_demoted_tag(ctx: &mut ParserContext, opts: &Options, start: usize, gt: usize) -> bool {
    let literal: Box<str> = ctx.buffer[start..=gt].into();
    insert_text(ctx, opts, &literal);
    ctx.cursor = gt + 1;
    ctx.incomplete = None;
    true
}

/// Whether the unmatched tail of a stop-node delta could still grow into a
/// same-tag-name open/close or a skipped comment/CDATA marker — held back
/// from the text append the same way [`cdata_safe_holdback`] holds back a
/// possible split `]]>`, so the regex scan always sees a marker whole rather
/// than split across two chunks.
fn stop_node_safe_holdback(delta: &str, tag_name: &str) -> usize {
    let bytes = delta.as_bytes();
    let Some(lt_at) = bytes.iter().rposition(|&b| b == b'<') else {
        return 0;
    };
    let tail = &delta[lt_at..];
    let open_tag = format!("<{tag_name}");
    let close_tag = format!("</{tag_name}");
    let candidates = [open_tag.as_str(), close_tag.as_str(), "<!--", "<![CDATA["];
    let is_prefix = candidates.iter().any(|marker| {
        tail.len() <= marker.len() && tail.as_bytes() == &marker.as_bytes()[..tail.len()]
    });
    if is_prefix {
        tail.len()
    } else {
        0
    }
}

/// Scans a stop node's raw body for the matching close, continuing a
/// nesting count started at 1 when the node was entered. Shared between
/// entry (here) and [`crate::resumer`], since resuming is the same scan
/// over a new delta with a carried-forward depth.
pub(crate) fn scan_stop_node_delta(ctx: &mut ParserContext, opts: &Options, tag_name: Box<str>, depth: i32, sink: TextSink) -> bool {
    let delta_start = ctx.cursor;
    let delta: Box<str> = ctx.buffer[delta_start..].into();
    match ctx.stop_node_scanners.scan(&tag_name, &delta, depth) {
        ScanOutcome::Found { content_end, full_end } => {
            tracing::debug!(tag = %tag_name, "stop node closed");
            let content = &delta[..content_end];
            crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, content, &opts.text_node_name);
            ctx.cursor = delta_start + full_end;
            ctx.incomplete = None;
            true
        }
        ScanOutcome::Pending { depth } => {
            let holdback = stop_node_safe_holdback(&delta, &tag_name);
            let consume_end = delta.len() - holdback;
            let consumed = &delta[..consume_end];
            if !consumed.is_empty() {
                crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, consumed, &opts.text_node_name);
            }
            ctx.cursor = delta_start + consume_end;
            ctx.incomplete = Some(IncompleteState::StopNodeContent { tag_name, depth, sink });
            false
        }
    }
}
