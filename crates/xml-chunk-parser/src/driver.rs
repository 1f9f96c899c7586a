//! Accepts one chunk (or the EOF sentinel) at a time: runs the root gate
//! ahead of the core engine when `allowed_root_nodes` is configured, splices
//! the chunk onto the residual buffer, invokes the resumer and tokenizer,
//! compacts the buffer, and reports whether the session is still `partial`.
//!
//! Kept separate from [`crate::Parser`] itself so the public entry type stays
//! a thin wrapper: this module owns the actual per-chunk control flow the
//! data model's "Chunk Driver" component describes.

use crate::context::{ParserContext, RootDecision};
use crate::incomplete_state::IncompleteState;
use crate::macros::strcspn;
use crate::options::Options;
use crate::resumer;
use crate::tokenizer::{self, current_sink, insert_text};

/// Feeds one chunk (`Some`) or the EOF sentinel (`None`) to `ctx`. Returns
/// whether the session is still `partial` afterward.
pub(crate) fn feed(ctx: &mut ParserContext, opts: &Options, chunk: Option<&str>) -> bool {
    match chunk {
        Some(s) => feed_chunk(ctx, opts, s),
        None => feed_eof(ctx, opts),
    }
}

fn feed_chunk(ctx: &mut ParserContext, opts: &Options, chunk: &str) -> bool {
    if let Some(allowed) = &opts.allowed_root_nodes {
        if ctx.root_decision.is_none() {
            ctx.root_determination_buffer.push_str(chunk);
            return match evaluate_root_gate(&ctx.root_determination_buffer, allowed) {
                None => {
                    tracing::trace!("root gate still undecided, awaiting more bytes");
                    true
                }
                Some(RootDecision::PlainText) => {
                    tracing::debug!("root gate decided: plain text passthrough");
                    ctx.root_decision = Some(RootDecision::PlainText);
                    let buffered = std::mem::take(&mut ctx.root_determination_buffer);
                    ctx.root_passthrough.push_str(&buffered);
                    true
                }
                Some(RootDecision::Xml) => {
                    tracing::debug!("root gate decided: xml parsing");
                    ctx.root_decision = Some(RootDecision::Xml);
                    let buffered = std::mem::take(&mut ctx.root_determination_buffer);
                    ctx.buffer.push_str(&buffered);
                    run_core(ctx, opts)
                }
            };
        }
        if ctx.root_decision == Some(RootDecision::PlainText) {
            ctx.root_passthrough.push_str(chunk);
            return true;
        }
    }

    ctx.buffer.push_str(chunk);
    run_core(ctx, opts)
}

fn feed_eof(ctx: &mut ParserContext, opts: &Options) -> bool {
    if opts.allowed_root_nodes.is_some() {
        if ctx.root_decision.is_none() {
            tracing::debug!("root gate never decided before EOF, finalizing as plain text");
            ctx.root_decision = Some(RootDecision::PlainText);
            let buffered = std::mem::take(&mut ctx.root_determination_buffer);
            ctx.root_passthrough.push_str(&buffered);
        }
        if ctx.root_decision == Some(RootDecision::PlainText) {
            return false;
        }
    }

    let forced_partial = finalize_incomplete_at_eof(ctx, opts);
    flush_trailing_text_at_eof(ctx, opts);
    compact(ctx);
    forced_partial || ctx.is_partial()
}

/// A text run ending the stream with a trailing entity-candidate (see
/// `tokenizer::trailing_entity_candidate_len`) is held back by the tokenizer
/// awaiting more bytes to see whether it completes into a real entity. At EOF
/// there are no more bytes coming, so that holdback has nothing left to grow
/// into: decode and insert it as final text instead of leaving it stranded in
/// the residual buffer forever.
fn flush_trailing_text_at_eof(ctx: &mut ParserContext, opts: &Options) {
    if ctx.incomplete.is_some() || ctx.cursor >= ctx.buffer.len() {
        return;
    }
    let remaining: Box<str> = ctx.buffer[ctx.cursor..].into();
    insert_text(ctx, opts, &remaining);
    ctx.cursor = ctx.buffer.len();
}

/// Runs the resumer (if a construct was left suspended) and, unless it
/// re-suspended immediately, the main tokenizer loop, then compacts the
/// residual buffer. Returns whether the session is still partial.
fn run_core(ctx: &mut ParserContext, opts: &Options) -> bool {
    let should_run_main_loop = resumer::resume(ctx, opts);
    if should_run_main_loop {
        tokenizer::run(ctx, opts);
    }
    compact(ctx);
    ctx.is_partial()
}

/// Slices off everything before the cursor so the cursor is zero again, per
/// the "residual buffer never contains bytes before the cursor after a chunk
/// returns" invariant. No offsets inside `IncompleteState` need rebasing: no
/// variant stores a raw buffer offset (see its module docs), so slicing the
/// buffer alone is sufficient.
fn compact(ctx: &mut ParserContext) {
    if ctx.cursor > 0 {
        ctx.buffer.drain(..ctx.cursor);
        ctx.cursor = 0;
    }
}

/// Resolves the root gate's decision from whatever has accumulated in the
/// root-determination buffer so far, or `None` if it's still ambiguous (pure
/// leading whitespace, or a tag name that could still grow).
fn evaluate_root_gate(buffer: &str, allowed: &[Box<str>]) -> Option<RootDecision> {
    let trimmed = buffer.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed.starts_with('<') {
        return Some(RootDecision::PlainText);
    }

    let bytes = trimmed.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    // `</...`, `<!...`, `<?...` are never an allowed opening root tag.
    if matches!(bytes[1], b'/' | b'!' | b'?') {
        return Some(RootDecision::PlainText);
    }

    let name_len = strcspn!(bytes, b if is_name_boundary(b), 1);
    if name_len == 0 {
        return Some(RootDecision::PlainText);
    }
    if 1 + name_len >= bytes.len() {
        // The name might still be growing (no boundary byte seen yet).
        return None;
    }

    let tag_name = &trimmed[1..1 + name_len];
    if allowed.iter().any(|name| &**name == tag_name) {
        Some(RootDecision::Xml)
    } else {
        Some(RootDecision::PlainText)
    }
}

fn is_name_boundary(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')
}

/// Resolves whatever was left suspended once the caller signals EOF: no more
/// bytes are coming, so a suspended construct either gets silently dropped
/// (it was never visibly started) or its already-materialized provisional
/// content is kept as final. Returns whether this forces `partial=true`
/// regardless of what `ctx.is_partial()` would otherwise say.
fn finalize_incomplete_at_eof(ctx: &mut ParserContext, opts: &Options) -> bool {
    let Some(state) = ctx.incomplete.take() else {
        return false;
    };

    match state {
        // No provisional content was ever shown for these; there's nothing
        // to materialize, so the construct is simply discarded as if it had
        // never been started.
        IncompleteState::Comment | IncompleteState::Doctype | IncompleteState::XmlDecl => {
            tracing::trace!("discarding never-closed special construct at EOF");
            ctx.cursor = ctx.buffer.len();
            false
        }
        IncompleteState::TagStart => {
            let sink = current_sink(ctx, opts);
            let literal = ctx.buffer[ctx.cursor..].to_string();
            crate::tree::append_text(&mut ctx.arena, &mut ctx.accumulator, &sink, &literal, &opts.text_node_name);
            ctx.cursor = ctx.buffer.len();
            true
        }
        // These already carry their provisional content live in the tree
        // (an opening/closing tag fragment, a CDATA delta, or stop-node raw
        // content); at EOF that provisional content simply becomes final.
        IncompleteState::OpeningTag { .. }
        | IncompleteState::ClosingTag { .. }
        | IncompleteState::Cdata { .. }
        | IncompleteState::StopNodeContent { .. } => {
            ctx.cursor = ctx.buffer.len();
            true
        }
    }
}
