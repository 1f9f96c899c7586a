//! The parser's cross-chunk state: the residual buffer and cursor, the node
//! arena, the open-element stack, the top-level accumulator, whatever
//! construct was left suspended, and the root-gate bookkeeping.

use crate::incomplete_state::IncompleteState;
use crate::reparse_hint::ReparseHint;
use crate::stop_nodes::StopNodeScanners;
use crate::tree::{AccumulatorItem, Arena, NodeId};

/// One open element: its tag name (for stop-node matching and close
/// matching), the arena node collecting its attributes and children, and
/// whether it has received anything besides text so far.
#[derive(Debug, Clone)]
pub(crate) struct StackFrame {
    pub(crate) tag_name: Box<str>,
    pub(crate) node: NodeId,
    /// True while the only content appended has been text and no child
    /// element has opened yet; cleared the moment a child attaches. Read at
    /// close time to decide whether the text-collapse optimization applies.
    pub(crate) text_only: bool,
}

/// Whether the root gate has decided to run the XML tokenizer on this
/// stream, or to treat it as an opaque plain-text pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootDecision {
    Xml,
    PlainText,
}

/// Everything a [`crate::Parser`] needs to remember between
/// `parse_stream` calls.
#[derive(Debug, Default)]
pub(crate) struct ParserContext {
    /// Bytes carried forward from prior chunks, with everything before
    /// `cursor` already folded into the tree (or the root-gate
    /// determination/passthrough buffers).
    pub(crate) buffer: String,
    pub(crate) cursor: usize,

    pub(crate) arena: Arena,
    pub(crate) accumulator: Vec<AccumulatorItem>,
    pub(crate) open_stack: Vec<StackFrame>,
    pub(crate) incomplete: Option<IncompleteState>,

    /// Set only for the duration of a single `parse_stream` call, between
    /// the resumer rewinding the cursor onto a suspended tag fragment and
    /// the tag handler consuming (or re-suspending) it. Always `None` again
    /// by the time the call returns.
    pub(crate) reparse_hint: Option<ReparseHint>,

    /// Compiled per-tag-name stop-node scanners, cached for the session.
    pub(crate) stop_node_scanners: StopNodeScanners,

    /// Root-gate bookkeeping, used only when `Options::allowed_root_nodes`
    /// is set. `None` until a decision has been made.
    pub(crate) root_decision: Option<RootDecision>,
    /// Bytes seen so far while the root gate is still undecided (neither an
    /// allowed nor disallowed root tag has been recognized yet).
    pub(crate) root_determination_buffer: String,
    /// Accumulated text once the root gate has decided "plain text".
    pub(crate) root_passthrough: String,
}

impl ParserContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn depth(&self) -> usize {
        self.open_stack.len()
    }

    /// Tag names from the document root down to (and including) the
    /// innermost open element, for stop-node path matching.
    pub(crate) fn path(&self) -> Vec<&str> {
        self.open_stack.iter().map(|frame| &*frame.tag_name).collect()
    }

    pub(crate) fn current_parent(&self) -> Option<NodeId> {
        self.open_stack.last().map(|frame| frame.node)
    }

    /// Marks the frame at the top of the stack (the element currently being
    /// populated) as having received a child element, disabling the
    /// text-collapse optimization for it.
    pub(crate) fn mark_current_not_text_only(&mut self) {
        if let Some(frame) = self.open_stack.last_mut() {
            frame.text_only = false;
        }
    }

    /// Whether anything is left for a caller to wait on: an open element, a
    /// suspended construct, unconsumed bytes in the residual buffer, or an
    /// undecided root gate.
    pub(crate) fn is_partial(&self) -> bool {
        !self.open_stack.is_empty()
            || self.incomplete.is_some()
            || self.cursor < self.buffer.len()
            || (self.root_decision.is_none() && !self.root_determination_buffer.is_empty())
    }
}
