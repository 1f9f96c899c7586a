//! The suspended-construct state a parse session carries between chunks.

use crate::tree::TextSink;

/// A markup construct that started before the current chunk ended and
/// hasn't been closed yet.
///
/// One variant per kind of suspended construct, each naming only the fields
/// it needs to resume scanning once more bytes arrive — not a single struct
/// with an optional field per construct, most of which would sit unused for
/// any given suspension.
///
/// For every variant except [`IncompleteState::Cdata`] and
/// [`IncompleteState::StopNodeContent`], the parsing cursor is left exactly
/// at the start of the unresolved construct (the `<`) rather than advanced
/// past any of it; the residual-buffer compaction that happens on every
/// chunk return then naturally keeps the whole unresolved span around for
/// the resumer to re-examine, with no separate start offset to track. CDATA
/// and stop-node content instead advance the cursor as their raw text is
/// incrementally appended to the tree, so the buffer can compact behind
/// them even while the construct itself stays open across many chunks.
#[derive(Debug, Clone)]
pub(crate) enum IncompleteState {
    /// Saw a bare `<` with nothing recognizable after it yet. Could turn out
    /// to be an opening tag, a closing tag, a comment, CDATA, a doctype, or
    /// an XML declaration depending on what follows.
    TagStart,

    /// Inside `<tag ...` before the closing `>` or `/>` has arrived.
    /// `provisional` is the exact text already written to `sink` as a
    /// best-effort live preview of the fragment, so it can be retracted by
    /// exact suffix match if this chunk reveals a real tag.
    OpeningTag { sink: TextSink, provisional: Box<str> },

    /// Inside `</tag` before its closing `>` has arrived.
    ClosingTag { sink: TextSink, provisional: Box<str> },

    /// Inside `<!--` before `-->` has arrived.
    Comment,

    /// Inside `<!DOCTYPE` before its closing `>` has arrived.
    Doctype,

    /// Inside `<?xml` before `?>` has arrived.
    XmlDecl,

    /// Inside `<![CDATA[` before `]]>` has arrived. `sink` is where the raw
    /// content is incrementally appended as each chunk's delta arrives.
    Cdata { sink: TextSink },

    /// Inside a stop node's raw content, waiting for the matching closing
    /// tag. `tag_name` selects the cached scanner; `depth` is the nesting
    /// count among same-named opens seen so far (starts at 1 when the node
    /// is entered); `sink` is where the captured raw content is
    /// incrementally appended.
    StopNodeContent {
        tag_name: Box<str>,
        depth: i32,
        sink: TextSink,
    },
}

impl IncompleteState {
    /// The sink the eventual content would append to, for the variants that
    /// have one.
    pub(crate) fn sink(&self) -> Option<&TextSink> {
        match self {
            IncompleteState::OpeningTag { sink, .. }
            | IncompleteState::ClosingTag { sink, .. }
            | IncompleteState::Cdata { sink, .. }
            | IncompleteState::StopNodeContent { sink, .. } => Some(sink),
            IncompleteState::TagStart
            | IncompleteState::Comment
            | IncompleteState::Doctype
            | IncompleteState::XmlDecl => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::Arena;

    #[test]
    fn sink_is_present_only_for_attaching_variants() {
        let mut arena = Arena::default();
        let node = arena.alloc();
        let sink = TextSink::Node { node, key: "#text".into() };

        assert!(IncompleteState::TagStart.sink().is_none());
        assert!(IncompleteState::Comment.sink().is_none());
        assert!(IncompleteState::Doctype.sink().is_none());
        assert!(IncompleteState::XmlDecl.sink().is_none());

        assert!(IncompleteState::OpeningTag { sink: sink.clone(), provisional: "<pa".into() }
            .sink()
            .is_some());
        assert!(IncompleteState::ClosingTag { sink: sink.clone(), provisional: "</pa".into() }
            .sink()
            .is_some());
        assert!(IncompleteState::Cdata { sink: sink.clone() }.sink().is_some());
        assert!(IncompleteState::StopNodeContent {
            tag_name: "script".into(),
            depth: 1,
            sink,
        }
        .sink()
        .is_some());
    }
}
