//! The single-chunk-lived signal that a just-resumed opening or closing tag
//! fragment has a provisional text write sitting in the tree that must be
//! retracted if (and only if) this chunk turns the fragment into a real tag.
//!
//! Separate from [`crate::incomplete_state::IncompleteState`]: the
//! incomplete state spans chunk boundaries (it's what gets checked at the
//! top of every `parse_stream` call); the reparse hint exists only for the
//! duration of the resumer handing a rewound cursor back to the tag handlers
//! within the current chunk, and is always cleared by the time the chunk
//! returns.

use crate::tree::TextSink;

/// The provisional fragment a suspended opening/closing tag left behind,
/// and where it was written.
#[derive(Debug, Clone)]
pub(crate) struct ReparseHint {
    pub(crate) sink: TextSink,
    pub(crate) fragment: Box<str>,
}

impl ReparseHint {
    pub(crate) fn new(sink: TextSink, fragment: impl Into<Box<str>>) -> Self {
        Self { sink, fragment: fragment.into() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::Arena;

    #[test]
    fn construction_round_trips_fields() {
        let mut arena = Arena::default();
        let node = arena.alloc();
        let hint = ReparseHint::new(TextSink::Node { node, key: "#text".into() }, "<pa");
        assert_eq!(&*hint.fragment, "<pa");
        match hint.sink {
            TextSink::Node { key, .. } => assert_eq!(&*key, "#text"),
            TextSink::Accumulator => panic!("expected Node sink"),
        }
    }
}
