//! The node arena and the merge rule ("tree builder") that folds a newly
//! recognized (key, value) pair into it.
//!
//! Nodes live in a flat [`Arena`] and are addressed by [`NodeId`] rather than
//! by reference: the open-element stack, the reparse-segment hint, and
//! [`crate::incomplete_state::IncompleteState`] all need to refer to "the
//! node currently being populated" while the accumulator or a parent node
//! *also* holds that same node, which a borrow-checked reference graph can't
//! express without `Rc<RefCell<_>>`. An index into a `Vec` sidesteps that
//! without giving up the "both parent and stack hold the same object"
//! contract the data model calls for.

/// An index into a parser session's [`Arena`]. Never valid across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// A value attached to a key inside a [`Node`].
///
/// Lists are flat: a `List` never contains another `List`. That invariant is
/// enforced by construction (nothing in this module ever nests one), not by
/// the type system, matching the data model's "ordered list whose elements
/// are any of the preceding [non-list]" wording.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Node(NodeId),
    List(Vec<Value>),
}

/// An open-order mapping from string keys to [`Value`]s.
///
/// Backed by a `Vec` rather than a hash map: real documents rarely carry more
/// than a handful of distinct keys per element, so linear lookup is both
/// simpler and, at this cardinality, no slower than hashing — and it gives
/// insertion-order iteration for free, which an XML element's attributes and
/// children require.
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    entries: Vec<(Box<str>, Value)>,
}

impl Node {
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v)
    }

    pub(crate) fn push(&mut self, key: &str, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| &**k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The node's sole key, if it has exactly one.
    ///
    /// Used both for the text-collapse check ("its node contains only the
    /// text key") and for detecting an orphan self-named empty shell during
    /// interleaved-tag recovery.
    pub(crate) fn only_key(&self) -> Option<&str> {
        match self.entries.as_slice() {
            [(key, _)] => Some(key),
            _ => None,
        }
    }

    pub(crate) fn entries(&self) -> &[(Box<str>, Value)] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut (Box<str>, Value)> {
        self.entries.iter_mut()
    }
}

/// Flat backing store for every [`Node`] in one parse session.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub(crate) fn alloc(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

/// Inserts `value` under `key` into the node at `node_id`.
///
/// - A new key is appended directly, preserving insertion order.
/// - A repeated text-key insertion where both the existing and new values are
///   strings is concatenated in place, so contiguous text runs stay a single
///   string rather than a one-element-per-chunk list.
/// - Anything else repeated under the same key promotes the existing value to
///   a list (if it isn't one already) and appends.
pub(crate) fn add_value_to_node(arena: &mut Arena, node_id: NodeId, key: &str, value: Value, text_key: &str) {
    let node = arena.get_mut(node_id);

    let Some(existing) = node.get_mut(key) else {
        node.push(key, value);
        return;
    };

    if key == text_key {
        if let (Value::String(existing_text), Value::String(new_text)) = (&mut *existing, &value) {
            existing_text.push_str(new_text);
            return;
        }
    }

    match existing {
        Value::List(list) => list.push(value),
        _ => {
            let prior = std::mem::replace(existing, Value::Bool(false));
            *existing = Value::List(vec![prior, value]);
        }
    }
}

/// One item in the top-level accumulator: either a closed (or still-open)
/// top-level element, or a bare text/primitive value seen at document root.
#[derive(Debug, Clone)]
pub(crate) enum AccumulatorItem {
    Element { tag: Box<str>, value: Value },
    Leaf(Value),
}

/// Appends `text` as a bare root-level leaf, concatenating onto a trailing
/// string leaf the same way [`add_value_to_node`] concatenates text-key
/// repeats, so sequential root-level text runs stay one string.
pub(crate) fn add_text_to_accumulator(accumulator: &mut Vec<AccumulatorItem>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(AccumulatorItem::Leaf(Value::String(existing))) = accumulator.last_mut() {
        existing.push_str(text);
        return;
    }
    accumulator.push(AccumulatorItem::Leaf(Value::String(text.to_string())));
}

/// Where a provisional (or final) text fragment is folded in: a key on an
/// arena node, or a bare leaf at the top of the accumulator.
///
/// Lives here, not in `reparse_hint`, since every operation on it
/// (`append`/`retract`) needs the arena and accumulator this module owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextSink {
    Node { node: NodeId, key: Box<str> },
    Accumulator,
}

/// Writes `text` to `sink`, applying the same merge rule
/// [`add_value_to_node`]/[`add_text_to_accumulator`] apply to any other text
/// insertion. Used both for ordinary text runs and for provisional
/// fragments emitted ahead of knowing whether they'll turn out to be a tag.
pub(crate) fn append_text(arena: &mut Arena, accumulator: &mut Vec<AccumulatorItem>, sink: &TextSink, text: &str, text_key: &str) {
    if text.is_empty() {
        return;
    }
    match sink {
        TextSink::Node { node, key } => {
            add_value_to_node(arena, *node, key, Value::String(text.to_string()), text_key)
        }
        TextSink::Accumulator => add_text_to_accumulator(accumulator, text),
    }
}

/// Undoes a previous [`append_text`] of exactly `fragment`, by trimming that
/// many trailing bytes off a string value (or dropping a list's last entry
/// if it was promoted to one in between). Returns whether anything was
/// retracted; idempotent; a repeated call once the fragment is already gone
/// is a no-op rather than corrupting unrelated content.
pub(crate) fn retract_text(arena: &mut Arena, accumulator: &mut Vec<AccumulatorItem>, sink: &TextSink, fragment: &str) -> bool {
    if fragment.is_empty() {
        return false;
    }
    match sink {
        TextSink::Node { node, key } => {
            let Some(value) = arena.get_mut(*node).get_mut(key) else {
                return false;
            };
            let retracted = retract_from_value(value, fragment);
            if retracted && matches!(value, Value::String(s) if s.is_empty()) {
                arena.get_mut(*node).remove(key);
            }
            retracted
        }
        TextSink::Accumulator => match accumulator.last_mut() {
            Some(AccumulatorItem::Leaf(value)) => {
                let retracted = retract_from_value(value, fragment);
                if retracted {
                    if matches!(value, Value::String(s) if s.is_empty()) {
                        accumulator.pop();
                    }
                }
                retracted
            }
            _ => false,
        },
    }
}

fn retract_from_value(value: &mut Value, fragment: &str) -> bool {
    match value {
        Value::String(s) if s.ends_with(fragment) => {
            s.truncate(s.len() - fragment.len());
            true
        }
        Value::List(items) => match items.last() {
            Some(Value::String(s)) if s == fragment => {
                items.pop();
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Converts an entity-decoded primitive guess into a tree [`Value`].
pub(crate) fn primitive_to_value(p: xml_entities::Primitive) -> Value {
    match p {
        xml_entities::Primitive::Bool(b) => Value::Bool(b),
        xml_entities::Primitive::Number(n) => Value::Number(n),
        xml_entities::Primitive::Str(s) => Value::String(s),
    }
}

// --- Owned, arena-free snapshot types returned to callers -----------------

/// A fully materialized value, detached from the session's [`Arena`].
///
/// This is what [`crate::ParseResult`] hands back; unlike [`Value`] it owns
/// its own subtree, since the arena it was built from is session-private and
/// mutates on every subsequent chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    String(String),
    Number(f64),
    Bool(bool),
    Node(XmlNode),
    List(Vec<XmlValue>),
}

/// An owned, order-preserving snapshot of a [`Node`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlNode {
    entries: Vec<(Box<str>, XmlValue)>,
}

impl XmlNode {
    pub(crate) fn from_entries(entries: Vec<(Box<str>, XmlValue)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&XmlValue> {
        self.entries.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| &**k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &XmlValue)> {
        self.entries.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A materialized top-level accumulator item.
///
/// `Element`'s `value` is usually `XmlValue::Node`, but collapses to a bare
/// `XmlValue::String` under the same text-collapse rule as any other
/// element (see [`crate::tokenizer`]) when `always_create_text_node` is off
/// and the element held nothing but text.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlItem {
    Element { tag: Box<str>, value: XmlValue },
    Leaf(XmlValue),
}

/// Converts an arena [`Value`] into an owned [`XmlValue`].
///
/// `parse_primitives` is applied here, at snapshot time, rather than as text
/// runs are accumulated: a value under construction stays a plain `String`
/// across however many chunks it takes to complete (so a split `"12"` +
/// `"3"` still concatenates instead of becoming a list of two coerced
/// numbers), and only the fully-assembled text seen by a caller gets
/// coerced. `in_text_context` is true while walking a value reached through
/// the configured text key, the only place primitive coercion applies
/// outside of attributes (which are coerced eagerly in `attributes.rs`,
/// since a tag's attribute region is only ever parsed once it's complete).
pub(crate) fn materialize_value(arena: &Arena, value: &Value, text_key: &str, parse_primitives: bool, in_text_context: bool) -> XmlValue {
    match value {
        Value::String(s) => {
            if in_text_context && parse_primitives {
                primitive_to_xml_value(xml_entities::try_parse_primitive(s))
            } else {
                XmlValue::String(s.clone())
            }
        }
        Value::Number(n) => XmlValue::Number(*n),
        Value::Bool(b) => XmlValue::Bool(*b),
        Value::Node(id) => XmlValue::Node(materialize_node(arena, *id, text_key, parse_primitives)),
        Value::List(items) => XmlValue::List(
            items
                .iter()
                .map(|v| materialize_value(arena, v, text_key, parse_primitives, in_text_context))
                .collect(),
        ),
    }
}

fn primitive_to_xml_value(p: xml_entities::Primitive) -> XmlValue {
    match primitive_to_value(p) {
        Value::Bool(b) => XmlValue::Bool(b),
        Value::Number(n) => XmlValue::Number(n),
        Value::String(s) => XmlValue::String(s),
        _ => unreachable!("primitive_to_value never returns a Node or List"),
    }
}

pub(crate) fn materialize_node(arena: &Arena, id: NodeId, text_key: &str, parse_primitives: bool) -> XmlNode {
    let node = arena.get(id);
    XmlNode {
        entries: node
            .entries()
            .iter()
            .map(|(k, v)| {
                let in_text_context = &**k == text_key;
                (k.clone(), materialize_value(arena, v, text_key, parse_primitives, in_text_context))
            })
            .collect(),
    }
}

pub(crate) fn materialize_accumulator(arena: &Arena, items: &[AccumulatorItem], text_key: &str, parse_primitives: bool) -> Vec<XmlItem> {
    items
        .iter()
        .map(|item| match item {
            AccumulatorItem::Element { tag, value } => XmlItem::Element {
                tag: tag.clone(),
                value: materialize_value(arena, value, text_key, parse_primitives, false),
            },
            AccumulatorItem::Leaf(v) => XmlItem::Leaf(materialize_value(arena, v, text_key, parse_primitives, true)),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn repeated_text_concatenates() {
        let mut arena = Arena::default();
        let id = arena.alloc();
        add_value_to_node(&mut arena, id, "#text", Value::String("a".into()), "#text");
        add_value_to_node(&mut arena, id, "#text", Value::String("b".into()), "#text");
        assert_eq!(arena.get(id).get("#text"), Some(&Value::String("ab".into())));
    }

    #[test]
    fn repeated_element_promotes_to_list() {
        let mut arena = Arena::default();
        let parent = arena.alloc();
        let child1 = arena.alloc();
        let child2 = arena.alloc();
        add_value_to_node(&mut arena, parent, "item", Value::Node(child1), "#text");
        add_value_to_node(&mut arena, parent, "item", Value::Node(child2), "#text");
        assert_eq!(
            arena.get(parent).get("item"),
            Some(&Value::List(vec![Value::Node(child1), Value::Node(child2)]))
        );
    }

    #[test]
    fn third_repeat_appends_to_existing_list() {
        let mut arena = Arena::default();
        let parent = arena.alloc();
        add_value_to_node(&mut arena, parent, "n", Value::Number(1.0), "#text");
        add_value_to_node(&mut arena, parent, "n", Value::Number(2.0), "#text");
        add_value_to_node(&mut arena, parent, "n", Value::Number(3.0), "#text");
        assert_eq!(
            arena.get(parent).get("n"),
            Some(&Value::List(vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ]))
        );
    }

    #[test]
    fn only_key_detects_single_entry_nodes() {
        let mut node = Node::default();
        assert_eq!(node.only_key(), None);
        node.push("a", Value::Bool(true));
        assert_eq!(node.only_key(), Some("a"));
        node.push("b", Value::Bool(false));
        assert_eq!(node.only_key(), None);
    }

    #[test]
    fn provisional_text_retracts_cleanly_from_a_node() {
        let mut arena = Arena::default();
        let mut accumulator = Vec::new();
        let node = arena.alloc();
        let sink = TextSink::Node { node, key: "#text".into() };
        append_text(&mut arena, &mut accumulator, &sink, "<pa", "#text");
        assert_eq!(arena.get(node).get("#text"), Some(&Value::String("<pa".into())));
        assert!(retract_text(&mut arena, &mut accumulator, &sink, "<pa"));
        assert_eq!(arena.get(node).get("#text"), Some(&Value::String("".into())));
    }

    #[test]
    fn retraction_is_idempotent() {
        let mut arena = Arena::default();
        let mut accumulator = Vec::new();
        let node = arena.alloc();
        let sink = TextSink::Node { node, key: "#text".into() };
        append_text(&mut arena, &mut accumulator, &sink, "hello <pa", "#text");
        assert!(retract_text(&mut arena, &mut accumulator, &sink, "<pa"));
        assert!(!retract_text(&mut arena, &mut accumulator, &sink, "<pa"));
        assert_eq!(arena.get(node).get("#text"), Some(&Value::String("hello ".into())));
    }

    #[test]
    fn provisional_text_retracts_cleanly_from_the_accumulator() {
        let mut arena = Arena::default();
        let mut accumulator = Vec::new();
        add_text_to_accumulator(&mut accumulator, "hi ");
        append_text(&mut arena, &mut accumulator, &TextSink::Accumulator, "<pa", "#text");
        assert!(retract_text(&mut arena, &mut accumulator, &TextSink::Accumulator, "<pa"));
        match accumulator.last() {
            Some(AccumulatorItem::Leaf(Value::String(s))) => assert_eq!(s, "hi "),
            other => panic!("unexpected accumulator state: {other:?}"),
        }
    }

    #[test]
    fn retracting_the_whole_leaf_removes_it() {
        let mut arena = Arena::default();
        let mut accumulator = Vec::new();
        append_text(&mut arena, &mut accumulator, &TextSink::Accumulator, "<pa", "#text");
        assert!(retract_text(&mut arena, &mut accumulator, &TextSink::Accumulator, "<pa"));
        assert!(accumulator.is_empty());
    }

    #[test]
    fn materialize_coerces_text_key_only_when_requested() {
        let mut arena = Arena::default();
        let id = arena.alloc();
        arena.get_mut(id).push("#text", Value::String("42".into()));
        arena.get_mut(id).push("@count", Value::String("42".into()));

        let plain = materialize_node(&arena, id, "#text", false);
        assert_eq!(plain.get("#text"), Some(&XmlValue::String("42".into())));

        let coerced = materialize_node(&arena, id, "#text", true);
        assert_eq!(coerced.get("#text"), Some(&XmlValue::Number(42.0)));
        // Attributes are coerced eagerly at parse time, not here, so a string
        // attribute value is left untouched by materialization.
        assert_eq!(coerced.get("@count"), Some(&XmlValue::String("42".into())));
    }

    #[test]
    fn materialize_coerces_a_list_of_text_values_element_by_element() {
        let mut arena = Arena::default();
        let id = arena.alloc();
        arena.get_mut(id).push(
            "#text",
            Value::List(vec![Value::String("1".into()), Value::String("two".into())]),
        );
        let coerced = materialize_node(&arena, id, "#text", true);
        assert_eq!(
            coerced.get("#text"),
            Some(&XmlValue::List(vec![XmlValue::Number(1.0), XmlValue::String("two".into())]))
        );
    }
}
