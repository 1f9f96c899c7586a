/// One configured stop-node pattern: either a bare tag name or a dotted path,
/// the latter possibly containing `*` wildcard segments.
///
/// Classification happens once, at `Options` construction, rather than on
/// every tag seen, since the same `stop_nodes` list is reused for the whole
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StopNodePattern {
    Simple(Box<str>),
    Path(Box<str>),
}

impl StopNodePattern {
    fn classify(raw: &str) -> Self {
        if raw.contains('.') {
            StopNodePattern::Path(raw.into())
        } else {
            StopNodePattern::Simple(raw.into())
        }
    }
}

/// Configuration for a [`crate::Parser`] session.
///
/// All fields have defaults matching the documented behavior; use
/// [`Options::default`] and the builder-style `with_*` setters rather than
/// constructing the struct directly, since private fields (the classified
/// `stop_nodes`) aren't constructible from outside the crate.
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) text_node_name: Box<str>,
    pub(crate) attribute_name_prefix: Box<str>,
    pub(crate) stop_nodes: Vec<StopNodePattern>,
    pub(crate) max_depth: Option<usize>,
    pub(crate) always_create_text_node: bool,
    pub(crate) parse_primitives: bool,
    pub(crate) allowed_root_nodes: Option<Vec<Box<str>>>,
    pub(crate) ignore_whitespace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            text_node_name: "#text".into(),
            attribute_name_prefix: "@".into(),
            stop_nodes: Vec::new(),
            max_depth: None,
            always_create_text_node: true,
            parse_primitives: false,
            allowed_root_nodes: None,
            ignore_whitespace: false,
        }
    }
}

impl Options {
    pub fn with_text_node_name(mut self, name: impl Into<Box<str>>) -> Self {
        self.text_node_name = name.into();
        self
    }

    pub fn with_attribute_name_prefix(mut self, prefix: impl Into<Box<str>>) -> Self {
        self.attribute_name_prefix = prefix.into();
        self
    }

    pub fn with_stop_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_nodes = names
            .into_iter()
            .map(|s| StopNodePattern::classify(s.as_ref()))
            .collect();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_always_create_text_node(mut self, value: bool) -> Self {
        self.always_create_text_node = value;
        self
    }

    pub fn with_parse_primitives(mut self, value: bool) -> Self {
        self.parse_primitives = value;
        self
    }

    pub fn with_allowed_root_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<Box<str>> = names.into_iter().map(|s| s.as_ref().into()).collect();
        self.allowed_root_nodes = if names.is_empty() { None } else { Some(names) };
        self
    }

    pub fn with_ignore_whitespace(mut self, value: bool) -> Self {
        self.ignore_whitespace = value;
        self
    }
}
