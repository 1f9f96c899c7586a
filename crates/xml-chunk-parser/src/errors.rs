/// Errors the streaming parser can return.
///
/// The parser is lenient by contract: malformed markup is absorbed as literal
/// text rather than surfaced as an error (see the crate-level docs). These two
/// variants are the only conditions that are not absorbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The caller passed a chunk that isn't a string, a stringifiable value,
    /// the empty string, or the EOF sentinel.
    InvalidChunkType,

    /// An internal invariant was violated (see the data-model invariants in
    /// the crate documentation). Not reachable through any public API misuse;
    /// exists so a broken invariant has a typed path to the caller instead of
    /// a panic, in builds where `debug_assert!` is compiled out.
    InternalStateCorrupt,
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl From<ParseError> for &str {
    fn from(val: ParseError) -> Self {
        match val {
            ParseError::InvalidChunkType => "invalid chunk type",
            ParseError::InternalStateCorrupt => "internal parser state corrupt",
        }
    }
}

impl From<&ParseError> for &str {
    fn from(val: &ParseError) -> Self {
        Into::<&str>::into(*val)
    }
}
