use std::fmt;

/// Unique identifier for a live cache entry.
///
/// The distilled spec allows "string, integer, or atom-like symbol" — the
/// third case is rendered here as `&'static str`, the zero-allocation Rust
/// equivalent of a statically-known symbol/atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Str(String),
    Int(i64),
    Sym(&'static str),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Str(s) => write!(f, "{s}"),
            CacheKey::Int(i) => write!(f, "{i}"),
            CacheKey::Sym(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Str(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Str(s)
    }
}

impl From<i64> for CacheKey {
    fn from(i: i64) -> Self {
        CacheKey::Int(i)
    }
}

// `Sym` has no `From` impl: `&'static str` already converts via the
// `From<&str>` impl above (as an owned `Str`), so symbols are only ever
// constructed explicitly with `CacheKey::Sym(..)` when the caller wants the
// zero-allocation variant.
