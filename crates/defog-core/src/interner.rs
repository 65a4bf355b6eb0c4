use parking_lot::RwLock;
use std::sync::Arc;

use string_interner::StringInterner;
use string_interner::backend::DefaultBackend;
use string_interner::symbol::DefaultSymbol;

/// Interned string symbol backed by a `StringInterner`.
pub type InternedStr = DefaultSymbol;

/// Inner implementation of the string interner.
#[derive(Debug)]
pub struct InternPoolInner {
    interner: RwLock<StringInterner<DefaultBackend>>,
}

impl InternPoolInner {
    /// Create a new interner.
    pub fn new() -> Self {
        Self {
            interner: RwLock::new(StringInterner::new()),
        }
    }

    /// Intern the provided string slice and return its symbol.
    #[inline]
    pub fn intern<S>(&self, value: S) -> InternedStr
    where
        S: AsRef<str>,
    {
        self.interner.write().get_or_intern(value.as_ref())
    }

    /// Look up the symbol for a string without interning it.
    #[inline]
    pub fn get<S>(&self, value: S) -> Option<InternedStr>
    where
        S: AsRef<str>,
    {
        self.interner.read().get(value.as_ref())
    }

    /// Resolve an interned symbol back into an owned string.
    ///
    /// Clones the underlying string from the interner to avoid lifetime issues.
    pub fn resolve_owned(&self, symbol: InternedStr) -> Option<String> {
        self.interner.read().resolve(symbol).map(|s| s.to_owned())
    }
}

impl Default for InternPoolInner {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared string interner used by the symbol table.
///
/// Thread-safe wrapper around `InternPoolInner` using `Arc` for shared ownership.
#[derive(Clone, Debug)]
pub struct InternPool {
    inner: Arc<InternPoolInner>,
}

impl Default for InternPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InternPool {
    /// Create a new shared interner pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InternPoolInner::new()),
        }
    }

    /// Intern the provided string slice and return its symbol.
    pub fn intern<S>(&self, value: S) -> InternedStr
    where
        S: AsRef<str>,
    {
        self.inner.intern(value)
    }

    /// Look up the symbol for a string without interning it.
    pub fn get<S>(&self, value: S) -> Option<InternedStr>
    where
        S: AsRef<str>,
    {
        self.inner.get(value)
    }

    /// Resolve an interned symbol back into an owned string.
    pub fn resolve_owned(&self, symbol: InternedStr) -> Option<String> {
        self.inner.resolve_owned(symbol)
    }

    /// Get the number of interned strings (for diagnostics).
    pub fn len(&self) -> usize {
        self.inner.interner.read().len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
