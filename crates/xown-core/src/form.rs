//! Allocation form definitions

/// How a buffer was allocated, and therefore how it must be reclaimed
///
/// Reclaiming an array allocation as a single object (or the reverse) is
/// undefined behavior; the form travels with the buffer so release actions
/// can check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseForm {
    /// Contiguous run of `len` elements (`Box<[T]>`)
    Array,
    /// One element (`Box<T>`)
    Scalar,
}

impl ReleaseForm {
    /// Short name used in log fields
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReleaseForm::Array => "array",
            ReleaseForm::Scalar => "scalar",
        }
    }
}

impl std::fmt::Display for ReleaseForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
