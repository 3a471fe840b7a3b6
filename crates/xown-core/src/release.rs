//! Release actions

use crate::buffer::RawBuffer;
use crate::form::ReleaseForm;

/// Capability that reclaims a buffer once its last owner is gone
///
/// Any `FnMut(RawBuffer<T>)` closure or function pointer qualifies. The
/// action is invoked at most once per allocation; an action that never
/// reclaims the buffer leaks it.
pub trait Release<T>: Send + 'static {
    /// Reclaim `buffer`
    fn release(&mut self, buffer: RawBuffer<T>);
}

impl<T, F> Release<T> for F
where
    F: FnMut(RawBuffer<T>) + Send + 'static,
{
    fn release(&mut self, buffer: RawBuffer<T>) {
        self(buffer)
    }
}

/// Reclaims the buffer as an array allocation (`Box<[T]>`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayRelease;

impl<T> Release<T> for ArrayRelease {
    fn release(&mut self, buffer: RawBuffer<T>) {
        release_array(buffer)
    }
}

/// Reclaims the buffer as a single-object allocation (`Box<T>`)
///
/// A buffer holding anything other than exactly one element is leaked
/// instead of being freed with the wrong layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarRelease;

impl<T> Release<T> for ScalarRelease {
    fn release(&mut self, buffer: RawBuffer<T>) {
        release_scalar(buffer)
    }
}

/// Free an array buffer
///
/// Usable directly as a `fn(RawBuffer<T>)` action.
pub fn release_array<T>(buffer: RawBuffer<T>) {
    // Box<T> and Box<[T]> of length 1 share a layout
    if buffer.form() == ReleaseForm::Scalar && buffer.len() != 1 {
        tracing::error!(len = buffer.len(), "scalar buffer with bad length, leaking");
        return;
    }
    tracing::trace!(len = buffer.len(), form = %buffer.form(), "freeing array");
    drop(unsafe { buffer.into_boxed_slice() });
}

/// Free a single-object buffer
pub fn release_scalar<T>(buffer: RawBuffer<T>) {
    if buffer.len() != 1 {
        tracing::error!(
            len = buffer.len(),
            form = %buffer.form(),
            "scalar release on multi-element buffer, leaking"
        );
        return;
    }
    tracing::trace!(form = %buffer.form(), "freeing scalar");
    drop(unsafe { buffer.into_box() });
}
