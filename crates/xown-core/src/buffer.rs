//! Raw buffer handle

use crate::form::ReleaseForm;
use crate::{Error, Result};
use std::ptr::NonNull;

/// Owning pointer to one contiguous heap allocation of `T`
///
/// A `RawBuffer` never frees its memory on drop. Reclaiming the allocation is
/// left entirely to whichever release action receives it; a buffer that is
/// dropped without being handed to one leaks.
pub struct RawBuffer<T> {
    ptr: NonNull<T>,
    len: usize,
    form: ReleaseForm,
}

// Safety: RawBuffer owns its elements exactly like Box<[T]> does
unsafe impl<T: Send> Send for RawBuffer<T> {}
unsafe impl<T: Sync> Sync for RawBuffer<T> {}

impl<T> RawBuffer<T> {
    /// Take ownership of an array allocation
    pub fn from_boxed_slice(boxed: Box<[T]>) -> Self {
        let len = boxed.len();
        let slice = NonNull::from(Box::leak(boxed));
        Self {
            ptr: slice.cast(),
            len,
            form: ReleaseForm::Array,
        }
    }

    /// Take ownership of a vector's elements as an array allocation
    pub fn from_vec(vec: Vec<T>) -> Self {
        Self::from_boxed_slice(vec.into_boxed_slice())
    }

    /// Take ownership of a single-object allocation
    pub fn from_box(boxed: Box<T>) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            len: 1,
            form: ReleaseForm::Scalar,
        }
    }

    /// Wrap a pointer produced by some other allocation source
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to `len` initialized elements that nothing
    /// else will free, allocated in the way `form` describes.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize, form: ReleaseForm) -> Result<Self> {
        let ptr = NonNull::new(ptr).ok_or(Error::NullBuffer)?;
        Ok(Self { ptr, len, form })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocation form
    pub fn form(&self) -> ReleaseForm {
        self.form
    }

    /// Get raw pointer to the first element
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Get mutable raw pointer to the first element
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// View the elements
    ///
    /// # Safety
    ///
    /// The buffer must not have been reclaimed, and no mutable view may be alive.
    pub(crate) unsafe fn as_slice(&self) -> &[T] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// Mutable view of the elements
    ///
    /// # Safety
    ///
    /// The buffer must not have been reclaimed, and the caller must hold the
    /// only path to it.
    pub(crate) unsafe fn as_mut_slice(&mut self) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }

    /// Rebuild the array allocation so it can be dropped
    ///
    /// # Safety
    ///
    /// The buffer must have been allocated as `Box<[T]>` of exactly `len`
    /// elements (see [`RawBuffer::form`]).
    pub unsafe fn into_boxed_slice(self) -> Box<[T]> {
        let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        Box::from_raw(slice)
    }

    /// Rebuild the single-object allocation so it can be dropped
    ///
    /// # Safety
    ///
    /// The buffer must have been allocated as `Box<T>`.
    pub unsafe fn into_box(self) -> Box<T> {
        Box::from_raw(self.ptr.as_ptr())
    }
}

impl<T> std::fmt::Debug for RawBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("form", &self.form)
            .finish()
    }
}
