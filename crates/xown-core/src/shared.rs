//! Reference-counted buffer handle with a shared release action

use crate::action::{ActionSlot, ErasedAction};
use crate::buffer::RawBuffer;
use crate::form::ReleaseForm;
use crate::release::{ArrayRelease, Release};
use crate::Result;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::any::TypeId;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

/// Upper bound on outstanding handles before the process aborts
const MAX_REF_COUNT: usize = isize::MAX as usize;

/// Block shared by every handle derived from one `create`
struct Inner<T> {
    /// Number of live handles
    ref_count: AtomicUsize,
    /// The allocation, reclaimed only through `action`
    buffer: RawBuffer<T>,
    /// Release action, fixed in type at creation
    action: Mutex<Box<dyn ErasedAction<T>>>,
    /// Identity of the action type, readable without the lock
    action_type: TypeId,
    action_name: &'static str,
}

/// Shared handle over one heap buffer and its release action
///
/// Cloning a handle bumps the shared count. When the last handle is dropped
/// the release action receives the buffer, exactly once.
pub struct SharedResource<T> {
    inner: NonNull<Inner<T>>,
    _marker: PhantomData<Inner<T>>,
}

// Safety: the buffer can be read from any thread holding a handle (T: Sync)
// and is handed to the action on whichever thread drops last (T: Send).
// The action itself is Send and only reached through the mutex.
unsafe impl<T: Send + Sync> Send for SharedResource<T> {}
unsafe impl<T: Send + Sync> Sync for SharedResource<T> {}

impl<T> SharedResource<T> {
    /// Take ownership of `buffer`, attaching the action that will reclaim it
    pub fn create<A: Release<T>>(buffer: RawBuffer<T>, action: A) -> Self {
        tracing::trace!(
            len = buffer.len(),
            form = %buffer.form(),
            action = std::any::type_name::<A>(),
            "shared resource created"
        );

        let action: Box<dyn ErasedAction<T>> = Box::new(ActionSlot::new(action));
        let inner = Box::new(Inner {
            ref_count: AtomicUsize::new(1),
            buffer,
            action: Mutex::new(action),
            action_type: TypeId::of::<A>(),
            action_name: std::any::type_name::<A>(),
        });

        Self {
            inner: NonNull::from(Box::leak(inner)),
            _marker: PhantomData,
        }
    }

    /// Create from a raw pointer handed over by an external allocator
    ///
    /// A null `ptr` is rejected and `action` is dropped without running.
    ///
    /// # Safety
    ///
    /// Same contract as [`RawBuffer::from_raw_parts`]; `action` must reclaim
    /// the memory in the way `form` describes.
    pub unsafe fn from_raw_parts<A: Release<T>>(
        ptr: *mut T,
        len: usize,
        form: ReleaseForm,
        action: A,
    ) -> Result<Self> {
        let buffer = RawBuffer::from_raw_parts(ptr, len, form)?;
        Ok(Self::create(buffer, action))
    }

    /// Share an array allocation, freed with [`ArrayRelease`]
    pub fn from_boxed_slice(boxed: Box<[T]>) -> Self {
        Self::create(RawBuffer::from_boxed_slice(boxed), ArrayRelease)
    }

    /// Share a vector's elements, freed with [`ArrayRelease`]
    pub fn from_vec(vec: Vec<T>) -> Self {
        Self::create(RawBuffer::from_vec(vec), ArrayRelease)
    }

    fn inner(&self) -> &Inner<T> {
        // Safety: the block lives until the last handle is dropped
        unsafe { self.inner.as_ref() }
    }

    /// Number of live handles sharing this buffer
    pub fn use_count(&self) -> usize {
        self.inner().ref_count.load(Ordering::Acquire)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner().buffer.len()
    }

    /// Check if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.inner().buffer.is_empty()
    }

    /// Allocation form recorded with the buffer
    pub fn form(&self) -> ReleaseForm {
        self.inner().buffer.form()
    }

    /// Get raw pointer to the first element
    pub fn as_ptr(&self) -> *const T {
        self.inner().buffer.as_ptr()
    }

    /// View the elements
    pub fn as_slice(&self) -> &[T] {
        // Safety: not reclaimed while this handle lives; mutable views need
        // a unique handle borrowed mutably
        unsafe { self.inner().buffer.as_slice() }
    }

    /// Mutable view of the elements, only while this is the sole handle
    pub fn get_mut(&mut self) -> Option<&mut [T]> {
        if self.use_count() != 1 {
            return None;
        }
        // Safety: no other handle exists and `self` is borrowed mutably
        let buffer = unsafe { &mut (*self.inner.as_ptr()).buffer };
        Some(unsafe { buffer.as_mut_slice() })
    }

    /// Check if two handles share one allocation
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.inner == other.inner
    }

    /// Look up the stored release action by its exact type
    ///
    /// Returns `None` for any type other than the one given at creation.
    /// The guard is the single action shared by every handle, so changes made
    /// through it apply to the eventual release no matter which handle is
    /// dropped last.
    ///
    /// A mismatched type is answered without locking. A second query for the
    /// matching type, from any handle, waits until the first guard is dropped.
    pub fn query_action<A: 'static>(&self) -> Option<MappedMutexGuard<'_, A>> {
        if !self.has_action::<A>() {
            return None;
        }
        let guard = self.inner().action.lock();
        MutexGuard::try_map(guard, |action| action.action_mut::<A>()).ok()
    }

    /// Check if the stored action is exactly `A`
    pub fn has_action<A: 'static>(&self) -> bool {
        self.inner().action_type == TypeId::of::<A>()
    }

    /// Type name of the stored action
    pub fn action_type_name(&self) -> &'static str {
        self.inner().action_name
    }
}

impl<T> Clone for SharedResource<T> {
    fn clone(&self) -> Self {
        let old = self.inner().ref_count.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REF_COUNT {
            std::process::abort();
        }

        Self {
            inner: self.inner,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for SharedResource<T> {
    fn drop(&mut self) {
        // Only the handle that takes the count from 1 to 0 gets past here
        if self.inner().ref_count.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        fence(Ordering::Acquire);

        // Safety: count reached zero, no other handle can reach the block
        let inner = unsafe { Box::from_raw(self.inner.as_ptr()) };
        let Inner { buffer, action, .. } = *inner;
        let mut action = action.into_inner();

        tracing::debug!(
            len = buffer.len(),
            form = %buffer.form(),
            action = action.action_type_name(),
            "last handle dropped, running release action"
        );
        action.invoke(buffer);
    }
}

impl<T> Deref for SharedResource<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> std::fmt::Debug for SharedResource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResource")
            .field("len", &self.len())
            .field("use_count", &self.use_count())
            .field("action", &self.action_type_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{release_array, ScalarRelease};
    use crate::Error;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Action that counts invocations and frees the array
    struct CountingRelease {
        calls: Arc<AtomicUsize>,
    }

    impl Release<i32> for CountingRelease {
        fn release(&mut self, buffer: RawBuffer<i32>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            release_array(buffer);
        }
    }

    fn counting(values: Vec<i32>) -> (SharedResource<i32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = SharedResource::create(
            RawBuffer::from_vec(values),
            CountingRelease {
                calls: calls.clone(),
            },
        );
        (res, calls)
    }

    #[test]
    fn test_create_and_read() {
        init_tracing();
        let res = SharedResource::from_vec(vec![1, 2, 3]);
        assert_eq!(res.use_count(), 1);
        assert_eq!(res.len(), 3);
        assert_eq!(res.as_slice(), &[1, 2, 3]);
        assert_eq!(res[1], 2);
        assert_eq!(res.form(), ReleaseForm::Array);
    }

    #[test]
    fn test_release_runs_once_after_last_drop() {
        init_tracing();
        let (a, calls) = counting(vec![1, 2, 3]);
        let b = a.clone();
        let c = b.clone();
        assert_eq!(a.use_count(), 3);
        assert!(SharedResource::ptr_eq(&a, &c));

        drop(a);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(c);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(b.use_count(), 1);
        drop(b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_only_when_no_handles_left() {
        // 按不同的 clone/drop 序列检查：释放恰好发生在最后一个句柄消失时
        let patterns: &[&[bool]] = &[
            &[true, true, false, false, false],
            &[false],
            &[true, false, true, false, false],
            &[true, true, true, false, true, false, false, false, false],
        ];

        for pattern in patterns {
            let live = Arc::new(AtomicUsize::new(1));
            let fired = Arc::new(AtomicBool::new(false));
            let (live2, fired2) = (live.clone(), fired.clone());
            let action = move |buf: RawBuffer<u8>| {
                assert_eq!(live2.load(Ordering::SeqCst), 0);
                assert!(!fired2.swap(true, Ordering::SeqCst));
                release_array(buf);
            };

            let mut handles = vec![SharedResource::create(RawBuffer::from_vec(vec![0u8; 16]), action)];
            for &clone in pattern.iter() {
                if clone {
                    let h = handles[0].clone();
                    live.fetch_add(1, Ordering::SeqCst);
                    handles.push(h);
                } else {
                    let h = handles.pop().unwrap();
                    live.fetch_sub(1, Ordering::SeqCst);
                    drop(h);
                }
                assert_eq!(fired.load(Ordering::SeqCst), handles.is_empty());
                if let Some(h) = handles.first() {
                    assert_eq!(h.use_count(), handles.len());
                }
            }
            assert!(handles.is_empty());
            assert!(fired.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn test_query_exact_type_only() {
        let (res, _calls) = counting(vec![1]);
        assert!(res.query_action::<CountingRelease>().is_some());
        assert!(res.query_action::<ArrayRelease>().is_none());
        assert!(res.query_action::<ScalarRelease>().is_none());
        assert!(res.has_action::<CountingRelease>());
        assert!(res.action_type_name().ends_with("CountingRelease"));

        let res = SharedResource::from_vec(vec![1u8]);
        assert!(res.query_action::<ArrayRelease>().is_some());
        assert!(res.query_action::<fn(RawBuffer<u8>)>().is_none());
    }

    #[test]
    fn test_query_fn_pointer_action() {
        let action: fn(RawBuffer<i32>) = release_array::<i32>;
        let res = SharedResource::create(RawBuffer::from_vec(vec![1, 2, 3]), action);
        assert!(res.query_action::<fn(RawBuffer<i32>)>().is_some());
        assert!(res.query_action::<ArrayRelease>().is_none());
    }

    #[test]
    fn test_mutated_action_is_shared() {
        struct Tagged {
            tag: &'static str,
            seen: Arc<Mutex<Vec<&'static str>>>,
        }

        impl Release<u32> for Tagged {
            fn release(&mut self, buffer: RawBuffer<u32>) {
                self.seen.lock().push(self.tag);
                release_array(buffer);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = SharedResource::create(
            RawBuffer::from_vec(vec![1u32, 2]),
            Tagged {
                tag: "original",
                seen: seen.clone(),
            },
        );
        let b = a.clone();

        // 通过 b 修改，a 最后释放时也应该看到
        b.query_action::<Tagged>().unwrap().tag = "changed";
        drop(b);
        assert_eq!(a.query_action::<Tagged>().unwrap().tag, "changed");
        drop(a);
        assert_eq!(*seen.lock(), vec!["changed"]);
    }

    #[test]
    fn test_null_pointer_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let res = unsafe {
            SharedResource::from_raw_parts(
                std::ptr::null_mut(),
                3,
                ReleaseForm::Array,
                CountingRelease {
                    calls: calls.clone(),
                },
            )
        };
        assert!(matches!(res, Err(Error::NullBuffer)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_raw_parts_with_external_allocation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let boxed: Box<[i32]> = vec![4, 5, 6].into_boxed_slice();
        let len = boxed.len();
        let ptr = Box::into_raw(boxed) as *mut i32;
        let res = unsafe {
            SharedResource::from_raw_parts(
                ptr,
                len,
                ReleaseForm::Array,
                CountingRelease {
                    calls: calls.clone(),
                },
            )
        }
        .unwrap();
        assert_eq!(res.as_slice(), &[4, 5, 6]);
        drop(res);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_mut_requires_unique_handle() {
        let mut a = SharedResource::from_vec(vec![1, 2, 3]);
        a.get_mut().unwrap()[0] = 10;
        let b = a.clone();
        assert!(a.get_mut().is_none());
        drop(b);
        assert_eq!(a.get_mut().unwrap(), &mut [10, 2, 3]);
    }

    #[test]
    fn test_elements_dropped_with_release() {
        struct Elem(Arc<AtomicUsize>);
        impl Drop for Elem {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let a = SharedResource::from_vec((0..4).map(|_| Elem(drops.clone())).collect());
        let b = a.clone();
        drop(a);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_scalar_buffer() {
        let res = SharedResource::create(RawBuffer::from_box(Box::new(42u64)), ScalarRelease);
        assert_eq!(res.form(), ReleaseForm::Scalar);
        assert_eq!(res.as_slice(), &[42]);
        assert!(res.has_action::<ScalarRelease>());
    }

    #[test]
    fn test_concurrent_clone_and_drop() {
        init_tracing();
        let (res, calls) = counting(vec![0; 64]);

        std::thread::scope(|s| {
            for _ in 0..8 {
                let handle = res.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        let extra = handle.clone();
                        assert_eq!(extra.len(), 64);
                        drop(extra);
                    }
                });
            }
        });

        assert_eq!(res.use_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(res);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_output() {
        let res = SharedResource::from_vec(vec![1u8, 2]);
        let text = format!("{:?}", res);
        assert!(text.contains("len: 2"));
        assert!(text.contains("use_count: 1"));
        assert!(text.contains("ArrayRelease"));
    }

    #[test]
    fn test_type_checks_while_action_borrowed() {
        let res = SharedResource::from_vec(vec![1u8, 2, 3]);
        let other = res.clone();
        let (tx, rx) = std::sync::mpsc::channel();

        // 持有 guard 时查询其他类型、检查类型名都不能阻塞
        std::thread::spawn(move || {
            let guard = res.query_action::<ArrayRelease>().unwrap();
            let answers = (
                other.has_action::<ArrayRelease>(),
                other.has_action::<ScalarRelease>(),
                res.action_type_name().ends_with("ArrayRelease"),
                res.query_action::<u32>().is_none(),
                other.query_action::<ScalarRelease>().is_none(),
                format!("{:?}", other).contains("ArrayRelease"),
            );
            drop(guard);
            tx.send(answers).unwrap();
        });

        let answers = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("type checks blocked on the borrowed action");
        assert_eq!(answers, (true, false, true, true, true, true));
    }

    #[test]
    fn test_matching_query_waits_for_guard() {
        let res = SharedResource::from_vec(vec![0u8; 4]);
        let other = res.clone();
        let guard = res.query_action::<ArrayRelease>().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        let waiter = std::thread::spawn(move || {
            let found = other.query_action::<ArrayRelease>().is_some();
            tx.send(found).unwrap();
        });

        assert!(rx.recv_timeout(std::time::Duration::from_millis(100)).is_err());
        drop(guard);
        assert!(rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap());
        waiter.join().unwrap();
    }
}
