//! Type-erased release action storage

use crate::buffer::RawBuffer;
use crate::release::Release;
use std::any::{Any, TypeId};

/// Object-safe view of a stored release action
pub(crate) trait ErasedAction<T>: Send {
    /// Run the action on the buffer
    fn invoke(&mut self, buffer: RawBuffer<T>);

    /// Identity of the concrete action type
    fn action_type_id(&self) -> TypeId;

    /// Name of the concrete action type
    fn action_type_name(&self) -> &'static str;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Adapter holding one concrete action
pub(crate) struct ActionSlot<A> {
    action: A,
}

impl<A> ActionSlot<A> {
    pub(crate) fn new(action: A) -> Self {
        Self { action }
    }
}

impl<T, A: Release<T>> ErasedAction<T> for ActionSlot<A> {
    fn invoke(&mut self, buffer: RawBuffer<T>) {
        self.action.release(buffer)
    }

    fn action_type_id(&self) -> TypeId {
        TypeId::of::<A>()
    }

    fn action_type_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.action
    }
}

impl<T> dyn ErasedAction<T> {
    /// Check if the stored action is exactly `A`
    pub(crate) fn is<A: 'static>(&self) -> bool {
        self.action_type_id() == TypeId::of::<A>()
    }

    /// Recover the stored action, only on an exact type match
    pub(crate) fn action_mut<A: 'static>(&mut self) -> Option<&mut A> {
        if !self.is::<A>() {
            return None;
        }
        self.as_any_mut().downcast_mut::<A>()
    }
}
