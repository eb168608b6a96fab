//! Type-erased tokenizer state cached on each line.
//!
//! Modes own their state type; the buffer only needs to copy it, compare it
//! and hand it back. The copy capability is expressed as a plain `Clone`
//! bound, so a state can never hold a non-copyable resource. Modes that want
//! dynamic state can use plain mapping/sequence values (`serde_json::Value`
//! satisfies the bounds).

use std::any::Any;
use std::fmt;

/// Object-safe view of a tokenizer state. Implemented for every
/// `Clone + PartialEq + Debug + 'static` type.
pub trait ModeState: Any + fmt::Debug {
    fn clone_box(&self) -> Box<dyn ModeState>;
    fn eq_state(&self, other: &dyn ModeState) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> ModeState for T
where
    T: Any + Clone + PartialEq + fmt::Debug,
{
    fn clone_box(&self) -> Box<dyn ModeState> {
        Box::new(self.clone())
    }

    fn eq_state(&self, other: &dyn ModeState) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owned, independently mutable tokenizer state.
pub struct OpaqueState(Box<dyn ModeState>);

impl OpaqueState {
    pub fn new<T: ModeState>(state: T) -> Self {
        Self(Box::new(state))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.as_any_mut().downcast_mut::<T>()
    }
}

impl Clone for OpaqueState {
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl PartialEq for OpaqueState {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_state(other.0.as_ref())
    }
}

impl fmt::Debug for OpaqueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
