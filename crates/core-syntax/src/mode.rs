//! The tokenizer contract.
//!
//! Modes are written against the typed [`Mode`] trait. The highlighter works
//! with [`DynMode`], the object-safe form that stores state as an
//! [`OpaqueState`] so it can live on buffer lines.

use crate::stream::StringStream;
use core_text::{OpaqueState, StyleTag};
use std::fmt;

/// Settings a mode may consult when creating state or computing indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeConfig {
    pub indent_unit: usize,
    pub tab_size: usize,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            indent_unit: 2,
            tab_size: 4,
        }
    }
}

pub trait Mode: 'static {
    /// Per-line tokenizer state. `Clone` is the copy capability the
    /// highlighter relies on; equality drives early exit.
    type State: Clone + PartialEq + fmt::Debug + 'static;

    fn name(&self) -> &str;

    fn start_state(&self, config: &ModeConfig) -> Self::State;

    /// Consume one token from `stream` (at least one byte) and return its style.
    fn token(&self, stream: &mut StringStream<'_>, state: &mut Self::State) -> Option<StyleTag>;

    /// Indentation column for a line starting with `text_after`, given the
    /// state before that line. `None` means the mode has no opinion.
    fn indent(&self, _state: &Self::State, _text_after: &str, _config: &ModeConfig) -> Option<usize> {
        None
    }

    /// Characters that trigger re-indentation of the current line when typed.
    fn electric_chars(&self) -> &str {
        ""
    }

    /// Called for empty lines in place of `token`.
    fn blank_line(&self, _state: &mut Self::State) {}
}

/// Object-safe mode, implemented for every [`Mode`].
pub trait DynMode {
    fn name(&self) -> &str;
    fn start_state(&self, config: &ModeConfig) -> OpaqueState;
    fn token(&self, stream: &mut StringStream<'_>, state: &mut OpaqueState) -> Option<StyleTag>;
    fn indent(&self, state: &OpaqueState, text_after: &str, config: &ModeConfig) -> Option<usize>;
    fn electric_chars(&self) -> &str;
    fn blank_line(&self, state: &mut OpaqueState);
}

impl<M: Mode> DynMode for M {
    fn name(&self) -> &str {
        Mode::name(self)
    }

    fn start_state(&self, config: &ModeConfig) -> OpaqueState {
        OpaqueState::new(Mode::start_state(self, config))
    }

    fn token(&self, stream: &mut StringStream<'_>, state: &mut OpaqueState) -> Option<StyleTag> {
        match state.downcast_mut::<M::State>() {
            Some(state) => Mode::token(self, stream, state),
            // state from another mode; treat the rest of the line as plain text
            None => {
                stream.skip_to_end();
                None
            }
        }
    }

    fn indent(&self, state: &OpaqueState, text_after: &str, config: &ModeConfig) -> Option<usize> {
        Mode::indent(self, state.downcast_ref::<M::State>()?, text_after, config)
    }

    fn electric_chars(&self) -> &str {
        Mode::electric_chars(self)
    }

    fn blank_line(&self, state: &mut OpaqueState) {
        if let Some(state) = state.downcast_mut::<M::State>() {
            Mode::blank_line(self, state);
        }
    }
}
