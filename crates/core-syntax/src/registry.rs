use crate::mode::{DynMode, Mode};
use crate::modes::{CLike, PlainText};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Named collection of modes.
#[derive(Clone, Default)]
pub struct ModeRegistry {
    modes: HashMap<String, Rc<dyn DynMode>>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `plain` and `clike`.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.define(PlainText);
        reg.define(CLike::default());
        reg
    }

    /// Register `mode` under its own name, replacing any previous definition.
    pub fn define<M: Mode>(&mut self, mode: M) {
        let name = Mode::name(&mode).to_owned();
        debug!(target: "syntax.registry", mode = %name, "define");
        self.modes.insert(name, Rc::new(mode));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    /// Look up a mode. Unknown names fall back to plain text with a warning.
    pub fn get(&self, name: &str) -> Rc<dyn DynMode> {
        match self.modes.get(name) {
            Some(mode) => Rc::clone(mode),
            None => {
                warn!(target: "syntax.registry", mode = name, "unknown_mode_fallback_plain");
                Rc::new(PlainText)
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ModeRegistry").field("modes", &names).finish()
    }
}
