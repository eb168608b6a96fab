//! Built-in modes.

mod clike;
mod plain;

pub use clike::{CLike, CLikeState};
pub use plain::PlainText;
