use crate::mode::{Mode, ModeConfig};
use crate::stream::StringStream;
use core_text::StyleTag;

/// Leaves every line unstyled. Also the fallback for unknown mode names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl Mode for PlainText {
    type State = ();

    fn name(&self) -> &str {
        "plain"
    }

    fn start_state(&self, _config: &ModeConfig) {}

    fn token(&self, stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleTag> {
        stream.skip_to_end();
        None
    }
}
