use ratatui::Frame;
use ratatui::layout::Rect;

/// Something drawn into a region of the chat screen.
///
/// Implementors are built per frame from borrowed app data and, for the
/// stateful ones, a `&mut` to state owned by `TuiState`. Rendering may
/// update that state (measured heights, scroll offsets, list selection).
pub trait Component {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// State that reacts to input and may report what the user asked for.
pub trait EventHandler {
    /// What the owner is told, e.g. "open this conversation".
    type Event;

    /// `None` when the event was consumed locally or ignored.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}
