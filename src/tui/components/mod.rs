//! # TUI Components
//!
//! This module contains all UI components for the terminal interface.
//!
//! ## Component Architecture
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Display components that receive all data as parameters:
//! - `TitleBar`: app name, active conversation and status
//! - `Message`: a single chat message with thinking, tools, files and sources
//! - `Placeholder`: app intro, opening statement, starter questions, input form
//!
//! ### Stateful Components (Event-Driven)
//!
//! Components that manage local state and emit events:
//! - `InputBox`: multi-line message editor
//! - `MessageList`: scrollable conversation view with layout caching
//! - `ConversationPicker` / `AppPicker`: Ctrl+O and Ctrl+A overlays
//!
//! Stateful components keep their state in a struct owned by `TuiState` and
//! are rebuilt each frame as a thin wrapper borrowing that state.
//!
//! ## Module Structure
//!
//! ```text
//! components/
//! ├── mod.rs                (this file)
//! ├── title_bar.rs          (Top status bar)
//! ├── message.rs            (Single message renderer)
//! ├── message_list.rs       (Scrollable message container)
//! ├── input_box.rs          (Message editor)
//! ├── placeholder.rs        (Intro screen and input form)
//! ├── conversation_list.rs  (Conversation overlay)
//! └── app_picker.rs         (App overlay)
//! ```

use ratatui::layout::{Constraint, Layout, Rect};

mod title_bar;
pub use title_bar::TitleBar;

pub mod app_picker;
pub mod conversation_list;
pub mod input_box;
pub mod message;
pub mod message_list;
pub mod placeholder;

pub use app_picker::{AppPicker, AppPickerEvent, AppPickerState};
pub use conversation_list::{ConversationEvent, ConversationListState, ConversationPicker};
pub use input_box::{InputBox, InputEvent};
pub use message_list::{MessageList, MessageListState};
pub use placeholder::{FormEvent, FormState, Placeholder};

/// Compute a centered rect using percentage of the outer rect.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, outer: Rect) -> Rect {
    let [_, center_v, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(outer);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(center_v);
    center
}
