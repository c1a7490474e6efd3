//! # MessageList Component
//!
//! Scrollable view of the conversation: hydrated history followed by the
//! messages sent and streamed this session.
//!
//! ## Responsibilities
//!
//! - Follow the answer while it streams, unless the user scrolled up
//! - Map mouse rows back to messages (hover, click to expand thinking)
//! - Remember per-message heights; only the reply being written is re-measured
//!
//! `MessageListState` lives in `TuiState`; `MessageList` borrows it for one frame.

use std::collections::HashSet;

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::message::ChatMessage;
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::Message;
use crate::tui::event::TuiEvent;

/// Scroll position, selection and expanded thinking sections of the chat view.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// Keep the newest content in view
    pub stick_to_bottom: bool,
    /// Message under the mouse or the cursor
    pub selected_index: Option<usize>,
    pub expanded_thinking: HashSet<usize>,
    /// Height drawn last frame
    pub viewport_height: u16,
    /// Area drawn last frame; empty while another view owns the main area
    pub viewport: Rect,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::new(),
            stick_to_bottom: true,
            selected_index: None,
            expanded_thinking: HashSet::new(),
            viewport_height: 0,
            viewport: Rect::default(),
        }
    }

    fn total_height(&self) -> u16 {
        self.layout.heights.iter().sum()
    }

    /// True when the user scrolled away from newer messages.
    pub fn has_unseen_content(&self) -> bool {
        let max_y = self.total_height().saturating_sub(self.viewport_height);
        self.scroll_state.offset().y < max_y
    }

    pub fn clamp_scroll(&mut self) {
        let max_y = self.total_height().saturating_sub(self.viewport_height);
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Bring the selected message into view, top edge first.
    pub fn scroll_to_selected(&mut self) {
        let Some(idx) = self.selected_index else {
            return;
        };
        if idx >= self.layout.prefix_heights.len() {
            return;
        }

        let item_top = if idx == 0 {
            0
        } else {
            self.layout.prefix_heights[idx - 1]
        };
        let item_bottom = self.layout.prefix_heights[idx];
        let offset_y = self.scroll_state.offset().y;

        if item_top < offset_y {
            self.scroll_state.set_offset(Position { x: 0, y: item_top });
            self.stick_to_bottom = false;
        } else if item_bottom > offset_y + self.viewport_height {
            let new_y = item_bottom.saturating_sub(self.viewport_height);
            self.scroll_state.set_offset(Position { x: 0, y: new_y });
            let max_y = self.total_height().saturating_sub(self.viewport_height);
            self.stick_to_bottom = new_y >= max_y;
        }
    }

    /// Resume following new content once scrolled all the way down.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.total_height().saturating_sub(self.viewport_height);
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: max_y,
            });
        }
    }

    /// Toggle the thinking section of a message.
    pub fn toggle_thinking(&mut self, idx: usize) {
        if !self.expanded_thinking.remove(&idx) {
            self.expanded_thinking.insert(idx);
        }
    }

    /// Which message (if any) is drawn at screen row `screen_y`.
    pub fn hit_test(&self, screen_y: u16) -> Option<usize> {
        let area = self.viewport;
        if screen_y < area.y || screen_y >= area.y + area.height {
            return None;
        }
        let content_y = (screen_y - area.y) + self.scroll_state.offset().y;
        self.layout
            .prefix_heights
            .iter()
            .position(|&bottom| content_y < bottom)
    }
}

/// Per-frame view over the conversation's render messages.
pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub messages: Vec<&'a ChatMessage>,
    pub is_requesting: bool,
    pub pulse_value: f32,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        messages: Vec<&'a ChatMessage>,
        is_requesting: bool,
        pulse_value: f32,
    ) -> Self {
        Self {
            state,
            messages,
            is_requesting,
            pulse_value,
        }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        // Last column belongs to the scrollbar
        let content_width = area.width.saturating_sub(1);
        let num_items = self.messages.len();

        let expanded = &self.state.expanded_thinking;
        let layout = &mut self.state.layout;
        let last_is_volatile = self.messages.last().is_some_and(|m| m.is_ai());
        let reusable = layout.reusable_count(
            num_items,
            content_width,
            self.is_requesting || last_is_volatile,
            expanded,
        );
        layout.heights.truncate(reusable.min(layout.heights.len()));
        for (i, message) in self.messages.iter().enumerate().skip(layout.heights.len()) {
            let is_expanded = expanded.contains(&i);
            layout
                .heights
                .push(Message::calculate_height(message, is_expanded, content_width));
        }
        layout.rebuild_prefix_heights();
        layout.update_metadata(num_items, content_width, expanded);

        let total_height: u16 = self.state.layout.heights.iter().sum();

        self.state.viewport_height = area.height;
        self.state.viewport = area;
        if !self.state.stick_to_bottom {
            self.state.clamp_scroll();
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible_range = self.state.layout.visible_range(scroll_offset, area.height);

        // Only messages overlapping the viewport are drawn
        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Always)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset: u16 = if visible_range.start > 0 {
            self.state.layout.prefix_heights[visible_range.start - 1]
        } else {
            0
        };

        for i in visible_range {
            let message = self.messages[i];
            let height = self.state.layout.heights[i];
            let is_last = i == num_items.saturating_sub(1);
            let is_selected =
                self.state.selected_index == Some(i) && !(is_last && self.is_requesting);
            let pulse_intensity = if is_last && self.is_requesting && message.is_ai() {
                self.pulse_value
            } else {
                0.0
            };

            let rect = Rect::new(0, y_offset, content_width, height);
            scroll_view.render_widget(
                Message::new(
                    message,
                    is_selected,
                    self.state.expanded_thinking.contains(&i),
                    pulse_intensity,
                ),
                rect,
            );
            y_offset += height;
        }

        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

/// Wheel and page keys scroll the persistent state directly.
impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            _ => {}
        }
        None
    }
}

/// Message heights for the current width, plus running bottoms for hit testing.
pub struct LayoutCache {
    pub heights: Vec<u16>,
    pub prefix_heights: Vec<u16>,
    message_count: usize,
    content_width: u16,
    /// Tracks expanded thinking sections so heights are invalidated on toggle.
    cached_expanded: HashSet<usize>,
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutCache {
    pub fn new() -> Self {
        Self {
            heights: Vec::new(),
            prefix_heights: Vec::new(),
            message_count: 0,
            content_width: 0,
            cached_expanded: HashSet::new(),
        }
    }

    /// Drop every cached height (messages were replaced, not appended).
    pub fn invalidate(&mut self) {
        self.heights.clear();
        self.prefix_heights.clear();
        self.message_count = 0;
    }

    /// How many leading cached heights are still valid. A volatile last
    /// message (an answer that may still grow) is always re-measured.
    pub fn reusable_count(
        &self,
        message_count: usize,
        content_width: u16,
        last_is_volatile: bool,
        expanded: &HashSet<usize>,
    ) -> usize {
        if self.content_width != content_width || self.heights.is_empty() {
            return 0;
        }
        if message_count < self.message_count {
            return 0;
        }
        if expanded != &self.cached_expanded
            && let Some(earliest) = expanded.symmetric_difference(&self.cached_expanded).copied().min()
        {
            return earliest.min(self.message_count);
        }
        let stable = self.message_count.min(message_count);
        if last_is_volatile && stable == message_count {
            stable.saturating_sub(1)
        } else {
            stable
        }
    }

    pub fn update_metadata(
        &mut self,
        message_count: usize,
        content_width: u16,
        expanded: &HashSet<usize>,
    ) {
        self.message_count = message_count;
        self.content_width = content_width;
        self.cached_expanded = expanded.clone();
    }

    pub fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc += h;
                Some(*acc)
            })
            .collect();
    }

    pub fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());

        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn cache_with(heights: Vec<u16>, width: u16) -> LayoutCache {
        let mut cache = LayoutCache::new();
        let count = heights.len();
        cache.heights = heights;
        cache.rebuild_prefix_heights();
        cache.update_metadata(count, width, &HashSet::new());
        cache
    }

    #[test]
    fn test_layout_cache_reusable() {
        let cache = cache_with(vec![1; 5], 80);
        let none = HashSet::new();

        assert_eq!(cache.reusable_count(5, 80, false, &none), 5);
        // Appended messages: the cached ones stay valid
        assert_eq!(cache.reusable_count(7, 80, false, &none), 5);
        // Width changed
        assert_eq!(cache.reusable_count(5, 40, false, &none), 0);
        // Fewer messages means the list was replaced
        assert_eq!(cache.reusable_count(3, 80, false, &none), 0);
    }

    #[test]
    fn test_streaming_last_message_is_remeasured() {
        let cache = cache_with(vec![3, 5], 80);
        assert_eq!(cache.reusable_count(2, 80, true, &HashSet::new()), 1);
    }

    #[test]
    fn test_expansion_toggle_invalidates_from_index() {
        let cache = cache_with(vec![3, 3, 3], 80);
        let expanded: HashSet<usize> = [1].into_iter().collect();
        assert_eq!(cache.reusable_count(3, 80, false, &expanded), 1);
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let mut cache = cache_with(vec![3, 3], 80);
        cache.invalidate();
        assert_eq!(cache.reusable_count(2, 80, false, &HashSet::new()), 0);
    }

    #[test]
    fn test_visible_range_and_hit_test() {
        let mut state = MessageListState::new();
        state.layout = cache_with(vec![3, 4, 5], 80);
        state.viewport = Rect::new(0, 1, 80, 20);
        state.viewport_height = 20;

        assert_eq!(state.layout.visible_range(0, 20), 0..3);
        assert_eq!(state.hit_test(0), None); // title row
        assert_eq!(state.hit_test(1), Some(0));
        assert_eq!(state.hit_test(4), Some(1));
        assert_eq!(state.hit_test(8), Some(2));
        assert_eq!(state.hit_test(13), None); // below content
    }

    #[test]
    fn test_toggle_thinking() {
        let mut state = MessageListState::new();
        state.toggle_thinking(2);
        assert!(state.expanded_thinking.contains(&2));
        state.toggle_thinking(2);
        assert!(state.expanded_thinking.is_empty());
    }

    #[test]
    fn test_render_lists_messages() {
        let user = ChatMessage::local_user("u1".into(), "What is Rust?".into(), vec![]);
        let mut answer = ChatMessage::pending_ai("a1".into());
        answer.content = "A language.".into();

        let mut state = MessageListState::new();
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                MessageList::new(&mut state, vec![&user, &answer], false, 0.0).render(f, f.area());
            })
            .unwrap();

        let text = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>();
        assert!(text.contains("What is Rust?"));
        assert!(text.contains("A language."));
        assert_eq!(state.layout.heights, vec![3, 3]);
    }
}
