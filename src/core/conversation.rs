//! # Conversation List
//!
//! Keeps the user's conversations and which one is active. A conversation
//! the user just started has no server id yet; it gets a temporary id until
//! the first streamed event reports the real one.

use chrono::Utc;

use crate::api::ConversationItem;

pub const TEMP_ID_PREFIX: &str = "temp_";
pub const DEFAULT_CONVERSATION_NAME: &str = "New conversation";

pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<ConversationItem> for Conversation {
    fn from(item: ConversationItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

impl Conversation {
    pub fn is_temp(&self) -> bool {
        is_temp_id(&self.id)
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            DEFAULT_CONVERSATION_NAME
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    pub items: Vec<Conversation>,
    pub active_id: Option<String>,
}

impl ConversationList {
    pub fn active(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == id)
    }

    /// Replace the list with what the server returned. Local temporary
    /// conversations are kept at the front since the server doesn't know them.
    pub fn replace_from_server(&mut self, items: Vec<ConversationItem>) {
        let mut merged: Vec<Conversation> =
            self.items.drain(..).filter(Conversation::is_temp).collect();
        merged.extend(
            items
                .into_iter()
                .map(Conversation::from)
                .filter(|c| !c.is_temp()),
        );
        self.items = merged;
    }

    /// Add a temporary conversation at the top and return its id.
    pub fn add_temp(&mut self) -> String {
        let now = Utc::now().timestamp();
        let id = new_temp_id();
        self.items.insert(
            0,
            Conversation {
                id: id.clone(),
                name: DEFAULT_CONVERSATION_NAME.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.items.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove a conversation. If it was active, nothing is active afterwards.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|c| c.id != id);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = None;
        }
        self.items.len() != before
    }

    /// Swap a temporary id for the id the server assigned.
    pub fn promote(&mut self, temp_id: &str, server_id: &str) -> bool {
        if !is_temp_id(temp_id) || is_temp_id(server_id) {
            return false;
        }
        let Some(c) = self.items.iter_mut().find(|c| c.id == temp_id) else {
            return false;
        };
        c.id = server_id.to_string();
        if self.active_id.as_deref() == Some(temp_id) {
            self.active_id = Some(server_id.to_string());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_item(id: &str, name: &str) -> ConversationItem {
        ConversationItem {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_temp_ids_are_recognised() {
        let id = new_temp_id();
        assert!(is_temp_id(&id));
        assert!(!is_temp_id("4f5d-real"));
        assert_ne!(new_temp_id(), id);
    }

    #[test]
    fn test_replace_keeps_temp_items_first() {
        let mut list = ConversationList::default();
        let temp = list.add_temp();
        list.replace_from_server(vec![server_item("a", "A"), server_item("b", "B")]);
        let ids: Vec<&str> = list.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![temp.as_str(), "a", "b"]);

        list.replace_from_server(vec![server_item("c", "C")]);
        let ids: Vec<&str> = list.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![temp.as_str(), "c"]);
    }

    #[test]
    fn test_promote_updates_active() {
        let mut list = ConversationList::default();
        let temp = list.add_temp();
        list.active_id = Some(temp.clone());
        assert!(list.promote(&temp, "server-1"));
        assert_eq!(list.active_id.as_deref(), Some("server-1"));
        assert_eq!(list.items[0].id, "server-1");
        assert!(!list.promote("server-1", "server-2"));
    }

    #[test]
    fn test_remove_active_clears_selection() {
        let mut list = ConversationList::default();
        list.replace_from_server(vec![server_item("a", "A"), server_item("b", "B")]);
        list.active_id = Some("a".into());
        assert!(list.remove("a"));
        assert!(list.active_id.is_none());
        assert!(!list.remove("missing"));
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn test_display_name_falls_back_to_default() {
        let mut list = ConversationList::default();
        list.replace_from_server(vec![server_item("a", "")]);
        assert_eq!(list.items[0].display_name(), DEFAULT_CONVERSATION_NAME);
        assert!(list.rename("a", "Trip plan"));
        assert_eq!(list.get("a").unwrap().display_name(), "Trip plan");
    }
}
