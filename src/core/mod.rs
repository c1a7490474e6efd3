//! # Core Application Logic
//!
//! The chat page's business logic. It knows nothing about any specific UI
//! technology and performs no I/O; effects are handed back to the caller.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No UI. Pure reducer.   │
//!                    └───────────┬─────────────┘
//!                                │ Effect
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//!     ┌────────────┐                          ┌────────────┐
//!     │    TUI     │ ──── runs effects ─────▶ │  Dify API  │
//!     │ (ratatui)  │ ◀─── result Actions ──── │  (reqwest) │
//!     └────────────┘                          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all chat state in one place
//! - [`action`]: The `Action`/`Effect` enums and the `update()` reducer
//! - [`think`]: `<think>` block extraction
//! - [`history`]: turning `GET /messages` items into renderable messages
//! - [`form`]: input-form gating
//! - [`conversation`]: conversation list with temporary ids
//! - [`config`]: `~/.dify-chat/config.toml` and override resolution
//! - [`app_store`]: persisted app list for multi-app mode

pub mod action;
pub mod app_store;
pub mod config;
pub mod conversation;
pub mod form;
pub mod history;
pub mod message;
pub mod state;
pub mod think;

pub use action::{Action, Effect, update};
pub use state::App;
