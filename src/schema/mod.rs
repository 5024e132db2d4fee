//! Plain data types shared by the runtime and its hosts.

pub mod event;
pub mod passage;
pub mod story_data;
