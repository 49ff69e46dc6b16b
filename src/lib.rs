pub mod core;
pub mod models;
pub mod theme;
pub mod utils;

// Re-export commonly used types and traits
pub use crate::core::{Actor, Blog, BlogError, FeedScope, Page, PageRequest, Server};
pub use crate::models::{Comment, Config, Follow, Group, Post, User};
pub use crate::theme::renderer::ThemeRenderer;
