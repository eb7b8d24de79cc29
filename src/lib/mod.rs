//! Content tooling for a blog whose posts live in a GitHub repository:
//! Markdown rendering, the post index, and publishing through the Git Data
//! API.

pub mod article;
pub mod blog_index;
pub mod config;
pub mod github;
pub mod markdown;
pub mod pipeline;
pub mod post;
pub mod publish;
pub mod templates;
pub mod transformer;
pub mod types;
pub mod utils;
