mod admin;
mod forum;
mod tags;
mod trending;
mod views;

pub use admin::{drain_views, refresh_trending};
pub use forum::{create_category, create_thread, homepage};
pub use tags::{assign_tag, create_tag, list_tags, list_thread_tags};
pub use trending::{similar_threads, trending};
pub use views::record_view;
