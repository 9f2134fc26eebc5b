pub mod api;
pub mod models;

pub use models::{Like, Message, ProfileStats, User, UserProfile};
