//! Stored consent preferences, one record per domain and visitor

pub mod models;
pub mod store;

pub use models::{ConsentCategories, ConsentRecord};
pub use store::ConsentStore;
