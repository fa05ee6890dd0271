// Listing resources through the shared query layer

pub mod traits;

pub use traits::{ListableResource, Page, find_by_id, list_page};
