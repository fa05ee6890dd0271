//! Sea-ORM entities, one module per table.

pub mod account;
pub mod blog_post;
pub mod booking;
pub mod equipment;
pub mod equipment_image;
pub mod favorite;
pub mod profile;
pub mod recently_viewed;
pub mod user_role;
