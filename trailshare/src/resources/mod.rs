//! API representations of the entities, their create/update payloads and
//! the listing configuration each exposes to the query layer.

pub mod blog;
pub mod booking;
pub mod equipment;
pub mod image;
pub mod profile;
