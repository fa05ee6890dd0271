//! Accounts, tokens and the extractors handlers use to identify the caller.

pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{CurrentUser, MaybeUser, load_roles};
pub use jwt::{Claims, TokenService};
pub use password::{hash_password, verify_password};
