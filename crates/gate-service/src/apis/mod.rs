//! Request processing behind the HTTP routes.

pub mod admin;
pub mod authorize;
pub mod nonces;
