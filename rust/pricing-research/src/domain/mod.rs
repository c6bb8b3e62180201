//! Core domain models.
//!
//! Research requests coming in, product records going to and from the store,
//! and the response shape returned to callers.

pub mod product;
pub mod request;

pub use product::*;
pub use request::*;
