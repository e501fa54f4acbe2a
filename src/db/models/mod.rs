//! Row types and request/response shapes for the relational store.

pub mod sees;
pub mod user;

pub use sees::*;
pub use user::*;
