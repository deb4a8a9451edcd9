//! # Repository Modules
//!
//! Each repository owns the SQL for one aggregate and scopes every query
//! to the tenant namespace it was created for. Repositories are created
//! by [`crate::router::StoreHandle`] accessors, never constructed with a
//! foreign tenant id by callers.

pub mod inventory;
pub mod product;
pub mod returns;
pub mod sale;
pub mod shop;
pub mod user;
