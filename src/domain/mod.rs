//! Domain types and pure business logic
//!
//! Everything in here is side-effect free: the case record model, the
//! quote/bookkeeping derivations, the workflow validation engine, the
//! dashboard filters, and the import/export transforms. Routes compose
//! these with persistence.

pub mod auth;
pub mod cases;
pub mod dashboard;
pub mod export;
pub mod import;
pub mod quote;
pub mod validate;
pub mod workflow;
