//! Service layer modules for external integrations.
//!
//! Contains the identity-provider client, the Redis cache for master
//! reference data, and the chunked configuration-document store.

pub mod cache;
pub mod identity;
pub mod masters;

pub use cache::RedisCache;
pub use identity::IdentityClient;
