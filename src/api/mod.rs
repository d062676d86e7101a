//! API response envelopes

pub mod response;

#[allow(unused_imports)]
pub use response::{DataResponse, MessageResponse};
