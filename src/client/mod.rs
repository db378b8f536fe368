//! HTTP Client Modules
//!
//! Outbound HTTP access to the point history and ledger services.

pub mod error;
pub mod point_api;
pub mod pool;
pub mod types;

pub use error::{ClientError, ClientResult};
pub use point_api::PointApiClient;
pub use pool::{ConnectionLimiter, ConnectionPermit};
pub use types::ApiResponse;
