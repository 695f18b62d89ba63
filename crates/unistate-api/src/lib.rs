// unistate-api: Async Rust client for UniFi-style controller REST APIs

pub mod auth;
pub mod error;
pub mod rest;
pub mod transport;

pub use auth::Credentials;
pub use error::Error;
pub use rest::RestClient;
pub use transport::{TlsMode, TransportConfig};
