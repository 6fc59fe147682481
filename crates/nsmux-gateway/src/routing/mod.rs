//! Name routing across namespace boundaries
//!
//! - `connection` - `RoutingConnection`, the name-translating connection
//! - `narrow` - `cd` and `narrow_to_namespace`, the only ways to open a
//!   routing scope over an existing connection
//! - `error` - delegate error translation

mod connection;
mod error;
mod narrow;

pub use connection::RoutingConnection;
pub use error::normalize_delegate_error;
pub use narrow::{cd, narrow_to_namespace};
