//! Library surface of the Keyfront API, exposed so integration tests can
//! build the router against a throwaway database.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, UserId};
