pub mod blacklist;
pub mod error_code;
pub mod health;
pub mod helpers;
pub mod postback;
pub mod routes;
pub mod tracking;
pub mod types;

pub use error_code::ErrorCode;
pub use routes::configure;
pub use types::ApiResponse;
