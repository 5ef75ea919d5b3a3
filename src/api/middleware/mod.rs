pub mod caller_auth;
pub mod request_id;

pub use caller_auth::{Caller, CallerAuth};
pub use request_id::{RequestId, RequestIdMiddleware};
