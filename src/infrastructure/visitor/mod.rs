pub mod middleware;
pub mod request_id;

pub use middleware::{visitor_middleware, CurrentVisitor};
pub use request_id::{request_id_middleware, RequestId, X_REQUEST_ID};
