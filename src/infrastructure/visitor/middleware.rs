use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::domain::visitor::{identify, VisitorId, VISITOR_ID_HEADER};
use crate::infrastructure::config::Config;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Visitor context injected into request extensions
#[derive(Debug, Clone)]
pub struct CurrentVisitor(pub VisitorId);

/// Resolve the visitor key every limiter and conversation call is scoped to.
/// Never rejects a request: unidentifiable callers share the anonymous key.
pub async fn visitor_middleware(
    State(config): State<Arc<Config>>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let client_token = headers.get(VISITOR_ID_HEADER).and_then(|v| v.to_str().ok());
    let forwarded_for = if config.trust_forwarded_for {
        headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok())
    } else {
        None
    };
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let visitor = identify(client_token, forwarded_for, peer);
    tracing::debug!(visitor = %visitor, "Visitor identified");

    request.extensions_mut().insert(CurrentVisitor(visitor));
    next.run(request).await
}
