//! Per-request context, readable from anywhere inside the request's task.

use std::future::Future;

tokio::task_local! {
    static REQUEST: RequestContext;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub path: String,
}

/// Run `fut` with `ctx` as the active request context.
pub async fn scope<F: Future>(ctx: RequestContext, fut: F) -> F::Output {
    REQUEST.scope(ctx, fut).await
}

pub fn current() -> Option<RequestContext> {
    REQUEST.try_with(Clone::clone).ok()
}

/// Path of the request being handled, or `None` outside a request.
pub fn current_request_path() -> Option<String> {
    REQUEST.try_with(|ctx| ctx.path.clone()).ok()
}
