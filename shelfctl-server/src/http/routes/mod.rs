//! Route modules, one per resource

pub mod auth;
pub mod books;
pub mod health;

#[cfg(test)]
pub(crate) mod test_util {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use shelfctl_core::MIN_WORK_FACTOR;
    use tower::ServiceExt;

    use crate::db::memory::MemoryStore;
    use crate::http::{build_router, AppState};

    pub fn app() -> (Router, MemoryStore) {
        let store = MemoryStore::new();
        let router = build_router(AppState::in_memory(&store, MIN_WORK_FACTOR));
        (router, store)
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_owned()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}
