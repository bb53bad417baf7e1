//! Book catalogue endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use shelfctl_core::BookDraft;

use crate::db::Book;
use crate::error::ApiError;
use crate::http::extractors::{JsonBody, ValidId};
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub title: String,
    pub author: String,
}

impl BookRequest {
    fn validate(&self) -> Result<BookDraft, ApiError> {
        Ok(BookDraft::new(&self.title, &self.author)?)
    }
}

/// GET /books
async fn list_books(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.books.list().await?))
}

/// GET /books/{id}
async fn get_book(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.books.get(id).await?))
}

/// POST /books
async fn create_book(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<BookRequest>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    let draft = req.validate()?;
    let book = state.books.create(&draft).await?;
    tracing::debug!(book_id = book.id, "book created");
    Ok((StatusCode::CREATED, Json(book)))
}

/// PUT /books/{id}
async fn update_book(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
    JsonBody(req): JsonBody<BookRequest>,
) -> Result<Json<Book>, ApiError> {
    let draft = req.validate()?;
    Ok(Json(state.books.update(id, &draft).await?))
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

/// DELETE /books/{id}
async fn delete_book(
    State(state): State<Arc<AppState>>,
    ValidId(id): ValidId,
) -> Result<Json<DeletedResponse>, ApiError> {
    state.books.delete(id).await?;
    Ok(Json(DeletedResponse {
        message: "book deleted",
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route(
            "/books/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::http::routes::test_util::{app, send};

    #[tokio::test]
    async fn crud_cycle() {
        let (app, _) = app();

        let (status, book) = send(
            &app,
            "POST",
            "/books",
            Some(r#"{"title":"Dune","author":"Frank Herbert"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = book["id"].as_i64().unwrap();
        let uri = format!("/books/{id}");

        let (status, list) = send(&app, "GET", "/books", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some(r#"{"title":"Dune Messiah","author":"Frank Herbert"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Dune Messiah");

        let (status, fetched) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, updated);

        let (status, body) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "book deleted");

        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn invalid_ids_and_drafts() {
        let (app, _) = app();

        let (status, _) = send(&app, "GET", "/books/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/books/0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/books",
            Some(r#"{"title":"   ","author":"Someone"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, _) = send(&app, "DELETE", "/books/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
