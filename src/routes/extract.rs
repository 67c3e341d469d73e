//! `Json` and `Query` wrappers whose rejections use the API error body.

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// JSON request body.
#[derive(Debug, Clone, Default)]
pub struct AppJson<T>(pub T);

/// Query string.
#[derive(Debug, Clone, Default)]
pub struct AppQuery<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

impl<T, S> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(AppQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request as HttpRequest},
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        email: String,
    }

    #[derive(Debug, Deserialize)]
    struct Paging {
        page: u32,
    }

    fn json_request(content_type: Option<&str>, body: &str) -> Request {
        let mut builder = HttpRequest::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_json_body_parses() {
        let req = json_request(Some("application/json"), r#"{"email":"a@b.co"}"#);
        let AppJson(login) = AppJson::<Login>::from_request(req, &()).await.unwrap();
        assert_eq!(login.email, "a@b.co");
    }

    #[tokio::test]
    async fn test_json_rejections_are_bad_requests() {
        for req in [
            json_request(Some("application/json"), "{not json"),
            json_request(Some("application/json"), r#"{"email": 5}"#),
            json_request(None, r#"{"email":"a@b.co"}"#),
        ] {
            let err = AppJson::<Login>::from_request(req, &()).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_query_rejection_is_bad_request() {
        let (mut parts, _) = HttpRequest::builder()
            .uri("/?page=abc")
            .body(())
            .unwrap()
            .into_parts();
        let err = AppQuery::<Paging>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let (mut parts, _) = HttpRequest::builder().uri("/?page=3").body(()).unwrap().into_parts();
        let AppQuery(paging) = AppQuery::<Paging>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(paging.page, 3);
    }
}
