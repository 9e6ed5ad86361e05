//! Validated JSON extractor - Combines deserialization with validation.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::AppError;

/// JSON body extractor that runs `validator` rules after deserializing.
///
/// Both malformed JSON and failed rules reject with a 400
/// [`AppError::Validation`] naming the offending fields.
///
/// ```rust,ignore
/// async fn register(ValidatedJson(payload): ValidatedJson<RegisterRequest>) {
///     // payload.username already matches USERNAME_REGEX
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::validation(format_validation_errors(&e)))?;

        Ok(ValidatedJson(value))
    }
}

/// Format validation errors as `field: message` pairs, sorted by field
fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: is invalid", field),
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
        #[validate(range(min = 1))]
        count: u32,
    }

    async fn extract(body: &'static str) -> Result<ValidatedJson<Payload>, AppError> {
        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        ValidatedJson::<Payload>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_valid_payload_passes() {
        let ValidatedJson(payload) = extract(r#"{"name":"alice","count":2}"#).await.unwrap();
        assert_eq!(payload.name, "alice");
        assert_eq!(payload.count, 2);
    }

    #[tokio::test]
    async fn test_rule_failures_listed_by_field() {
        let Err(AppError::Validation(message)) = extract(r#"{"name":"al","count":0}"#).await
        else {
            panic!("expected a validation error");
        };
        assert_eq!(message, "count: is invalid, name: too short");
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let result = extract(r#"{"name":"#).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
