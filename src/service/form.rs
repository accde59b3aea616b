//! Request form parsing.
//!
//! Callers post either `application/x-www-form-urlencoded` or
//! `multipart/form-data` (a browser `FormData`). Both land in
//! [`LocatorForm`].

use crate::error::ServiceError;
use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use std::collections::HashMap;

/// Fields accepted by the document endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorForm {
    /// Presigned URL of the source document. Never blank.
    pub presigned_url: String,
    /// Optional rendering DPI override. Only `/split-pdf` accepts it; `/ocr`
    /// answers 400 when it is present.
    pub dpi: Option<u32>,
}

impl LocatorForm {
    /// Validate raw form fields.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let presigned_url = fields
            .get("presigned_url")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("presigned_url is required".into()))?
            .to_string();

        let dpi = match fields.get("dpi").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                ServiceError::InvalidRequest(format!("dpi must be a positive integer, got '{raw}'"))
            })?),
            None => None,
        };

        Ok(Self { presigned_url, dpi })
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

async fn multipart_fields(mut multipart: Multipart) -> Result<HashMap<String, String>, ServiceError> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
        fields.insert(name, value);
    }
    Ok(fields)
}

#[async_trait]
impl<S> FromRequest<S> for LocatorForm
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let fields = if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
            multipart_fields(multipart).await?
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
            fields
        };
        LocatorForm::from_fields(&fields)
    }
}
