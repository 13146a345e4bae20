//! GitHub webhook validation.
//!
//! Checks, in order: method, event/delivery headers, signature presence,
//! content type, then the HMAC-SHA256 signature over the raw body.

use axum::http::{header, HeaderMap, Method};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("405 Method not allowed")]
    MethodNotAllowed,

    #[error("400 Bad Request: missing {0} header")]
    MissingHeader(&'static str),

    #[error("403 Forbidden: missing X-Hub-Signature-256")]
    MissingSignature,

    #[error("400 Bad Request: hook only accepts content-type: application/json")]
    ContentType,

    #[error("403 Forbidden: invalid X-Hub-Signature-256")]
    InvalidSignature,
}

/// A delivery whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub event_type: String,
    pub delivery_id: String,
    pub payload: Vec<u8>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

pub fn validate_webhook(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
    secret: &[u8],
) -> Result<Delivery, WebhookError> {
    if method != Method::POST {
        return Err(WebhookError::MethodNotAllowed);
    }
    let event_type =
        header_str(headers, EVENT_HEADER).ok_or(WebhookError::MissingHeader("X-GitHub-Event"))?;
    let delivery_id = header_str(headers, DELIVERY_HEADER)
        .ok_or(WebhookError::MissingHeader("X-GitHub-Delivery"))?;
    let signature = header_str(headers, SIGNATURE_HEADER).ok_or(WebhookError::MissingSignature)?;

    let content_type = header_str(headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return Err(WebhookError::ContentType);
    }

    if !verify_signature(signature, body, secret) {
        return Err(WebhookError::InvalidSignature);
    }

    Ok(Delivery {
        event_type: event_type.to_string(),
        delivery_id: delivery_id.to_string(),
        payload: body.to_vec(),
    })
}

/// Constant-time check of a `sha256=<hex>` signature.
pub fn verify_signature(signature: &str, body: &[u8], secret: &[u8]) -> bool {
    let Some(hex_sig) = signature.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
