//! Response envelope shared by every endpoint under the API prefix.
//!
//! Exactly one of `data` and `error` is populated. `meta` is always an
//! object; it carries pagination fields for paginated lists.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Largest page size a client may request.
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Page size used when the client does not pass one.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub meta: Meta,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Default, Serialize)]
pub struct Meta {
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            meta: Meta::default(),
            error: None,
        }
    }

    pub fn paged(data: T, page: PageMeta) -> Self {
        Self {
            data: Some(data),
            meta: Meta { page: Some(page) },
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            data: None,
            meta: Meta::default(),
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Normalized pagination window.
///
/// Limit is clamped to `1..=MAX_PAGE_LIMIT`, offset to `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            limit: self.limit,
            offset: self.offset,
            total,
            has_more: self.offset + self.limit < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(Page::new(Some(0), Some(-5)), Page { limit: 1, offset: 0 });
        assert_eq!(Page::new(Some(10_000), None), Page { limit: 200, offset: 0 });
        assert_eq!(Page::new(None, Some(7)), Page { limit: 50, offset: 7 });
    }

    #[test]
    fn has_more_tracks_remaining_rows() {
        let page = Page::new(Some(10), Some(10));
        assert!(page.meta(21).has_more);
        assert!(!page.meta(20).has_more);
    }

    #[test]
    fn meta_is_flattened() {
        let plain = serde_json::to_value(ApiResponse::ok("x")).unwrap();
        assert_eq!(plain["meta"], serde_json::json!({}));
        assert!(plain["error"].is_null());

        let paged = serde_json::to_value(ApiResponse::paged(
            Vec::<i32>::new(),
            Page::new(Some(5), Some(0)).meta(3),
        ))
        .unwrap();
        assert_eq!(
            paged["meta"],
            serde_json::json!({ "limit": 5, "offset": 0, "total": 3, "has_more": false })
        );
    }
}
