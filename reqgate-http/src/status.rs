//! Validator for [`HttpClient`](crate::HttpClient) responses.

use reqgate::Validator;
use serde_json::Value;

/// 2xx status and no `errorCode` in the body.
pub fn is_success(response: &Value) -> bool {
    let ok_status = response
        .get("status")
        .and_then(Value::as_u64)
        .is_some_and(|status| (200..300).contains(&status));
    let has_error_code = response
        .get("body")
        .and_then(|body| body.get("errorCode"))
        .is_some();
    ok_status && !has_error_code
}

pub fn status_validator() -> Validator {
    Validator::new(is_success)
}
