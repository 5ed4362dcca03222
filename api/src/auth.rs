use axum::http::HeaderMap;

use crate::error::AppError;

/// Header automated UI tests send to get a synthetic diagnosis. Ignored unless
/// FLEET_ASSIST_ALLOW_TEST_BYPASS is on.
pub const TEST_BYPASS_HEADER: &str = "x-fleet-assist-test-bypass";

/// Token from `Authorization: Bearer <token>`. Shape checks beyond the scheme
/// belong to the credential provider.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
            docs_hint: Some("Include 'Authorization: Bearer <token>' header.".to_string()),
        })?
        .to_str()
        .map_err(|_| AppError::Unauthorized {
            message: "Authorization header is not valid ASCII".to_string(),
            docs_hint: None,
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use Bearer scheme".to_string(),
            docs_hint: Some("Format: 'Authorization: Bearer <token>'".to_string()),
        })
}

pub fn wants_test_bypass(headers: &HeaderMap, allowed: bool) -> bool {
    allowed && headers.contains_key(TEST_BYPASS_HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn bearer_token_is_extracted() {
        let map = headers(&[("authorization", "Bearer ya29.token-value")]);
        assert_eq!(bearer_token(&map).ok(), Some("ya29.token-value"));
    }

    #[test]
    fn missing_or_wrong_scheme_is_unauthorized() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AppError::Unauthorized { .. })
        ));
        assert!(matches!(
            bearer_token(&headers(&[("authorization", "Basic dXNlcjpwYXNz")])),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn bypass_requires_both_flag_and_header() {
        let map = headers(&[(TEST_BYPASS_HEADER, "1")]);
        assert!(wants_test_bypass(&map, true));
        assert!(!wants_test_bypass(&map, false));
        assert!(!wants_test_bypass(&HeaderMap::new(), true));
    }
}
