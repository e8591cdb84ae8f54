//! Request helpers for the worker server

use super::error::ServerError;

/// Parses and validates Content-Type header for application/json
///
/// Accepts `application/json` with or without a charset parameter. Rejects
/// look-alikes such as `application/jsonp` or `text/json`.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ServerError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ServerError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ServerError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ServerError> {
    if data.len() > max_size {
        return Err(ServerError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Checks an `Authorization: Bearer <token>` header value
pub fn check_bearer(header: Option<&str>, expected: &str) -> Result<(), ServerError> {
    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(ServerError::Unauthorized),
    }
}

/// Byte comparison whose running time depends only on the lengths
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_validate_body_size() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        match validate_body_size(&data, 999) {
            Err(ServerError::PayloadTooLarge(size)) => assert_eq!(size, 1000),
            other => panic!("Expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_check_bearer() {
        assert!(check_bearer(Some("Bearer abc"), "abc").is_ok());
        assert!(check_bearer(Some("Bearer abd"), "abc").is_err());
        assert!(check_bearer(Some("abc"), "abc").is_err());
        assert!(check_bearer(None, "abc").is_err());
        assert!(check_bearer(Some("Bearer ab"), "abc").is_err());
        assert!(check_bearer(Some("Bearer abcd"), "abc").is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(constant_time_eq(b"", b""));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"Xs3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cre", b"s3cret"));
    }
}
