use axum::http::{header, HeaderMap};
use cookie::{Cookie, SameSite};

pub const TOKEN_COOKIE: &str = "access_token";

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .secure(secure)
        .build()
        .to_string()
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Session token from the cookie, falling back to a bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|c| c.name() == TOKEN_COOKIE && !c.value_trimmed().is_empty())
        .map(|c| c.value_trimmed().to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_wins_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=abc.def"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn quoted_cookie_values_are_unwrapped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("access_token=\"abc.def\"; theme=dark"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn empty_cookie_falls_through_to_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn bearer_header_is_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn session_cookie_flags() {
        let cookie = session_cookie("t", 3600, true);
        assert!(cookie.starts_with("access_token=t;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("; Secure"));
        assert!(!session_cookie("t", 3600, false).contains("Secure"));

        let cleared = clear_cookie(false);
        assert!(cleared.starts_with("access_token=;"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
