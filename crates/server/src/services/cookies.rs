//! Cookie helper for the httpOnly refresh token.
//!
//! The refresh token never travels in response bodies; it is set as an
//! httpOnly cookie on login and read back from the Cookie header on
//! refresh and logout.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};

use crate::config::CookieConfig;

/// Builds and clears the refresh token cookie.
#[derive(Debug, Clone)]
pub struct CookieHelper {
    config: CookieConfig,
    /// Refresh token lifetime in seconds, mirrored into Max-Age.
    refresh_token_expiry_secs: i64,
}

impl CookieHelper {
    pub fn new(config: CookieConfig, refresh_token_expiry_secs: i64) -> Self {
        Self {
            config,
            refresh_token_expiry_secs,
        }
    }

    /// Name of the refresh token cookie.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Build a Set-Cookie header value carrying the refresh token.
    pub fn build_refresh_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}",
            self.config.name, token, self.config.path, self.refresh_token_expiry_secs
        );
        self.push_attributes(&mut cookie);
        cookie
    }

    /// Build a Set-Cookie header value that clears the refresh token.
    pub fn build_clear_cookie(&self) -> String {
        let mut cookie = format!(
            "{}=; Path={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.config.name, self.config.path
        );
        self.push_attributes(&mut cookie);
        cookie
    }

    /// Append the refresh cookie to a response header map.
    pub fn add_refresh_cookie(&self, headers: &mut HeaderMap, token: &str) {
        if let Ok(value) = HeaderValue::from_str(&self.build_refresh_cookie(token)) {
            headers.append(SET_COOKIE, value);
        }
    }

    /// Append the clearing cookie to a response header map.
    pub fn add_clear_cookie(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.build_clear_cookie()) {
            headers.append(SET_COOKIE, value);
        }
    }

    /// Read the refresh token cookie from request headers.
    pub fn extract_refresh_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        extract_cookie(headers, &self.config.name)
    }

    fn push_attributes(&self, cookie: &mut String) {
        cookie.push_str("; HttpOnly");

        if self.config.secure {
            cookie.push_str("; Secure");
        }

        cookie.push_str(&format!("; SameSite={}", self.config.same_site));

        if !self.config.domain.is_empty() {
            cookie.push_str(&format!("; Domain={}", self.config.domain));
        }
    }
}

/// Extracts a cookie value from request headers by name.
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_header| {
            cookie_header
                .split(';')
                .map(|s| s.trim())
                .find_map(|cookie| {
                    let (cookie_name, cookie_value) = cookie.split_once('=')?;
                    if cookie_name == name {
                        Some(cookie_value)
                    } else {
                        None
                    }
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CookieConfig {
        CookieConfig {
            name: "refresh_token".to_string(),
            path: "/".to_string(),
            secure: true,
            same_site: "Strict".to_string(),
            domain: String::new(),
        }
    }

    #[test]
    fn refresh_cookie_carries_attributes() {
        let helper = CookieHelper::new(test_config(), 2592000);
        let cookie = helper.build_refresh_cookie("tok123");

        assert!(cookie.contains("refresh_token=tok123"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let helper = CookieHelper::new(test_config(), 2592000);
        let cookie = helper.build_clear_cookie();

        assert!(cookie.starts_with("refresh_token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn cookie_with_domain() {
        let mut config = test_config();
        config.domain = "example.com".to_string();

        let helper = CookieHelper::new(config, 3600);
        assert!(helper.build_refresh_cookie("t").contains("Domain=example.com"));
    }

    #[test]
    fn cookie_without_secure() {
        let mut config = test_config();
        config.secure = false;

        let helper = CookieHelper::new(config, 3600);
        assert!(!helper.build_refresh_cookie("t").contains("Secure"));
    }

    #[test]
    fn extracts_cookie_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("refresh_token=abc123; other=value"),
        );

        let helper = CookieHelper::new(test_config(), 3600);
        assert_eq!(helper.extract_refresh_token(&headers), Some("abc123"));
        assert_eq!(extract_cookie(&headers, "other"), Some("value"));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn extract_handles_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(extract_cookie(&headers, "refresh_token"), None);
    }

    #[test]
    fn add_refresh_cookie_sets_header() {
        let helper = CookieHelper::new(test_config(), 3600);
        let mut headers = HeaderMap::new();

        helper.add_refresh_cookie(&mut headers, "tok");

        let value = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.contains("refresh_token=tok"));
    }
}
