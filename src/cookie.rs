//! Request cookie parsing and response `Set-Cookie` rendering.

use chrono::{TimeDelta, Utc};
use std::fmt;

/// `SameSite` attribute of a response cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A cookie either read from the request or set on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    /// Seconds; zero deletes the cookie.
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub const fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    #[must_use]
    pub const fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    #[must_use]
    pub const fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    #[must_use]
    pub const fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Renders the cookie as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(ref domain) = self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(ref path) = self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(max_age) = self.max_age {
            let max_age = max_age.max(0);
            write!(f, "; Max-Age={max_age}")?;
            // Ages past chrono's range keep Max-Age only.
            let expires = TimeDelta::try_seconds(max_age)
                .and_then(|age| Utc::now().checked_add_signed(age));
            if let Some(expires) = expires {
                write!(f, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"))?;
            }
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if let Some(same_site) = self.same_site {
            write!(f, "; SameSite={}", same_site.as_str())?;
        }
        Ok(())
    }
}

/// Parses one `Cookie` request header value into name/value pairs.
///
/// Malformed fragments without `=` are skipped; surrounding quotes on a
/// value are removed.
pub fn parse_cookie_header(header: &str) -> impl Iterator<Item = Cookie> + '_ {
    header.split(';').filter_map(|fragment| {
        let (name, value) = fragment.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        Some(Cookie::new(name, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let cookies: Vec<Cookie> =
            parse_cookie_header("session=abc; theme=\"dark\"; broken; =nameless").collect();

        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "session");
        assert_eq!(cookies[0].value, "abc");
        assert_eq!(cookies[1].value, "dark");
    }

    #[test]
    fn test_set_cookie_rendering() {
        let cookie = Cookie::new("MyCookie", "CookieValue")
            .with_domain("mydomain.com")
            .with_path("/")
            .secure()
            .http_only()
            .with_same_site(SameSite::Lax);

        assert_eq!(
            cookie.to_set_cookie(),
            "MyCookie=CookieValue; Domain=mydomain.com; Path=/; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_max_age_renders_expires() {
        let rendered = Cookie::new("a", "b").with_max_age(60).to_set_cookie();
        assert!(rendered.starts_with("a=b; Max-Age=60; Expires="));
        assert!(rendered.ends_with(" GMT"));
    }

    #[test]
    fn test_out_of_range_max_age_omits_expires() {
        let rendered = Cookie::new("a", "b").with_max_age(i64::MAX).to_set_cookie();
        assert_eq!(rendered, format!("a=b; Max-Age={}", i64::MAX));

        let deleted = Cookie::new("a", "b").with_max_age(-5).to_set_cookie();
        assert!(deleted.starts_with("a=b; Max-Age=0; Expires="));
    }
}
