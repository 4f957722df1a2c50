use axum::http::{header, HeaderMap};

pub fn now_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

pub fn header_admin_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.contains('\r') && !s.contains('\n'))
        .filter(|s| !s.is_empty())
}

pub fn header_bearer_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    if v.contains('\r') || v.contains('\n') {
        return None;
    }
    let prefix = "Bearer ";
    if v.starts_with(prefix) {
        let t = v[prefix.len()..].trim().to_string();
        if t.contains('\r') || t.contains('\n') {
            None
        } else {
            Some(t)
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_requires_the_prefix() {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(header_bearer_token(&h), Some("abc123".into()));
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(header_bearer_token(&h), None);
    }

    #[test]
    fn empty_admin_token_header_is_ignored() {
        let mut h = HeaderMap::new();
        h.insert("x-admin-token", "  ".parse().unwrap());
        assert_eq!(header_admin_token(&h), None);
    }
}
