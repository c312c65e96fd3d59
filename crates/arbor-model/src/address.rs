//! Identifier addresses.
//!
//! Identifiers are hierarchical path-shaped strings (`/alice/notes/1`),
//! optionally carrying a scheme and authority. Authorization walks these
//! paths upward, so parent/canonical handling lives here.

/// Split an address into its origin (`scheme://authority`, possibly empty)
/// and the rest (path plus query).
fn split_origin(addr: &str) -> (&str, &str) {
    if let Some(scheme_end) = addr.find("://") {
        let after = scheme_end + 3;
        match addr[after..].find('/') {
            Some(slash) => addr.split_at(after + slash),
            None => (addr, ""),
        }
    } else {
        ("", addr)
    }
}

/// The path component of an address, query string excluded.
pub fn path(addr: &str) -> &str {
    let (_, rest) = split_origin(addr);
    rest.split('?').next().unwrap_or("")
}

/// Whether the address points at the root path.
pub fn is_root(addr: &str) -> bool {
    let path = path(addr);
    path.is_empty() || path == "/"
}

/// Canonical form: origin plus path, query string and trailing slash
/// dropped.
///
/// The root path is the exception: it is returned untouched, query string
/// included. This mirrors the original resolution behavior and is relied on
/// by the stock lookup; the treatment of query parameters on non-root
/// addresses is simply to strip them.
pub fn canonical(addr: &str) -> String {
    if is_root(addr) {
        return addr.to_string();
    }
    let (origin, _) = split_origin(addr);
    let path = path(addr).trim_end_matches('/');
    format!("{origin}{path}")
}

/// One path segment up, or `None` at the root.
pub fn parent(addr: &str) -> Option<String> {
    if is_root(addr) {
        return None;
    }
    let (origin, _) = split_origin(addr);
    let path = path(addr).trim_end_matches('/');
    match path.rfind('/') {
        Some(0) | None => Some(format!("{origin}/")),
        Some(slash) => Some(format!("{origin}{}", &path[..slash])),
    }
}

/// Append a child segment to an address.
pub fn join(addr: &str, segment: &str) -> String {
    let base = canonical(addr);
    let base = base.trim_end_matches('/');
    format!("{base}/{segment}")
}

/// Attach a single query parameter to a canonical address.
pub fn with_query(addr: &str, key: &str, value: &str) -> String {
    format!("{}?{key}={value}", canonical(addr))
}
