//! URL helpers for talking to the deployment.
//!
//! Deployment URLs arrive from config files and environment variables with or
//! without trailing slashes; endpoints are written with leading slashes for
//! readability. These helpers keep the two from producing double slashes.

/// Normalize a deployment base URL by removing trailing slashes.
///
/// # Examples
///
/// ```
/// use brook::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a normalized base URL and an endpoint path.
///
/// # Examples
///
/// ```
/// use brook::utils::url::join_endpoint;
///
/// assert_eq!(
///     join_endpoint("http://localhost:8000", "/chat"),
///     "http://localhost:8000/chat"
/// );
/// assert_eq!(
///     join_endpoint("http://localhost:8000/", "threads/search"),
///     "http://localhost:8000/threads/search"
/// );
/// ```
pub fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    let base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}
