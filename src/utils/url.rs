//! Endpoint URL assembly for configured backend base URLs.

/// Joins a backend base URL and an endpoint path with exactly one slash.
///
/// Base URLs come from user configuration, so a trailing slash (or several)
/// is common; the endpoint may also be written with a leading slash.
///
/// ```
/// use standin::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url(
///         "https://generativelanguage.googleapis.com/v1beta/openai/",
///         "chat/completions"
///     ),
///     "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_slash() {
        for (base, endpoint) in [
            ("https://api.openai.com/v1", "chat/completions"),
            ("https://api.openai.com/v1/", "chat/completions"),
            ("https://api.openai.com/v1", "/chat/completions"),
            ("https://api.openai.com/v1///", "//chat/completions"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "https://api.openai.com/v1/chat/completions",
                "{base} + {endpoint}"
            );
        }
    }

    #[test]
    fn local_base_url_keeps_port() {
        assert_eq!(
            construct_api_url("http://127.0.0.1:8080/v1", "chat/completions"),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }
}
