//! Masking helpers for logging credentials and URLs

/// Sanitizer for sensitive data
pub struct Sanitizer;

impl Sanitizer {
    /// Masks a session token or cookie for logs, keeping its prefix and last
    /// four characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use slackline_lib::security::Sanitizer;
    ///
    /// assert_eq!(Sanitizer::sanitize_token("xoxc-1234-5678-abcd"), "xoxc-***abcd");
    /// assert_eq!(Sanitizer::sanitize_token("plaintoken"), "***oken");
    /// assert_eq!(Sanitizer::sanitize_token("abc"), "****");
    /// ```
    pub fn sanitize_token(token: &str) -> String {
        if !token.is_ascii() || token.len() <= 4 {
            return "****".to_string();
        }

        let tail = &token[token.len() - 4..];
        match token.find('-') {
            Some(pos) if pos < 5 && token.len() > pos + 5 => {
                format!("{}***{}", &token[..=pos], tail)
            }
            _ => format!("***{}", tail),
        }
    }

    /// Strips query parameters and fragments from a URL
    ///
    /// ```
    /// use slackline_lib::security::Sanitizer;
    ///
    /// assert_eq!(
    ///     Sanitizer::sanitize_url("https://slack.com/api/auth.test?token=secret"),
    ///     "https://slack.com/api/auth.test"
    /// );
    /// ```
    pub fn sanitize_url(url: &str) -> String {
        url.split(['?', '#']).next().unwrap_or(url).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_token_keeps_prefix() {
        assert_eq!(
            Sanitizer::sanitize_token("xoxd-abcdefghijklmnop"),
            "xoxd-***mnop"
        );
    }

    #[test]
    fn test_sanitize_token_short() {
        assert_eq!(Sanitizer::sanitize_token(""), "****");
        assert_eq!(Sanitizer::sanitize_token("abcd"), "****");
        assert_eq!(Sanitizer::sanitize_token("abcde"), "***bcde");
    }

    #[test]
    fn test_sanitize_token_prefix_only() {
        // Nothing but the prefix and a short tail: don't reveal the whole value
        assert_eq!(Sanitizer::sanitize_token("xoxc-abcd"), "***abcd");
    }

    #[test]
    fn test_sanitize_token_non_ascii() {
        assert_eq!(Sanitizer::sanitize_token("ключ-секрет"), "****");
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(
            Sanitizer::sanitize_url("https://example.com/page#section"),
            "https://example.com/page"
        );
        assert_eq!(
            Sanitizer::sanitize_url("https://acme.slack.com/"),
            "https://acme.slack.com/"
        );
    }
}
