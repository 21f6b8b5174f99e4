use crate::constants::matching::{MAX_REQUIRED_TOKENS, MIN_TOKEN_LEN, REQUIRED_TOKEN_RATIO};

/// Pairs a locally tracked release title with a name reported by a client.
pub trait TitleMatcher: Send + Sync {
    /// `Some(score)` when `remote_name` is accepted for `local_title`. Higher
    /// scores are better matches.
    fn score(&self, local_title: &str, remote_name: &str) -> Option<usize>;
}

/// Token overlap: the remote name must contain at least
/// `min(3, 0.6 × token count)` of the local title's significant tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenMatcher;

#[must_use]
pub fn significant_tokens(title: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
    {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

impl TitleMatcher for TokenMatcher {
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, local_title: &str, remote_name: &str) -> Option<usize> {
        let tokens = significant_tokens(local_title);
        if tokens.is_empty() {
            return None;
        }

        let haystack = remote_name.to_lowercase();
        let matched = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
        let required = (MAX_REQUIRED_TOKENS as f64).min(tokens.len() as f64 * REQUIRED_TOKEN_RATIO);

        (matched > 0 && matched as f64 >= required).then_some(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_tokens() {
        assert_eq!(
            significant_tokens("The.Great.Movie.2020.1080p"),
            vec!["the", "great", "movie", "2020", "1080p"]
        );
        assert_eq!(significant_tokens("A.B.of.It"), Vec::<String>::new());
        assert_eq!(significant_tokens("Show Show S01"), vec!["show", "s01"]);
    }

    #[test]
    fn test_release_with_extra_tags_matches() {
        let matcher = TokenMatcher;
        assert_eq!(
            matcher.score(
                "The.Great.Movie.2020.1080p",
                "The Great Movie 2020 1080p BluRay x264-GROUP"
            ),
            Some(5)
        );
    }

    #[test]
    fn test_single_shared_token_is_rejected() {
        let matcher = TokenMatcher;
        assert_eq!(
            matcher.score("The.Great.Movie.2020.1080p", "Another Film 1080p WEB-DL"),
            None
        );
    }

    #[test]
    fn test_short_titles_need_proportionally_fewer_tokens() {
        let matcher = TokenMatcher;
        // Two tokens: 0.6 × 2 = 1.2, so both must match.
        assert_eq!(matcher.score("Heat 1995", "Heat.1995.1080p.BluRay"), Some(2));
        assert_eq!(matcher.score("Heat 1995", "Heat.2013.1080p"), None);
        assert_eq!(matcher.score("", "anything"), None);
    }
}
