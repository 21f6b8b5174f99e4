use regex::Regex;
use std::sync::OnceLock;

use super::NamingConfig;

const ILLEGAL_CHARACTERS: &[char] = &['<', '>', '"', '/', '\\', '|', '?', '*'];

fn empty_groups() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*\)|\[\s*\]|\{\s*\}").expect("Invalid regex pattern defined in code")
    })
}

fn repeated_separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\s+-){2,}\s+").expect("Invalid regex pattern defined in code"))
}

fn repeated_hyphens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-{2,}").expect("Invalid regex pattern defined in code"))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tidies a name after token substitution left holes in it.
#[must_use]
pub fn cleanup_formatted(value: &str) -> String {
    let mut current = value.to_string();

    loop {
        let next = empty_groups().replace_all(&current, "");
        let next = collapse_whitespace(&next);
        let next = repeated_separators().replace_all(&next, " - ");
        let next = repeated_hyphens().replace_all(&next, "-");
        let next = next.replace(" .", ".");

        if next == current {
            break;
        }
        current = next;
    }

    current
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_string()
}

/// Makes a single title safe to use inside a file or folder name.
#[must_use]
pub fn clean_title(title: &str, config: &NamingConfig) -> String {
    let replaced = title.replace(':', &config.colon_replacement);

    let stripped: String = if config.replace_illegal_characters {
        replaced
            .chars()
            .filter(|c| !ILLEGAL_CHARACTERS.contains(c))
            .collect()
    } else {
        replaced
    };

    collapse_whitespace(&stripped)
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Cleans each segment of a relative folder path. Segments listed in
/// `preserved_roots` are kept as they are.
#[must_use]
pub fn sanitize_folder_path(path: &str, config: &NamingConfig, preserved_roots: &[&str]) -> String {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if preserved_roots.contains(&segment) {
                segment.to_string()
            } else {
                clean_title(segment, config)
            }
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Moves a leading English article to the end: `The Matrix` -> `Matrix, The`.
#[must_use]
pub fn title_the(title: &str) -> String {
    for article in ["The ", "A ", "An "] {
        if let Some(rest) = title.strip_prefix(article)
            && !rest.is_empty()
        {
            return format!("{rest}, {}", article.trim_end());
        }
    }
    title.to_string()
}

/// Letters, digits and single spaces only.
#[must_use]
pub fn clean_search_title(title: &str) -> String {
    let kept: String = title
        .replace('&', "and")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_whitespace(&kept)
}
