pub const FALLBACK_SLUG: &str = "post";

/// Lowercase, hyphenated form of `title` suitable for file names.
///
/// Characters other than word characters, whitespace and `-` are dropped;
/// runs of whitespace, `_` and `-` collapse into a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for ch in title.to_lowercase().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = true;
        } else if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_separators_and_strips_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  spaced __ out -- title  "), "spaced-out-title");
        assert_eq!(slugify("Don't stop"), "dont-stop");
        assert_eq!(slugify("a_b-c d"), "a-b-c-d");
    }

    #[test]
    fn slugify_keeps_unicode_word_characters() {
        assert_eq!(slugify("Café Nights 2024"), "café-nights-2024");
    }

    #[test]
    fn slugify_falls_back_when_nothing_survives() {
        assert_eq!(slugify(""), "post");
        assert_eq!(slugify("!!! ---"), "post");
    }
}
