//! Minimal wildcard matching for text criteria: `*` matches any run of
//! characters, `?` matches exactly one. Case-insensitive.

pub(crate) fn matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();
    matches_at(&pattern, &text)
}

fn matches_at(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            // Greedy backtracking over every possible tail.
            (0..=text.len()).any(|skip| matches_at(&pattern[1..], &text[skip..]))
        }
        Some('?') => !text.is_empty() && matches_at(&pattern[1..], &text[1..]),
        Some(&c) => text.first() == Some(&c) && matches_at(&pattern[1..], &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_wildcards() {
        assert!(matches("abc", "ABC"));
        assert!(matches("a*c", "abbbc"));
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(matches("*", ""));
        assert!(!matches("a*b", "ac"));
    }
}
