//! `@name` mention extraction for chat messages

use regex::Regex;
use std::sync::OnceLock;

fn mention_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@(\w+)").ok()).as_ref()
}

/// Lowercased, de-duplicated mentions in order of first appearance
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let Some(pattern) = mention_pattern() else {
        return mentions;
    };
    for capture in pattern.captures_iter(content) {
        let name = capture[1].to_lowercase();
        if !mentions.contains(&name) {
            mentions.push(name);
        }
    }
    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_mentions() {
        assert_eq!(
            extract_mentions("@Zosia can you ping @bestia? thanks @zosia"),
            vec!["zosia", "bestia"]
        );
    }

    #[test]
    fn test_no_mentions() {
        assert!(extract_mentions("email me at nobody").is_empty());
    }
}
