//! Text helpers for blog posts: slugs, excerpts and reading time.

use std::collections::HashSet;

const EXCERPT_CHARS: usize = 200;
const WORDS_PER_MINUTE: usize = 200;
const MAX_SLUG_CHARS: usize = 80;

/// `"Packing for the Alps: A Guide!"` → `"packing-for-the-alps-a-guide"`
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    let truncated: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    let truncated = truncated.trim_end_matches('-');
    if truncated.is_empty() {
        "post".to_string()
    } else {
        truncated.to_string()
    }
}

/// First of `base`, `base-2`, `base-3`… not in `taken`
#[must_use]
pub fn unique_slug(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Markdown reduced to plain words: headings, emphasis, code fences, links and images flattened
#[must_use]
pub fn strip_markdown(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    for line in markdown.lines() {
        let line = line.trim();
        if line.starts_with("```") || line.starts_with("---") {
            continue;
        }
        let line = line.trim_start_matches(|c: char| matches!(c, '#' | '>' | '-' | '*' | '+')).trim_start();

        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                // `![alt](url)` keeps nothing, `[text](url)` keeps text
                '!' if chars.peek() == Some(&'[') => {
                    chars.next();
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            break;
                        }
                    }
                    skip_link_target(&mut chars);
                }
                '[' => {
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            break;
                        }
                        out.push(inner);
                    }
                    skip_link_target(&mut chars);
                }
                '*' | '_' | '`' | '~' => {}
                other => out.push(other),
            }
        }
        out.push(' ');
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn skip_link_target(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    if chars.peek() == Some(&'(') {
        for inner in chars.by_ref() {
            if inner == ')' {
                break;
            }
        }
    }
}

/// Plain-text summary of at most 200 characters, cut on a word boundary with `…`
#[must_use]
pub fn derive_excerpt(markdown: &str) -> String {
    let plain = strip_markdown(markdown);
    if plain.chars().count() <= EXCERPT_CHARS {
        return plain;
    }

    let cut: String = plain.chars().take(EXCERPT_CHARS).collect();
    let cut = match cut.rfind(' ') {
        Some(space) if space > 0 => &cut[..space],
        _ => cut.as_str(),
    };
    format!(
        "{}…",
        cut.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
    )
}

/// Minutes at 200 words per minute, never less than one
#[must_use]
pub fn reading_time_minutes(content: &str) -> usize {
    let words = strip_markdown(content).split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

/// Comma separated tags, trimmed and lowercased, without empties or repeats
#[must_use]
pub fn normalize_tags(tags: &[String]) -> String {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty() && !tag.contains(','))
        .filter(|tag| seen.insert(tag.clone()))
        .collect::<Vec<_>>()
        .join(",")
}

#[must_use]
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Packing for the Alps: A Guide!"), "packing-for-the-alps-a-guide");
        assert_eq!(slugify("  --Hello   World--  "), "hello-world");
        assert_eq!(slugify("Über Café"), "ber-caf");
        assert_eq!(slugify("!!!"), "post");
        assert!(slugify(&"word ".repeat(50)).len() <= MAX_SLUG_CHARS);
    }

    #[test]
    fn test_unique_slug() {
        let taken: HashSet<String> = ["gear-guide", "gear-guide-2"].iter().map(ToString::to_string).collect();
        assert_eq!(unique_slug("gear-guide", &taken), "gear-guide-3");
        assert_eq!(unique_slug("new-post", &taken), "new-post");
    }

    #[test]
    fn test_strip_markdown() {
        let markdown = "# Title\n\nSome **bold** and _italic_ text with a [link](https://x.y).\n\n![photo](a.png)\n```\ncode\n```";
        assert_eq!(strip_markdown(markdown), "Title Some bold and italic text with a link. code");
    }

    #[test]
    fn test_excerpt_short_content_unchanged() {
        assert_eq!(derive_excerpt("## Short post"), "Short post");
    }

    #[test]
    fn test_excerpt_cuts_on_word_boundary() {
        let content = "lorem ipsum ".repeat(40);
        let excerpt = derive_excerpt(&content);
        assert!(excerpt.ends_with('…'));
        assert!(excerpt.chars().count() <= EXCERPT_CHARS + 1);
        let body = excerpt.trim_end_matches('…');
        assert!(body.ends_with("lorem") || body.ends_with("ipsum"), "{excerpt}");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(201)), 2);
        assert_eq!(reading_time_minutes(&"word ".repeat(1000)), 5);
    }

    #[test]
    fn test_tags() {
        let tags = vec![" Hiking ".to_string(), "hiking".to_string(), String::new(), "Gear".to_string()];
        assert_eq!(normalize_tags(&tags), "hiking,gear");
        assert_eq!(split_tags("hiking, gear,,"), vec!["hiking", "gear"]);
    }
}
