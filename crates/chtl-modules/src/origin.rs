//! Origin block extraction
//!
//! Pulls `[Origin] @Tag Name { ... }` blocks out of CHTL source text. Braces
//! inside the block must balance; the returned content is the trimmed text
//! between the outer braces.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named origin block found in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginBlock {
    /// Type tag as written, e.g. `@Style`
    pub tag: String,
    pub name: String,
    pub content: String,
}

static ANY_NAMED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[Origin\]\s*(@\w+)\s+(\w+)\s*\{").expect("origin block pattern")
});

/// Text between the brace at `open` and its matching close brace
pub(crate) fn balanced_body(text: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..open + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Content of the `[Origin] <tag> <name> { ... }` block in `text`
///
/// The tag matches case-insensitively, the block name exactly; an
/// unterminated block is treated as missing.
pub fn find_origin_block(text: &str, tag: &str, name: &str) -> Option<String> {
    let tag = if tag.starts_with('@') {
        tag.to_string()
    } else {
        format!("@{}", tag)
    };
    let pattern = format!(
        r"\[Origin\]\s*(?i:{})\s+{}\s*\{{",
        regex::escape(&tag),
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;

    let content = re.find_iter(text).find_map(|m| {
        balanced_body(text, m.end() - 1).map(|body| body.trim().to_string())
    });
    content
}

/// Every well-formed named origin block in `text`, in source order
pub fn list_origin_blocks(text: &str) -> Vec<OriginBlock> {
    ANY_NAMED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = balanced_body(text, whole.end() - 1)?;
            Some(OriginBlock {
                tag: caps[1].to_string(),
                name: caps[2].to_string(),
                content: body.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
html {
    body { text { "hi" } }
}

[Origin] @Style box {
    color: red;
}

[Origin] @JavaScript init {
    function go() { if (x) { run(); } }
}
"#;

    #[test]
    fn test_find_block() {
        assert_eq!(
            find_origin_block(PAGE, "@Style", "box").as_deref(),
            Some("color: red;")
        );
    }

    #[test]
    fn test_nested_braces() {
        assert_eq!(
            find_origin_block(PAGE, "@JavaScript", "init").as_deref(),
            Some("function go() { if (x) { run(); } }")
        );
    }

    #[test]
    fn test_tag_case_insensitive_and_bare() {
        assert!(find_origin_block(PAGE, "@style", "box").is_some());
        assert!(find_origin_block(PAGE, "Style", "box").is_some());
    }

    #[test]
    fn test_block_name_is_case_sensitive() {
        assert!(find_origin_block(PAGE, "@Style", "Box").is_none());
        assert!(find_origin_block(PAGE, "@STYLE", "box").is_some());
    }

    #[test]
    fn test_missing_block() {
        assert!(find_origin_block(PAGE, "@Style", "missing").is_none());
        assert!(find_origin_block(PAGE, "@Html", "box").is_none());
    }

    #[test]
    fn test_tag_is_escaped() {
        let text = "[Origin] @Style box { a }";
        assert!(find_origin_block(text, "@St.le", "box").is_none());
    }

    #[test]
    fn test_unterminated_block() {
        assert!(find_origin_block("[Origin] @Html top { <div>", "@Html", "top").is_none());
    }

    #[test]
    fn test_list_blocks() {
        let blocks = list_origin_blocks(PAGE);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].tag, "@Style");
        assert_eq!(blocks[0].name, "box");
        assert_eq!(blocks[1].name, "init");
    }
}
