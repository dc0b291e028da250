use regex::Regex;
use std::sync::OnceLock;

/// Content Sanitizer
///
/// Strips user-submitted article bodies down to an allow-list of safe text
/// formatting tags before persistence. Everything else — scripts, event
/// handler attributes, iframes, unknown tags — is removed. Sanitization is
/// unconditional: administrator submissions pass through the same filter.

/// Tags that survive sanitization. Attributes are dropped from all of them;
/// `a` alone keeps its `href`, and only when the URL scheme is safe.
const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "em", "h1", "h2", "h3", "h4", "h5", "h6", "i", "li",
    "ol", "p", "pre", "strong", "u",
];

/// Tags whose inner content is executable or presentational garbage and is
/// removed along with the tags themselves.
const DROP_CONTENT_TAGS: &[&str] = &["script", "style"];

static HREF_PATTERN: OnceLock<Regex> = OnceLock::new();

fn href_pattern() -> &'static Regex {
    HREF_PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
    })
}

/// Validate URLs and allow only safe protocols.
///
/// Relative paths, anchors, http(s) and mailto pass; `javascript:`, `data:`
/// and friends do not, and neither does parent-directory traversal.
fn is_safe_url(url: &str) -> bool {
    if url.starts_with('/') || url.starts_with("./") || url.starts_with('#') {
        return true;
    }

    let url_lower = url.to_lowercase();
    let safe_protocols = ["http://", "https://", "mailto:"];
    safe_protocols
        .iter()
        .any(|protocol| url_lower.starts_with(protocol))
}

/// Extracts the tag name (lowercased) and whether this is a closing tag from
/// the raw text between `<` and `>`.
fn tag_name(raw: &str) -> (String, bool) {
    let inner = raw.trim_start();
    let (inner, closing) = match inner.strip_prefix('/') {
        Some(rest) => (rest.trim_start(), true),
        None => (inner, false),
    };
    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (name, closing)
}

/// Reads the raw tag text starting at `pos` (which points just past `<`),
/// honoring `>` inside quoted attribute values. Returns the tag text and the
/// index just past the terminating `>`, or `None` when the tag never closes.
fn read_tag(chars: &[char], pos: usize) -> Option<(String, usize)> {
    let mut raw = String::new();
    let mut i = pos;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == '>' {
                    return Some((raw, i + 1));
                }
            }
        }
        raw.push(c);
        i += 1;
    }
    None
}

/// Scans forward from `pos` for the closing tag of `name` and returns the
/// index just past it. Used to drop the body of `<script>`/`<style>` blocks.
fn skip_past_closing(chars: &[char], pos: usize, name: &str) -> usize {
    let mut i = pos;
    while i < chars.len() {
        if chars[i] == '<' {
            if let Some((raw, next)) = read_tag(chars, i + 1) {
                let (tag, closing) = tag_name(&raw);
                if closing && tag == name {
                    return next;
                }
                i = next;
                continue;
            }
            // Unterminated tag: nothing executable can follow.
            return chars.len();
        }
        i += 1;
    }
    chars.len()
}

/// Re-emits an allowed opening tag with all attributes stripped. Anchors
/// keep a vetted `href` only.
fn emit_open_tag(output: &mut String, name: &str, raw: &str) {
    if name == "a" {
        if let Some(caps) = href_pattern().captures(raw) {
            let href = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or("");
            if is_safe_url(href) {
                let escaped = href.replace('&', "&amp;").replace('"', "&quot;");
                output.push_str(&format!("<a href=\"{}\">", escaped));
                return;
            }
        }
        output.push_str("<a>");
        return;
    }
    output.push('<');
    output.push_str(name);
    output.push('>');
}

/// sanitize
///
/// The single entry point: returns a copy of `input` containing only
/// allow-listed markup. Handles `>` inside quoted attributes, HTML
/// comments, and unclosed trailing tags; stray `<` characters that do not
/// open a tag are entity-escaped.
pub fn sanitize(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut output = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '<' {
            output.push(c);
            i += 1;
            continue;
        }

        // HTML comment: drop it wholesale.
        if chars[i..].starts_with(&['<', '!', '-', '-']) {
            let rest: String = chars[i..].iter().collect();
            match rest.find("-->") {
                Some(offset) => {
                    i += rest[..offset].chars().count() + 3;
                }
                None => break,
            }
            continue;
        }

        // A '<' not followed by a letter or '/' is plain text.
        let next = chars.get(i + 1);
        let opens_tag = matches!(next, Some(c) if c.is_ascii_alphabetic() || *c == '/');
        if !opens_tag {
            output.push_str("&lt;");
            i += 1;
            continue;
        }

        let Some((raw, after)) = read_tag(&chars, i + 1) else {
            // Unclosed tag at end of input: drop the remainder.
            break;
        };

        let (name, closing) = tag_name(&raw);
        if name.is_empty() {
            i = after;
            continue;
        }

        if DROP_CONTENT_TAGS.contains(&name.as_str()) {
            i = if closing {
                after
            } else {
                skip_past_closing(&chars, after, &name)
            };
            continue;
        }

        if ALLOWED_TAGS.contains(&name.as_str()) {
            if closing {
                output.push_str(&format!("</{}>", name));
            } else {
                emit_open_tag(&mut output, &name, &raw);
            }
        }
        // Disallowed tags are dropped; their inner text is kept.
        i = after;
    }

    output
}
