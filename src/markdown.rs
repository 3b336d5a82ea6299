use std::sync::OnceLock;

use colored::Colorize;
use regex::Regex;

struct Patterns {
    line_break: Regex,
    strong: Regex,
    emphasis: Regex,
    tag: Regex,
    bold_span: Regex,
    code_span: Regex,
    ordered: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                line_break: Regex::new(r"(?i)<br\s*/?>|</p\s*>|</li\s*>|</h[1-6]\s*>").ok()?,
                strong: Regex::new(r"(?i)</?(strong|b)\s*>").ok()?,
                emphasis: Regex::new(r"(?i)</?(em|i)\s*>").ok()?,
                tag: Regex::new(r"(?s)<[^>]*>").ok()?,
                bold_span: Regex::new(r"\*\*([^*]+)\*\*").ok()?,
                code_span: Regex::new(r"`([^`]+)`").ok()?,
                ordered: Regex::new(r"^(\d+)[.)]\s+(.*)$").ok()?,
            })
        })
        .as_ref()
}

/// Turn model output into plain markdown: the few HTML tags models like to emit are
/// mapped to markdown, every other tag and all control characters are dropped.
pub fn sanitize(raw: &str) -> String {
    let text: String = raw
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    let Some(p) = patterns() else {
        return text;
    };
    let text = p.line_break.replace_all(&text, "\n\n");
    let text = p.strong.replace_all(&text, "**");
    let text = p.emphasis.replace_all(&text, "_");
    let text = p.tag.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "‹")
        .replace("&gt;", "›");

    // collapse runs of blank lines
    let mut out = String::new();
    let mut blank = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank += 1;
            if blank > 1 {
                continue;
            }
        } else {
            blank = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim().to_string()
}

fn style_inline(line: &str) -> String {
    let Some(p) = patterns() else {
        return line.to_string();
    };
    let line = p
        .bold_span
        .replace_all(line, |caps: &regex::Captures| caps[1].bold().to_string());
    p.code_span
        .replace_all(&line, |caps: &regex::Captures| caps[1].cyan().to_string())
        .to_string()
}

/// Render sanitized markdown for the terminal, wrapping prose to `width`.
pub fn render(raw: &str, width: usize) -> String {
    let text = sanitize(raw);
    let width = width.max(20);
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('|') {
            if trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')) {
                out.push(trimmed.dimmed().to_string());
            } else {
                out.push(style_inline(trimmed));
            }
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix('#') {
            let heading = heading.trim_start_matches('#').trim().replace("**", "");
            out.push(heading.yellow().bold().to_string());
            continue;
        }
        let bullet = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| trimmed.strip_prefix("• "));
        if let Some(item) = bullet {
            let indent = if line.len() > trimmed.len() { "    " } else { "  " };
            push_wrapped(&mut out, item, width, &format!("{indent}• "), &format!("{indent}  "));
            continue;
        }
        if let Some(caps) = patterns().and_then(|p| p.ordered.captures(trimmed)) {
            let marker = format!("  {}. ", &caps[1]);
            let hang = " ".repeat(marker.chars().count());
            push_wrapped(&mut out, &caps[2], width, &marker, &hang);
            continue;
        }
        if trimmed.is_empty() {
            out.push(String::new());
            continue;
        }
        push_wrapped(&mut out, trimmed, width, "", "");
    }
    out.join("\n")
}

fn push_wrapped(out: &mut Vec<String>, text: &str, width: usize, first: &str, rest: &str) {
    let options = textwrap::Options::new(width)
        .initial_indent(first)
        .subsequent_indent(rest);
    for wrapped in textwrap::wrap(text, options) {
        out.push(style_inline(&wrapped));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_tags_and_controls() {
        let raw = "<p>Your <strong>food</strong> spend rose.</p><script>alert(1)</script>\x07Done";
        let clean = sanitize(raw);
        assert_eq!(clean, "Your **food** spend rose.\n\nalert(1)Done");
    }

    #[test]
    fn test_sanitize_collapses_blank_lines() {
        assert_eq!(sanitize("a\n\n\n\nb\r\n"), "a\n\nb");
    }

    #[test]
    fn test_render_plain_output() {
        colored::control::set_override(false);
        let raw = "## Budget tips\n- Cut **Swiggy** orders\n1. Save `20%`\n| a | b |\n|---|---|";
        let rendered = render(raw, 80);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Budget tips");
        assert_eq!(lines[1], "  • Cut Swiggy orders");
        assert_eq!(lines[2], "  1. Save 20%");
        assert_eq!(lines[3], "| a | b |");
        assert_eq!(lines[4], "|---|---|");
    }

    #[test]
    fn test_render_wraps_long_bullets() {
        colored::control::set_override(false);
        let raw = "- one two three four five six seven eight nine ten";
        let rendered = render(raw, 20);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines.len() > 1);
        assert!(lines[0].starts_with("  • "));
        assert!(lines[1].starts_with("    "));
    }
}
