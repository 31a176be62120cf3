//! Line-oriented parser for the markdown dialect the generation backend emits.
//!
//! Only the subset that shows up in analysis output is recognised: ATX
//! headings, `**bold**` / `*italic*` spans, `-`/`*`/`•` bullets, `1.`/`1)`
//! numbered items, rule lines and blank lines. Everything else is a
//! paragraph. Parsing is total; malformed markup is kept as literal text.

/// Inline emphasis of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Regular,
    Bold,
    Italic,
}

/// A piece of inline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Run(Emphasis, String),
    /// Forced line break (after a `**Label**:` prefix).
    Break,
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    Bullet { depth: u8, content: Vec<Inline> },
    Numbered { depth: u8, label: String, content: Vec<Inline> },
    Rule,
    Blank,
}

const MAX_DEPTH: u8 = 3;

/// Parses `text` into blocks, one per source line.
pub fn parse(text: &str) -> Vec<Block> {
    text.lines().map(parse_line).collect()
}

fn parse_line(raw: &str) -> Block {
    let line = raw.trim();
    if line.is_empty() {
        return Block::Blank;
    }

    if is_rule(line) {
        return Block::Rule;
    }

    if line.starts_with('#') {
        let level = line.chars().take_while(|&c| c == '#').count();
        let rest = line[level..].trim();
        if !rest.is_empty() {
            return Block::Heading {
                level: level.min(4) as u8,
                content: parse_inline(rest.trim_end_matches('#').trim_end()),
            };
        }
    }

    let depth = indent_depth(raw);

    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Block::Bullet {
                depth,
                content: parse_inline(rest.trim_start()),
            };
        }
    }

    if let Some((label, rest)) = split_enumeration(line) {
        return Block::Numbered {
            depth,
            label,
            content: parse_inline(rest),
        };
    }

    Block::Paragraph(parse_inline(line))
}

/// A line made of at least three of the same rule character.
fn is_rule(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '=', '*', '_']
            .iter()
            .any(|&marker| compact.iter().all(|&c| c == marker))
}

/// Two leading spaces (or one tab) per nesting level.
fn indent_depth(raw: &str) -> u8 {
    let columns: usize = raw
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum();
    ((columns / 2) as u8).min(MAX_DEPTH)
}

/// Splits `12. text` / `12) text` into (`"12."`, `"text"`). The delimiter
/// must be followed by whitespace, so `3.5% de croissance` stays a paragraph.
fn split_enumeration(line: &str) -> Option<(String, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return None;
    }
    let rest = &line[digits..];
    let delimiter = rest.chars().next()?;
    if delimiter != '.' && delimiter != ')' {
        return None;
    }
    let after = &rest[1..];
    if !after.starts_with(char::is_whitespace) {
        return None;
    }
    let body = after.trim_start();
    if body.is_empty() {
        return None;
    }
    Some((format!("{}{}", &line[..digits], delimiter), body))
}

/// Splits a line into emphasis runs.
///
/// `**x**` is bold and `*x*` italic when `x` is non-empty, contains no
/// asterisk and has no leading or trailing whitespace. A bold run directly
/// followed by `:` forces a line break after the colon.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some((inner, after)) = delimited(rest, "**") {
            flush(&mut out, &mut plain);
            out.push(Inline::Run(Emphasis::Bold, inner.to_string()));
            rest = after;
            if let Some(after_colon) = rest.strip_prefix(':') {
                out.push(Inline::Run(Emphasis::Regular, ":".to_string()));
                out.push(Inline::Break);
                rest = after_colon.trim_start();
            }
            continue;
        }
        if let Some((inner, after)) = delimited(rest, "*") {
            flush(&mut out, &mut plain);
            out.push(Inline::Run(Emphasis::Italic, inner.to_string()));
            rest = after;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    flush(&mut out, &mut plain);
    // A trailing break carries no content.
    if out.last() == Some(&Inline::Break) {
        out.pop();
    }
    out
}

/// Matches `marker inner marker` at the start of `text`.
fn delimited<'a>(text: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let body = text.strip_prefix(marker)?;
    let end = body.find('*')?;
    if end == 0 || !body[end..].starts_with(marker) {
        return None;
    }
    let inner = &body[..end];
    if inner.trim() != inner {
        return None;
    }
    Some((inner, &body[end + marker.len()..]))
}

fn flush(out: &mut Vec<Inline>, plain: &mut String) {
    if !plain.is_empty() {
        out.push(Inline::Run(Emphasis::Regular, std::mem::take(plain)));
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(emphasis: Emphasis, text: &str) -> Inline {
        Inline::Run(emphasis, text.to_string())
    }

    #[test]
    fn test_heading_levels() {
        let blocks = parse("## ATOUTS\n### Forces\n#### Detail\n##### Deep");
        let levels: Vec<u8> = blocks
            .iter()
            .map(|b| match b {
                Block::Heading { level, .. } => *level,
                other => panic!("expected heading, got {other:?}"),
            })
            .collect();
        assert_eq!(levels, vec![2, 3, 4, 4]);
    }

    #[test]
    fn test_inline_bold_and_italic() {
        assert_eq!(
            parse_inline("Le **chiffre** reste *stable* ici"),
            vec![
                run(Emphasis::Regular, "Le "),
                run(Emphasis::Bold, "chiffre"),
                run(Emphasis::Regular, " reste "),
                run(Emphasis::Italic, "stable"),
                run(Emphasis::Regular, " ici"),
            ]
        );
    }

    #[test]
    fn test_bold_label_followed_by_colon_breaks() {
        assert_eq!(
            parse_inline("**ÉCHÉANCE**: T3 2025"),
            vec![
                run(Emphasis::Bold, "ÉCHÉANCE"),
                run(Emphasis::Regular, ":"),
                Inline::Break,
                run(Emphasis::Regular, "T3 2025"),
            ]
        );
        // a spaced colon is ordinary text
        assert_eq!(
            parse_inline("**Spécifique** : oui"),
            vec![run(Emphasis::Bold, "Spécifique"), run(Emphasis::Regular, " : oui")]
        );
    }

    #[test]
    fn test_unbalanced_markers_stay_literal() {
        assert_eq!(
            parse_inline("5 * 3 = **15"),
            vec![run(Emphasis::Regular, "5 * 3 = **15")]
        );
    }

    #[test]
    fn test_bullets_and_depth() {
        let blocks = parse("- Marché\n    - Concurrence\n• Digital");
        assert!(matches!(&blocks[0], Block::Bullet { depth: 0, .. }));
        assert!(matches!(&blocks[1], Block::Bullet { depth: 2, .. }));
        assert!(matches!(&blocks[2], Block::Bullet { depth: 0, .. }));
    }

    #[test]
    fn test_numbered_items() {
        match &parse("12. Quel est votre taux de marge ?")[0] {
            Block::Numbered { label, content, .. } => {
                assert_eq!(label, "12.");
                assert_eq!(
                    content,
                    &vec![run(Emphasis::Regular, "Quel est votre taux de marge ?")]
                );
            }
            other => panic!("expected numbered, got {other:?}"),
        }
        assert!(matches!(&parse("3) Trois")[0], Block::Numbered { .. }));
        // a year is not an enumeration
        assert!(matches!(&parse("2025 sera clé")[0], Block::Paragraph(_)));
        // neither is a decimal or a version number
        assert_eq!(
            parse("3.5% de croissance annuelle")[0],
            Block::Paragraph(vec![run(Emphasis::Regular, "3.5% de croissance annuelle")])
        );
        assert!(matches!(&parse("2.0 est prévue")[0], Block::Paragraph(_)));
        assert!(matches!(&parse("4)suite")[0], Block::Paragraph(_)));
    }

    #[test]
    fn test_rules_and_blanks() {
        let blocks = parse("==========\n\n---\n* * *\n=== DOCUMENT 1: a.pdf ===");
        assert_eq!(blocks[0], Block::Rule);
        assert_eq!(blocks[1], Block::Blank);
        assert_eq!(blocks[2], Block::Rule);
        assert_eq!(blocks[3], Block::Rule);
        assert!(matches!(blocks[4], Block::Paragraph(_)));
    }

    #[test]
    fn test_bold_line_is_not_a_bullet() {
        assert_eq!(
            parse("**Forces**")[0],
            Block::Paragraph(vec![run(Emphasis::Bold, "Forces")])
        );
    }

    #[test]
    fn test_hash_only_line_is_paragraph() {
        assert!(matches!(parse("###")[0], Block::Paragraph(_)));
    }
}
