//! Just enough HTML reading for listing and event pages.
//!
//! Pages are server-rendered with JSON-LD blocks, so a handful of patterns
//! over the raw markup covers what we need: anchor hrefs, `ld+json` scripts,
//! the first `<h1>`, and `<meta property=... content=...>` pairs.

use regex::Regex;

pub struct Patterns {
    anchor_href: Regex,
    ld_json: Regex,
    h1: Regex,
    meta_tag: Regex,
    attribute: Regex,
    tag: Regex,
}

impl Patterns {
    pub fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            anchor_href: Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            ld_json: Regex::new(
                r#"(?is)<script\b[^>]*\btype\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
            )?,
            h1: Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>")?,
            meta_tag: Regex::new(r"(?is)<meta\b[^>]*>")?,
            attribute: Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
        })
    }

    /// Every `href` value in document order, entity-decoded.
    pub fn hrefs<'a>(&'a self, html: &'a str) -> impl Iterator<Item = String> + 'a {
        self.anchor_href.captures_iter(html).filter_map(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| decode_entities(m.as_str().trim()))
        })
    }

    /// Raw bodies of `<script type="application/ld+json">` blocks.
    pub fn ld_json_blocks<'a>(&'a self, html: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.ld_json
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
    }

    /// Text of the first `<h1>`, tags stripped, whitespace collapsed.
    pub fn first_h1(&self, html: &str) -> Option<String> {
        let inner = self.h1.captures(html)?.get(1)?.as_str();
        let text = self.tag.replace_all(inner, " ");
        let text = collapse_whitespace(&decode_entities(&text));
        (!text.is_empty()).then_some(text)
    }

    /// `content` of the first `<meta>` whose `property` (or `name`) is `key`.
    pub fn meta_content(&self, html: &str, key: &str) -> Option<String> {
        for tag in self.meta_tag.find_iter(html) {
            let mut matches_key = false;
            let mut content = None;
            for attr in self.attribute.captures_iter(tag.as_str()) {
                let name = attr.get(1).map(|m| m.as_str()).unwrap_or_default();
                let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str()).unwrap_or_default();
                if (name.eq_ignore_ascii_case("property") || name.eq_ignore_ascii_case("name")) && value == key {
                    matches_key = true;
                } else if name.eq_ignore_ascii_case("content") {
                    content = Some(value);
                }
            }
            if matches_key {
                let value = collapse_whitespace(&decode_entities(content.unwrap_or_default()));
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        None
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the named entities that show up in titles and URLs, plus numeric
/// references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';').filter(|&i| i <= 10) else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" | "#39" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse::<u32>().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
