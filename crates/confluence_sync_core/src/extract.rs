//! Plain-text projection of Confluence storage markup.
//!
//! This is a lossy, regex-based pass and not an HTML parser: tables, macros and
//! images collapse to their text nodes.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::resolve_html5_entity;
use regex::Regex;

use crate::client::PageStatus;

static LINE_BREAK_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</p>|</div>|<br\s*/?>|</li>").expect("valid line break regex"));
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]{0,31})(;?)")
        .expect("valid entity regex")
});

/// Named references that HTML5 also recognises without a trailing `;`.
const LEGACY_ENTITIES: &[&str] = &[
    "AElig", "AMP", "Aacute", "Acirc", "Agrave", "Aring", "Atilde", "Auml", "COPY", "Ccedil",
    "ETH", "Eacute", "Ecirc", "Egrave", "Euml", "GT", "Iacute", "Icirc", "Igrave", "Iuml", "LT",
    "Ntilde", "Oacute", "Ocirc", "Ograve", "Oslash", "Otilde", "Ouml", "QUOT", "REG", "THORN",
    "Uacute", "Ucirc", "Ugrave", "Uuml", "Yacute", "aacute", "acirc", "acute", "aelig", "agrave",
    "amp", "aring", "atilde", "auml", "brvbar", "ccedil", "cedil", "cent", "copy", "curren",
    "deg", "divide", "eacute", "ecirc", "egrave", "eth", "euml", "frac12", "frac14", "frac34",
    "gt", "iacute", "icirc", "iexcl", "igrave", "iquest", "iuml", "laquo", "lt", "macr", "micro",
    "middot", "nbsp", "not", "ntilde", "oacute", "ocirc", "ograve", "ordf", "ordm", "oslash",
    "otilde", "ouml", "para", "plusmn", "pound", "quot", "raquo", "reg", "sect", "shy", "sup1",
    "sup2", "sup3", "szlig", "thorn", "times", "uacute", "ucirc", "ugrave", "uml", "uuml",
    "yacute", "yen", "yuml",
];

/// Windows-1252 characters that numeric references in 0x80..=0x9F stand for.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20ac}', '\u{81}', '\u{201a}', '\u{192}', '\u{201e}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2c6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8d}', '\u{17d}', '\u{8f}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2dc}', '\u{2122}', '\u{161}', '\u{203a}', '\u{153}', '\u{9d}', '\u{17e}', '\u{178}',
];

/// Convert storage markup to plain text.
///
/// Closing `p`/`div`/`li` tags and `br` become newlines, every other tag is
/// dropped, then character entities are decoded.
pub fn extract_text(markup: &str) -> String {
    let with_breaks = LINE_BREAK_TAGS.replace_all(markup, "\n");
    let stripped = ANY_TAG.replace_all(&with_breaks, "");
    decode_entities(&stripped).into_owned()
}

/// Decode named and numeric character references the way HTML5 parsers do.
///
/// Legacy names such as `&amp` and `&copy` decode without a `;`. Unknown
/// references are kept verbatim.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    ENTITY.replace_all(text, |captures: &regex::Captures<'_>| {
        let body = &captures[1];
        let terminator = &captures[2];
        if let Some(digits) = body.strip_prefix('#') {
            return decode_numeric(digits).into_owned();
        }
        if !terminator.is_empty()
            && let Some(value) = resolve_html5_entity(body)
        {
            return value.to_string();
        }
        for end in (1..=body.len()).rev() {
            let prefix = &body[..end];
            if LEGACY_ENTITIES.contains(&prefix)
                && let Some(value) = resolve_html5_entity(prefix)
            {
                return format!("{value}{}{terminator}", &body[end..]);
            }
        }
        captures[0].to_string()
    })
}

fn decode_numeric(digits: &str) -> Cow<'static, str> {
    let parsed = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => digits.parse::<u32>(),
    };
    // Out of range values overflow u32 and take the replacement character below.
    let code = parsed.unwrap_or(u32::MAX);
    match code {
        0 => Cow::Borrowed("\u{fffd}"),
        0x0d => Cow::Borrowed("\r"),
        0x80..=0x9f => Cow::Owned(WINDOWS_1252_HIGH[(code - 0x80) as usize].to_string()),
        0xd800..=0xdfff | 0x11_0000.. => Cow::Borrowed("\u{fffd}"),
        0x01..=0x08 | 0x0b | 0x0e..=0x1f | 0x7f | 0xfdd0..=0xfdef => Cow::Borrowed(""),
        _ if code & 0xfffe == 0xfffe => Cow::Borrowed(""),
        _ => char::from_u32(code).map_or(Cow::Borrowed("\u{fffd}"), |c| Cow::Owned(c.to_string())),
    }
}

/// Render the downloaded file: fixed header, separator, blank line, then the text body.
pub fn render_page_file(title: &str, status: PageStatus, id: &str, text: &str) -> String {
    format!("TITLE: {title}\nSTATUS: {status}\nID: {id}\n---\n\n{text}")
}
