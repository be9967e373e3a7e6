use regex::Regex;
use std::sync::LazyLock;

// Paired tags are removed together with everything between them.
static PAIRED_TAGS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?is)<script\b.*?</script\s*>").expect("static regex"),
        Regex::new(r"(?is)<iframe\b.*?</iframe\s*>").expect("static regex"),
        Regex::new(r"(?is)<object\b.*?</object\s*>").expect("static regex"),
    ]
});

static VOID_TAGS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)<embed\b[^>]*>").expect("static regex"),
        Regex::new(r"(?i)<link\b[^>]*>").expect("static regex"),
    ]
});

// A dangerous scheme swallows the rest of the URL up to the next quote.
static URL_SCHEMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:javascript|data):[^"']*"#).expect("static regex"));

/// Neutralize markup in user-supplied display text.
///
/// Script, iframe and object elements are dropped with their content, embed
/// and link tags are dropped, `javascript:`/`data:` URLs are cut, and the
/// remaining `< > " ' /` are HTML-escaped. The result is trimmed.
pub fn sanitize_text(text: &str) -> String {
    let mut out = text.to_string();
    for re in PAIRED_TAGS.iter().chain(VOID_TAGS.iter()) {
        out = re.replace_all(&out, "").into_owned();
    }
    out = URL_SCHEMES.replace_all(&out, "").into_owned();

    let mut escaped = String::with_capacity(out.len());
    for ch in out.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            other => escaped.push(other),
        }
    }
    escaped.trim().to_string()
}

/// Round half away from zero to `places` decimals, applied to `value * 10^places`
/// so a stored 0.35 rounds to 0.4 even though its binary form is just below it.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Render a float the way it was entered: `100` rather than `100.0`.
pub fn plain_number(value: f64) -> String {
    format!("{}", value)
}
