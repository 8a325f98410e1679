//! Bootstrap document builder.
//!
//! Renders the guest's initial HTML when the host synthesizes the frame document
//! itself. Every interpolated value passes through [`escape_html`].

use crate::security::OriginValidator;
use tracing::warn;

/// Served in place of the widget when the script URL fails validation.
pub const ERROR_DOCUMENT: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Widget unavailable</title>\n</head>\n<body>\n<p>This widget could not be loaded.</p>\n</body>\n</html>\n";

/// Escape `& < > " '` for use in element content or quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_html`]. Single pass, so `&amp;lt;` decodes to `&lt;`.
pub fn unescape_html(input: &str) -> String {
    const ENTITIES: &[(&str, char)] = &[
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
        ("&#x27;", '\''),
    ];

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    'outer: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (entity, decoded) in ENTITIES {
            if rest.starts_with(entity) {
                out.push(*decoded);
                rest = &rest[entity.len()..];
                continue 'outer;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

/// Render the guest document, or [`ERROR_DOCUMENT`] if `script_url` is not allowed.
pub fn build_bootstrap_document(
    validator: &OriginValidator,
    script_url: &str,
    theme: &str,
    csp: &str,
) -> String {
    if !validator.is_allowed_url(script_url) {
        warn!("serving error document for rejected widget script");
        return ERROR_DOCUMENT.to_string();
    }

    let script_url = escape_html(script_url);
    let theme = escape_html(theme);
    let csp = escape_html(csp);

    format!(
        r#"<!DOCTYPE html>
<html lang="en" data-theme="{theme}">
<head>
<meta charset="utf-8">
<meta http-equiv="Content-Security-Policy" content="{csp}">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="color-scheme" content="{theme}">
<style>
html, body {{ margin: 0; padding: 0; background: transparent; }}
#root {{ width: 100%; }}
</style>
</head>
<body>
<div id="root"></div>
<script type="module" src="{script_url}"></script>
</body>
</html>
"#
    )
}
