//! URL truth table and document/CSP rendering through a host session.

use crate::integration::support::test_session;
use widget_bridge::document::ERROR_DOCUMENT;
use widget_bridge::sync::Theme;

#[test]
fn test_url_truth_table() {
    let session = test_session();
    let validator = session.validator();
    let cases = [
        ("https://cdn.widgets.io/app.js", true),
        ("https://host.example/widgets/app.js", true),
        ("/assets/widget.js", true),
        ("http://localhost:5173/src/main.ts", true),
        ("http://127.0.0.1:8080/app.js", true),
        ("https://cdn.widgets.io.evil.com/app.js", false),
        ("https://evil.com/cdn.widgets.io/app.js", false),
        ("http://cdn.widgets.io/app.js", false),
        ("//cdn.widgets.io/app.js", false),
        ("javascript:alert(1)", false),
        ("data:text/javascript,alert(1)", false),
        ("", false),
    ];
    for (url, expected) in cases {
        assert_eq!(validator.is_allowed_url(url), expected, "{url}");
    }
}

#[test]
fn test_rejected_script_serves_error_document() {
    let session = test_session();
    let html = session.render_document("https://evil.example/x.js", Theme::Light);
    assert_eq!(html, ERROR_DOCUMENT);
}

#[test]
fn test_document_escapes_script_url() {
    let session = test_session();
    let html = session.render_document("/w.js?a=1&b=\"2\"", Theme::Dark);
    assert!(html.contains(r#"src="/w.js?a=1&amp;b=&quot;2&quot;""#));
    assert!(!html.contains(r#"b="2""#));
}

#[test]
fn test_csp_never_allows_frames_or_forms() {
    let session = test_session();
    for url in ["https://cdn.widgets.io/app.js", "/local.js", "https://evil.example/x.js"] {
        let csp = session.csp_for(url);
        assert!(csp.contains("frame-src 'none'"), "{csp}");
        assert!(csp.contains("form-action 'none'"), "{csp}");
    }
}
