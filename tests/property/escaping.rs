//! HTML escaping round-trips and leaves no raw markup characters.

use proptest::prelude::*;
use widget_bridge::document::{escape_html, unescape_html};

proptest! {
    #[test]
    fn test_escape_round_trip(input in any::<String>()) {
        prop_assert_eq!(unescape_html(&escape_html(&input)), input);
    }

    #[test]
    fn test_escaped_text_has_no_raw_markup(input in any::<String>()) {
        let escaped = escape_html(&input);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('>'));
        prop_assert!(!escaped.contains('"'));
        prop_assert!(!escaped.contains('\''));

        // Every '&' starts one of the five entities.
        for (i, _) in escaped.match_indices('&') {
            let rest = &escaped[i..];
            prop_assert!(
                ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"]
                    .iter()
                    .any(|entity| rest.starts_with(entity)),
                "stray ampersand in {}", escaped
            );
        }
    }
}
