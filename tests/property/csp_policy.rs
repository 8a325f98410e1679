//! The generated policy denies frames and forms whatever the inputs.

use proptest::prelude::*;
use widget_bridge::security::{build_csp, CspConfig};

fn domain_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "https://[a-z]{1,12}\\.example",
        "wss://[a-z]{1,8}\\.example:[0-9]{2,4}",
        any::<String>(),
        Just("https://*.example".to_string()),
        Just("https://a.example; frame-src *".to_string()),
    ]
}

proptest! {
    #[test]
    fn test_policy_always_denies_frames_and_forms(
        connect in prop::collection::vec(domain_strategy(), 0..4),
        resource in prop::collection::vec(domain_strategy(), 0..4),
        script_origin in prop::option::of(domain_strategy()),
    ) {
        let config = CspConfig {
            connect_domains: connect,
            resource_domains: resource,
        };
        let csp = build_csp(Some(&config), script_origin.as_deref());

        prop_assert!(csp.contains("frame-src 'none'"));
        prop_assert!(csp.contains("form-action 'none'"));
        prop_assert_eq!(csp.matches("frame-src").count(), 1);
        prop_assert!(!csp.contains('*'));
        prop_assert_eq!(csp.split("; ").count(), 11);
    }
}
