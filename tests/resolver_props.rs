//! Property-based tests for version resolution

use depaudit::resolver::{parse_range, resolve_version};
use node_semver::Version;
use proptest::prelude::*;

fn version_string() -> impl Strategy<Value = String> {
    (0u64..5, 0u64..5, 0u64..5).prop_map(|(major, minor, patch)| format!("{}.{}.{}", major, minor, patch))
}

fn range_string() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just(""), Just("^"), Just("~"), Just(">="), Just("<"), Just("<=")],
        version_string(),
    )
        .prop_map(|(op, version)| format!("{}{}", op, version))
}

proptest! {
    #[test]
    fn test_resolved_version_is_published_and_satisfies(
        published in prop::collection::vec(version_string(), 0..12),
        range in range_string()
    ) {
        let parsed = parse_range(&range).expect("generated ranges are valid");

        match resolve_version(&published, &range) {
            Some(chosen) => {
                prop_assert!(published.contains(&chosen));
                let chosen = Version::parse(&chosen).unwrap();
                prop_assert!(parsed.satisfies(&chosen));

                for other in &published {
                    let other = Version::parse(other).unwrap();
                    if parsed.satisfies(&other) {
                        prop_assert!(other <= chosen);
                    }
                }
            }
            None => {
                for other in &published {
                    let other = Version::parse(other).unwrap();
                    prop_assert!(!parsed.satisfies(&other));
                }
            }
        }
    }

    #[test]
    fn test_wildcard_picks_the_maximum(
        published in prop::collection::vec(version_string(), 1..12)
    ) {
        let max = published
            .iter()
            .map(|v| Version::parse(v).unwrap())
            .max()
            .unwrap();

        let chosen = resolve_version(&published, "*").unwrap();
        prop_assert_eq!(Version::parse(&chosen).unwrap(), max);
    }
}
