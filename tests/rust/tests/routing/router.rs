//! NameRouter and namespace path properties

use nsmux_core::{normalize_namespace_path, ManagementError, NameRouter};
use pretty_assertions::assert_eq;
use tests::fixtures::name;

#[test]
fn add_prefix_round_trip() {
    let router = NameRouter::new("", "ns1").unwrap();

    let source = router.to_source_view(&name("D:k=v"), true).unwrap();
    assert_eq!(source.to_string(), "ns1//D:k=v");
    assert_eq!(
        router.to_target_view(&source, true).unwrap().to_string(),
        "D:k=v"
    );
}

#[test]
fn round_trips_hold_in_both_directions() {
    let cases = [("", "a"), ("a", ""), ("a", "b//c"), ("x//y", "z")];
    for (remove, add) in cases {
        let router = NameRouter::new(remove, add).unwrap();
        let target_prefix = if remove.is_empty() {
            String::new()
        } else {
            format!("{}//", remove)
        };

        let target = name(&format!("{}D:type=Cache,id=1", target_prefix));
        let source = router.to_source_view(&target, true).unwrap();
        assert_eq!(router.to_target_view(&source, true).unwrap(), target);

        let back = router.to_target_view(&source, true).unwrap();
        assert_eq!(router.to_source_view(&back, true).unwrap(), source);
    }
}

#[test]
fn equal_prefixes_are_identity() {
    let router = NameRouter::new("a//b", "//a//b//").unwrap();
    assert!(router.is_identity());

    for text in ["D:k=v", "//D:k=v", "a//b//D:k=v", "other//*:*"] {
        let input = name(text);
        assert_eq!(router.to_source_view(&input, true).unwrap(), input);
        assert_eq!(router.to_target_view(&input, false).unwrap(), input);
    }
}

#[test]
fn names_outside_the_removed_namespace_are_rejected() {
    let router = NameRouter::new("a", "").unwrap();
    let err = router.to_source_view(&name("b//D:k=v"), true).unwrap_err();
    assert!(matches!(err, ManagementError::InvalidName { .. }));
}

#[test]
fn leading_separators_are_kept_unless_stripped() {
    let router = NameRouter::new("", "ns1").unwrap();
    let input = name("//D:k=v");

    assert_eq!(router.to_source_view(&input, false).unwrap(), input);
    assert_eq!(
        router.to_source_view(&input, true).unwrap().to_string(),
        "ns1//D:k=v"
    );
}

#[test]
fn normalization_is_idempotent() {
    assert_eq!(
        normalize_namespace_path("//a//b//", true, true, false).unwrap(),
        "a//b"
    );

    for path in ["//a//b//", "a////b", "a", "", "//", "a//b//c//"] {
        for (leading, trailing) in [(true, true), (true, false), (false, true), (false, false)] {
            let once = normalize_namespace_path(path, leading, trailing, false).unwrap();
            let twice = normalize_namespace_path(&once, leading, trailing, false).unwrap();
            assert_eq!(once, twice, "path {:?}", path);
        }
    }
}

#[test]
fn malformed_paths_are_rejected() {
    for path in ["a///b", "a///b//c", "a/"] {
        assert!(
            normalize_namespace_path(path, true, true, false).is_err(),
            "path {:?}",
            path
        );
        assert!(NameRouter::new("", path).is_err(), "path {:?}", path);
    }
}
