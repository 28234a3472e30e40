//! Render-then-match round trips for path templates.

use cg3_core::{Fields, PathTemplate};
use proptest::prelude::*;

fn fields(pairs: &[(&str, &String)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

proptest! {
    #[test]
    fn version_layout_round_trips(
        kind in "[a-z]{1,6}",
        name in "[A-Za-z0-9-]{1,12}",
        dep in "[a-z]{1,8}",
        version in "[0-9]{1,4}",
        user in "[a-z]{1,8}",
        extension in "[a-z]{1,3}",
    ) {
        let template = PathTemplate::parse("${kind}/${name}/${dep}/v${version}_${user}.${extension}").unwrap();
        let fields = fields(&[
            ("kind", &kind),
            ("name", &name),
            ("dep", &dep),
            ("version", &version),
            ("user", &user),
            ("extension", &extension),
        ]);

        let path = template.render(&fields).unwrap();
        let matched = template.pattern().unwrap().matches(&path);
        prop_assert_eq!(matched, Some(fields));
    }

    #[test]
    fn metacharacter_literals_round_trip(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
        let template = PathTemplate::parse("(${a})+/${b}.[x]*").unwrap();
        let fields = fields(&[("a", &a), ("b", &b)]);

        let path = template.render(&fields).unwrap();
        prop_assert_eq!(&path, &format!("({})+/{}.[x]*", a, b));
        prop_assert_eq!(template.pattern().unwrap().matches(&path), Some(fields));
    }

    #[test]
    fn other_segments_never_match(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let template = PathTemplate::parse("${a}/${b}.ma").unwrap();
        let pattern = template.pattern().unwrap();
        let nested = format!("{}/{}/{}.ma", a, b, b);
        prop_assert!(pattern.matches(&nested).is_none());
        let wrong_extension = format!("{}/{}.mb", a, b);
        prop_assert!(pattern.matches(&wrong_extension).is_none());
    }
}
