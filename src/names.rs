//! Asset name legalization.

/// Replacement for a character that may not appear in an asset name.
fn replacement(c: char) -> &'static str {
    match c {
        'ä' => "ae",
        'ö' => "oe",
        'ü' => "ue",
        'ß' => "ss",
        'Ä' => "AE",
        'Ö' => "OE",
        'Ü' => "UE",
        _ => "-",
    }
}

fn is_legal(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == ','
}

/// Map `text` onto the characters allowed in asset names.
pub fn legalize_name(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_legal(c) {
            out.push(c);
        } else {
            out.push_str(replacement(c));
        }
    }
    out
}

/// Split comma-separated batch input into legal, non-empty names.
pub fn split_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(legalize_name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legalize() {
        assert_eq!(legalize_name("Bob"), "Bob");
        assert_eq!(legalize_name("Bär Öl"), "Baer-OEl");
        assert_eq!(legalize_name("a.b:c"), "a-b-c");
        assert_eq!(legalize_name("straße_1"), "strasse-1");
    }

    #[test]
    fn test_split_names() {
        assert_eq!(split_names("bob, lisa ,, chair"), vec!["bob", "lisa", "chair"]);
        assert!(split_names(" , ").is_empty());
    }
}
