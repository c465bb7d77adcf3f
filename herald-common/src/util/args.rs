use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ARG_GROUPS: Regex = Regex::new(r#"\s*(?:"([^"]*)"|'([^']*)'|(\S+))\s*"#).unwrap();
    static ref ARG_GROUPS_DOUBLE: Regex = Regex::new(r#"\s*(?:"([^"]*)"|(\S+))\s*"#).unwrap();
}

/// Splits an argument string into whitespace-separated groups, honouring
/// quoted spans. When `count` is given, at most that many groups are produced
/// and the final group swallows the rest of the string (with any wrapping
/// quotes stripped).
pub fn parse_arg_groups(arg_string: &str, count: Option<usize>, allow_single_quote: bool) -> Vec<String> {
    let normalized = remove_smart_quotes(arg_string, allow_single_quote);
    let re: &Regex = if allow_single_quote {
        &ARG_GROUPS
    } else {
        &ARG_GROUPS_DOUBLE
    };

    let limit = count.unwrap_or(usize::MAX);
    let mut result = Vec::new();
    let mut last_end = 0usize;
    let mut taken = 0usize;
    let mut limited = false;

    for caps in re.captures_iter(&normalized) {
        if taken + 1 >= limit {
            limited = true;
            break;
        }
        let group = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default();
        result.push(group);
        last_end = caps.get(0).unwrap().end();
        taken += 1;
    }

    if limited && last_end < normalized.len() {
        let rest = &normalized[last_end..];
        if !rest.is_empty() {
            result.push(strip_wrapping_quotes(rest, allow_single_quote).to_owned());
        }
    }

    result
}

/// Strips one pair of matching wrapping quotes, if present.
pub fn strip_wrapping_quotes(input: &str, allow_single_quote: bool) -> &str {
    let bytes = input.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let quoted = first == b'"' || (allow_single_quote && first == b'\'');
        if quoted && bytes[bytes.len() - 1] == first {
            return &input[1..input.len() - 1];
        }
    }
    input
}

fn remove_smart_quotes(input: &str, allow_single_quote: bool) -> String {
    let mut out = input.to_owned();
    if allow_single_quote {
        out = out.replace(['\u{2018}', '\u{2019}'], "'");
    }
    out.replace(['\u{201c}', '\u{201d}'], "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(parse_arg_groups("one two three", None, true), vec!["one", "two", "three"]);
    }

    #[test]
    fn quoted_spans_stay_together() {
        assert_eq!(
            parse_arg_groups("\"one two\" three", None, true),
            vec!["one two", "three"]
        );
        assert_eq!(parse_arg_groups("'a b' c", None, true), vec!["a b", "c"]);
    }

    #[test]
    fn single_quotes_ignored_when_disabled() {
        assert_eq!(parse_arg_groups("'a b' c", None, false), vec!["'a", "b'", "c"]);
    }

    #[test]
    fn count_cutoff_joins_remainder() {
        assert_eq!(
            parse_arg_groups("one two three four", Some(2), true),
            vec!["one", "two three four"]
        );
        assert_eq!(parse_arg_groups("solo", Some(1), true), vec!["solo"]);
    }

    #[test]
    fn remainder_strips_wrapping_quotes() {
        assert_eq!(
            parse_arg_groups("key \"the rest\"", Some(2), true),
            vec!["key", "the rest"]
        );
    }

    #[test]
    fn smart_quotes_are_normalised() {
        assert_eq!(
            parse_arg_groups("\u{201c}one two\u{201d} three", None, true),
            vec!["one two", "three"]
        );
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_arg_groups("", None, true).is_empty());
    }
}
