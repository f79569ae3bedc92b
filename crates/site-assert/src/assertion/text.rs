//! Text assertion primitives.
//!
//! Each primitive appends one diagnostic per failing fragment to the caller's
//! [`AssertionFailures`]. Diagnostics can be customised with a message template
//! in which `$fragment` is replaced by the failing fragment.

use super::soft::AssertionFailures;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the failing fragment inside message templates
pub const FRAGMENT_PLACEHOLDER: &str = "$fragment";

/// A single expected string or an ordered list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragments {
    /// One fragment
    One(String),
    /// Ordered fragments
    Many(Vec<String>),
}

impl Fragments {
    /// Fragments as a slice, a single string being a one-element list
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(s) => std::slice::from_ref(s),
            Self::Many(v) => v,
        }
    }

    /// Apply `f` to every fragment, keeping the shape
    #[must_use]
    pub fn map(&self, mut f: impl FnMut(&str) -> String) -> Self {
        match self {
            Self::One(s) => Self::One(f(s)),
            Self::Many(v) => Self::Many(v.iter().map(|s| f(s)).collect()),
        }
    }
}

impl From<&str> for Fragments {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for Fragments {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<String>> for Fragments {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl From<Vec<&str>> for Fragments {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Fragments {
    fn from(v: [&str; N]) -> Self {
        Self::Many(v.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Where a fragment was (or was not) found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMatch {
    /// Found at the given byte offset
    Found(usize),
    /// Present in the text, but only before an earlier fragment's match
    OutOfOrder,
    /// Absent from the text
    Missing,
}

fn render(template: Option<&str>, fragment: &str, fallback: impl FnOnce() -> String) -> String {
    match template {
        Some(t) => t.replace(FRAGMENT_PLACEHOLDER, fragment),
        None => fallback(),
    }
}

/// Locate every fragment, honouring relative order when `strict_order` is set.
///
/// Under strict order a fragment must match at or after the furthest match of
/// the fragments before it; matches may overlap or repeat.
#[must_use]
pub fn locate_fragments(text: &str, fragments: &[String], strict_order: bool) -> Vec<FragmentMatch> {
    let mut max_pos = 0usize;
    fragments
        .iter()
        .map(|fragment| {
            if !strict_order {
                return text
                    .find(fragment.as_str())
                    .map_or(FragmentMatch::Missing, FragmentMatch::Found);
            }
            match text[max_pos..].find(fragment.as_str()) {
                Some(offset) => {
                    max_pos += offset;
                    FragmentMatch::Found(max_pos)
                }
                None if text.contains(fragment.as_str()) => FragmentMatch::OutOfOrder,
                None => FragmentMatch::Missing,
            }
        })
        .collect()
}

/// Every fragment must appear in `text`, in list order when `strict_order` is set
pub fn contains_all(
    failures: &mut AssertionFailures,
    label: &str,
    text: &str,
    fragments: &Fragments,
    strict_order: bool,
    template: Option<&str>,
) {
    let expected = fragments.as_slice();
    for (fragment, found) in expected.iter().zip(locate_fragments(text, expected, strict_order)) {
        match found {
            FragmentMatch::Found(_) => failures.pass(),
            FragmentMatch::Missing => failures.push(render(template, fragment, || {
                format!("{label} does not contain \"{fragment}\"")
            })),
            FragmentMatch::OutOfOrder => failures.push(render(template, fragment, || {
                format!("{label} contains \"{fragment}\" but not in the expected order")
            })),
        }
    }
}

/// None of the fragments may appear in `text`
pub fn not_contains_any(
    failures: &mut AssertionFailures,
    label: &str,
    text: &str,
    fragments: &Fragments,
    template: Option<&str>,
) {
    for fragment in fragments.as_slice() {
        failures.check(!text.contains(fragment.as_str()), || {
            render(template, fragment, || {
                format!("{label} contains forbidden \"{fragment}\"")
            })
        });
    }
}

/// `text` must begin with every given fragment
pub fn starts_with(
    failures: &mut AssertionFailures,
    label: &str,
    text: &str,
    fragments: &Fragments,
    template: Option<&str>,
) {
    for fragment in fragments.as_slice() {
        failures.check(text.starts_with(fragment.as_str()), || {
            render(template, fragment, || {
                format!("{label} does not start with \"{fragment}\"")
            })
        });
    }
}

/// `text` must end with every given fragment
pub fn ends_with(
    failures: &mut AssertionFailures,
    label: &str,
    text: &str,
    fragments: &Fragments,
    template: Option<&str>,
) {
    for fragment in fragments.as_slice() {
        failures.check(text.ends_with(fragment.as_str()), || {
            render(template, fragment, || {
                format!("{label} does not end with \"{fragment}\"")
            })
        });
    }
}

/// `text` must be exactly `expected`
pub fn equals(failures: &mut AssertionFailures, label: &str, text: &str, expected: &str) {
    failures.check(text == expected, || {
        format!("{label} expected to be \"{expected}\" but was \"{text}\"")
    });
}

/// `text` must match `pattern` somewhere
pub fn matches_regex(failures: &mut AssertionFailures, label: &str, text: &str, pattern: &Regex) {
    failures.check(pattern.is_match(text), || {
        format!("{label} does not match regular expression /{}/", pattern.as_str())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(f: impl FnOnce(&mut AssertionFailures)) -> AssertionFailures {
        let mut failures = AssertionFailures::new();
        f(&mut failures);
        failures
    }

    mod fragments_tests {
        use super::*;

        #[test]
        fn test_single_string_is_one_element_list() {
            let f = Fragments::from("abc");
            assert_eq!(f.as_slice(), ["abc"]);
        }

        #[test]
        fn test_deserialize_string_or_list() {
            let one: Fragments = serde_json::from_str("\"x\"").unwrap();
            let many: Fragments = serde_json::from_str("[\"x\", \"y\"]").unwrap();
            assert_eq!(one, Fragments::One("x".to_string()));
            assert_eq!(many.as_slice().len(), 2);
        }

        #[test]
        fn test_map_keeps_shape() {
            let f = Fragments::from(["a", "b"]).map(|s| s.to_uppercase());
            assert_eq!(f, Fragments::from(["A", "B"]));
        }
    }

    mod contains_tests {
        use super::*;

        #[test]
        fn test_contains_all_in_order() {
            let failures = run(|f| {
                contains_all(f, "body", "alpha beta gamma", &["alpha", "gamma"].into(), true, None);
            });
            assert!(failures.is_empty());
            assert_eq!(failures.check_count(), 2);
        }

        #[test]
        fn test_out_of_order_is_distinct_from_missing() {
            let failures = run(|f| {
                contains_all(f, "body", "alpha beta", &["beta", "alpha", "delta"].into(), true, None);
            });
            assert_eq!(failures.len(), 2);
            assert!(failures.messages()[0].contains("not in the expected order"));
            assert!(failures.messages()[0].contains("alpha"));
            assert!(failures.messages()[1].contains("does not contain \"delta\""));
        }

        #[test]
        fn test_unordered_accepts_any_order() {
            let failures = run(|f| {
                contains_all(f, "body", "alpha beta", &["beta", "alpha"].into(), false, None);
            });
            assert!(failures.is_empty());
        }

        #[test]
        fn test_repeated_and_overlapping_fragments() {
            let failures = run(|f| {
                contains_all(f, "body", "aaa", &["aa", "aa", "a"].into(), true, None);
            });
            assert!(failures.is_empty());
        }

        #[test]
        fn test_later_occurrence_satisfies_order() {
            let failures = run(|f| {
                contains_all(f, "body", "x y x", &["y", "x"].into(), true, None);
            });
            assert!(failures.is_empty());
        }

        #[test]
        fn test_every_failing_fragment_reported() {
            let failures = run(|f| {
                contains_all(f, "body", "", &["a", "b", "c"].into(), true, None);
            });
            assert_eq!(failures.len(), 3);
        }

        #[test]
        fn test_template_substitutes_fragment() {
            let failures = run(|f| {
                contains_all(f, "body", "abc", &"zzz".into(), true, Some("missing <$fragment>"));
            });
            assert_eq!(failures.messages(), ["missing <zzz>"]);
        }
    }

    mod prefix_suffix_tests {
        use super::*;

        #[test]
        fn test_starts_with() {
            let failures = run(|f| {
                starts_with(f, "source html", "<!DOCTYPE html><html>", &"<!DOCTYPE".into(), None);
                starts_with(f, "source html", "<!DOCTYPE html><html>", &"<html".into(), None);
            });
            assert_eq!(failures.len(), 1);
            assert!(failures.messages()[0].contains("does not start with \"<html\""));
        }

        #[test]
        fn test_ends_with() {
            let failures = run(|f| {
                ends_with(f, "body", "hello world", &"world".into(), None);
                ends_with(f, "body", "hello world", &"World".into(), None);
            });
            assert_eq!(failures.len(), 1);
        }

        #[test]
        fn test_equals_reports_both_values() {
            let failures = run(|f| equals(f, "response", "actual", "wanted"));
            assert!(failures.messages()[0].contains("\"wanted\""));
            assert!(failures.messages()[0].contains("\"actual\""));
        }

        #[test]
        fn test_matches_regex() {
            let re = Regex::new(r"<title>\w+</title>").unwrap();
            let failures = run(|f| {
                matches_regex(f, "html", "<title>Home</title>", &re);
                matches_regex(f, "html", "<title></title>", &re);
            });
            assert_eq!(failures.len(), 1);
            assert!(failures.messages()[0].contains("regular expression"));
        }
    }

    mod not_contains_tests {
        use super::*;

        #[test]
        fn test_not_contains_any() {
            let failures = run(|f| {
                not_contains_any(f, "body", "all good here", &["error", "good"].into(), None);
            });
            assert_eq!(failures.len(), 1);
            assert!(failures.messages()[0].contains("good"));
        }
    }

    proptest! {
        #[test]
        fn prop_ordered_fragments_pass(parts in proptest::collection::vec("[a-z]{1,6}", 1..6)) {
            let text = parts.join("-");
            let failures = run(|f| contains_all(f, "t", &text, &parts.clone().into(), true, None));
            prop_assert!(failures.is_empty());
        }

        #[test]
        fn prop_absent_fragment_not_contained(text in "[a-z ]{0,40}", needle in "[0-9]{1,4}") {
            let failures = run(|f| not_contains_any(f, "t", &text, &needle.clone().into(), None));
            prop_assert!(failures.is_empty());
            let present = format!("{text}{needle}");
            let failures = run(|f| not_contains_any(f, "t", &present, &needle.clone().into(), None));
            prop_assert_eq!(failures.len(), 1);
            prop_assert!(failures.messages()[0].contains(&needle));
        }
    }
}
