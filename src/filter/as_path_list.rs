use regex::Regex;

use crate::filter::FilterAction;
use crate::route::AsPath;
use crate::shared::{ListVerdict, RouteMapError};

/// What `_` stands for in an AS-path regular expression: any delimiter of
/// the rendered path, or its start or end.
const UNDERSCORE_EXPANSION: &str = "(^|[,{}() ]|$)";

/// Rewrites each bare `_` into [`UNDERSCORE_EXPANSION`]. Escaped
/// underscores and those inside a bracket class are kept as written.
fn expand_underscores(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut class_depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' => {
                out.push(c);
                class_depth += 1;
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                // a leading ']' is a literal member
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if class_depth > 0 => {
                out.push(c);
                class_depth -= 1;
            }
            '_' if class_depth == 0 => out.push_str(UNDERSCORE_EXPANSION),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct AsPathListEntry {
    pub action: FilterAction,
    pub pattern: String,
    regex: Regex,
}

impl AsPathListEntry {
    pub fn new(action: FilterAction, pattern: &str) -> Result<Self, RouteMapError> {
        let regex = Regex::new(&expand_underscores(pattern)).map_err(|e| {
            RouteMapError::InvalidArgument(format!("bad as-path regex {}: {}", pattern, e))
        })?;
        Ok(AsPathListEntry {
            action,
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, rendered: &str) -> bool {
        self.regex.is_match(rendered)
    }
}

/// AS-path access-list: regular expressions over the rendered path.
#[derive(Debug, Clone)]
pub struct AsPathList {
    pub name: String,
    entries: Vec<AsPathListEntry>,
}

impl AsPathList {
    pub fn new(name: &str) -> Self {
        AsPathList {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: AsPathListEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AsPathListEntry] {
        &self.entries
    }

    pub fn apply(&self, path: &AsPath) -> ListVerdict {
        let rendered = path.to_string();
        self.entries
            .iter()
            .find(|entry| entry.matches(&rendered))
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[(FilterAction, &str)]) -> AsPathList {
        let mut list = AsPathList::new("test");
        for (action, pattern) in entries {
            list.add_entry(AsPathListEntry::new(*action, pattern).unwrap());
        }
        list
    }

    #[test]
    fn test_underscore_is_a_delimiter() {
        let list = list(&[(FilterAction::Permit, "_65001_")]);
        let path: AsPath = "65000 65001 65002".parse().unwrap();
        assert_eq!(list.apply(&path), ListVerdict::Permit);
        let path: AsPath = "650011".parse().unwrap();
        assert_eq!(list.apply(&path), ListVerdict::Deny);
        let path: AsPath = "{65001,7}".parse().unwrap();
        assert_eq!(list.apply(&path), ListVerdict::Permit);
    }

    #[test]
    fn test_anchors_and_order() {
        let list = list(&[
            (FilterAction::Deny, "^65000_"),
            (FilterAction::Permit, ".*"),
        ]);
        assert_eq!(list.apply(&"65000 1".parse().unwrap()), ListVerdict::Deny);
        assert_eq!(list.apply(&"1 65000".parse().unwrap()), ListVerdict::Permit);
        assert_eq!(list.apply(&AsPath::new()), ListVerdict::Permit);
    }

    #[test]
    fn test_underscore_inside_class_is_literal() {
        assert_eq!(expand_underscores("[_0-9]+"), "[_0-9]+");
        assert_eq!(expand_underscores("[^]_]"), "[^]_]");
        assert_eq!(expand_underscores("\\_"), "\\_");
        assert_eq!(
            expand_underscores("_[_1]_"),
            format!("{0}[_1]{0}", UNDERSCORE_EXPANSION)
        );

        let list = list(&[(FilterAction::Permit, "^[_0-9]+$")]);
        assert_eq!(list.apply(&"65001 65002".parse().unwrap()), ListVerdict::Deny);
        assert_eq!(list.apply(&"65001".parse().unwrap()), ListVerdict::Permit);
    }

    #[test]
    fn test_bad_regex() {
        assert!(AsPathListEntry::new(FilterAction::Permit, "(").is_err());
    }
}
