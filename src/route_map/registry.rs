use std::fmt;
use std::sync::Arc;

use crate::route::Prefix;
use crate::route_map::evaluator::MatchContext;
use crate::shared::{CompileError, FilterResult, RuleFlags};

/// Compiled argument of an installed rule. Dropping it releases whatever
/// compile allocated.
pub trait CompiledRule: fmt::Debug + Send + Sync {
    /// Match rules answer `Match`, `NoMatch`, `DenyMatch` or `Error`;
    /// set rules rewrite the route and answer `Okay`.
    fn apply(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult;
}

/// One clause type, registered under its keyword.
pub trait RuleCommand: Send + Sync {
    fn keyword(&self) -> &str;

    /// Turns the clause argument into its compiled form. Must not leave
    /// partial state behind on failure.
    fn compile(
        &self,
        arg: Option<&str>,
        flags: RuleFlags,
    ) -> Result<Box<dyn CompiledRule>, CompileError>;

    fn comment(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Match,
    Set,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleKind::Match => "match",
            RuleKind::Set => "set",
        };
        write!(f, "{}", s)
    }
}

/// Keyword tables for match and set rules. The same keyword may live in
/// both tables with different meaning.
#[derive(Default)]
pub struct RuleRegistry {
    match_cmds: Vec<Arc<dyn RuleCommand>>,
    set_cmds: Vec<Arc<dyn RuleCommand>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("match", &self.keywords(RuleKind::Match))
            .field("set", &self.keywords(RuleKind::Set))
            .finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        RuleRegistry::default()
    }

    pub fn install_match(&mut self, cmd: Arc<dyn RuleCommand>) {
        Self::install(&mut self.match_cmds, cmd);
    }

    pub fn install_set(&mut self, cmd: Arc<dyn RuleCommand>) {
        Self::install(&mut self.set_cmds, cmd);
    }

    pub fn lookup_match(&self, keyword: &str) -> Option<Arc<dyn RuleCommand>> {
        Self::lookup(&self.match_cmds, keyword)
    }

    pub fn lookup_set(&self, keyword: &str) -> Option<Arc<dyn RuleCommand>> {
        Self::lookup(&self.set_cmds, keyword)
    }

    pub fn lookup_kind(&self, kind: RuleKind, keyword: &str) -> Option<Arc<dyn RuleCommand>> {
        match kind {
            RuleKind::Match => self.lookup_match(keyword),
            RuleKind::Set => self.lookup_set(keyword),
        }
    }

    pub fn keywords(&self, kind: RuleKind) -> Vec<&str> {
        self.table(kind).iter().map(|cmd| cmd.keyword()).collect()
    }

    /// Splits clause text such as `"ip address prefix-list LIST"` into the
    /// longest registered keyword that prefixes it on a word boundary and
    /// the remaining argument.
    pub fn split_clause<'a>(&self, kind: RuleKind, text: &'a str) -> Option<(String, Option<&'a str>)> {
        let text = text.trim();
        self.table(kind)
            .iter()
            .map(|cmd| cmd.keyword())
            .filter(|keyword| match text.strip_prefix(*keyword) {
                Some(rest) => rest.is_empty() || rest.starts_with(' '),
                None => false,
            })
            .max_by_key(|keyword| keyword.len())
            .map(|keyword| {
                let rest = text[keyword.len()..].trim();
                let arg = if rest.is_empty() { None } else { Some(rest) };
                (keyword.to_string(), arg)
            })
    }

    fn table(&self, kind: RuleKind) -> &[Arc<dyn RuleCommand>] {
        match kind {
            RuleKind::Match => &self.match_cmds,
            RuleKind::Set => &self.set_cmds,
        }
    }

    fn install(table: &mut Vec<Arc<dyn RuleCommand>>, cmd: Arc<dyn RuleCommand>) {
        match table.iter_mut().find(|c| c.keyword() == cmd.keyword()) {
            Some(slot) => *slot = cmd,
            None => table.push(cmd),
        }
    }

    fn lookup(table: &[Arc<dyn RuleCommand>], keyword: &str) -> Option<Arc<dyn RuleCommand>> {
        table.iter().find(|c| c.keyword() == keyword).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Constant(FilterResult);

    impl CompiledRule for Constant {
        fn apply(&self, _prefix: &Prefix, _ctx: &mut MatchContext<'_>) -> FilterResult {
            self.0
        }
    }

    struct Fixed {
        keyword: &'static str,
        comment: &'static str,
    }

    impl RuleCommand for Fixed {
        fn keyword(&self) -> &str {
            self.keyword
        }

        fn compile(
            &self,
            _arg: Option<&str>,
            _flags: RuleFlags,
        ) -> Result<Box<dyn CompiledRule>, CompileError> {
            Ok(Box::new(Constant(FilterResult::Match)))
        }

        fn comment(&self) -> Option<&str> {
            Some(self.comment)
        }
    }

    fn fixed(keyword: &'static str, comment: &'static str) -> Arc<dyn RuleCommand> {
        Arc::new(Fixed { keyword, comment })
    }

    #[test]
    fn test_reinstall_replaces_in_place() {
        let mut registry = RuleRegistry::new();
        registry.install_match(fixed("a", "first"));
        registry.install_match(fixed("b", "second"));
        registry.install_match(fixed("a", "third"));

        assert_eq!(registry.keywords(RuleKind::Match), vec!["a", "b"]);
        let cmd = registry.lookup_match("a").unwrap();
        assert_eq!(cmd.comment(), Some("third"));
    }

    #[test]
    fn test_match_and_set_tables_are_separate() {
        let mut registry = RuleRegistry::new();
        registry.install_match(fixed("metric", "match"));
        assert!(registry.lookup_match("metric").is_some());
        assert!(registry.lookup_set("metric").is_none());
        registry.install_set(fixed("metric", "set"));
        assert_eq!(registry.lookup_set("metric").unwrap().comment(), Some("set"));
        assert_eq!(registry.lookup_match("metric").unwrap().comment(), Some("match"));
    }

    #[test]
    fn test_split_clause_prefers_longest_keyword() {
        let mut registry = RuleRegistry::new();
        registry.install_match(fixed("ip address", ""));
        registry.install_match(fixed("ip address prefix-list", ""));
        registry.install_set(fixed("atomic-aggregate", ""));

        assert_eq!(
            registry.split_clause(RuleKind::Match, "ip address prefix-list PL"),
            Some(("ip address prefix-list".to_string(), Some("PL")))
        );
        assert_eq!(
            registry.split_clause(RuleKind::Match, "ip address 10"),
            Some(("ip address".to_string(), Some("10")))
        );
        assert_eq!(
            registry.split_clause(RuleKind::Set, "atomic-aggregate"),
            Some(("atomic-aggregate".to_string(), None))
        );
        assert_eq!(registry.split_clause(RuleKind::Match, "ip addressx 10"), None);
        assert_eq!(registry.split_clause(RuleKind::Set, "ip address 10"), None);
    }
}
