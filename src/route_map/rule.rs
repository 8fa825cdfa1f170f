use std::fmt;
use std::sync::Arc;

use crate::route::Prefix;
use crate::route_map::evaluator::MatchContext;
use crate::route_map::registry::{CompiledRule, RuleCommand};
use crate::shared::{FilterResult, RuleFlags};

/// An installed clause: its command, compiled value and argument text.
pub struct Rule {
    cmd: Arc<dyn RuleCommand>,
    value: Box<dyn CompiledRule>,
    raw_arg: Option<String>,
    flags: RuleFlags,
}

impl Rule {
    pub fn new(
        cmd: Arc<dyn RuleCommand>,
        value: Box<dyn CompiledRule>,
        raw_arg: Option<String>,
        flags: RuleFlags,
    ) -> Self {
        Rule {
            cmd,
            value,
            raw_arg,
            flags,
        }
    }

    pub fn keyword(&self) -> &str {
        self.cmd.keyword()
    }

    pub fn raw_arg(&self) -> Option<&str> {
        self.raw_arg.as_deref()
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn apply(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        self.value.apply(prefix, ctx)
    }

    /// Clause text after the `match`/`set` verb.
    pub fn clause(&self) -> String {
        let mut text = self.keyword().to_string();
        if let Some(arg) = &self.raw_arg {
            text.push(' ');
            text.push_str(arg);
        }
        if self.flags.additive {
            text.push_str(" additive");
        }
        text
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("keyword", &self.keyword())
            .field("raw_arg", &self.raw_arg)
            .field("flags", &self.flags)
            .field("value", &self.value)
            .finish()
    }
}

/// Ordered rules of one index, at most one per keyword.
#[derive(Debug, Default)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new() -> Self {
        RuleList::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn get(&self, keyword: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.keyword() == keyword)
    }

    /// Inserts `rule`, dropping any rule with the same keyword first.
    /// Priority rules go to the front, others to the back. Returns true
    /// when an existing rule was replaced.
    pub fn install(&mut self, rule: Rule) -> bool {
        let replaced = match self.rules.iter().position(|r| r.keyword() == rule.keyword()) {
            Some(pos) => {
                self.rules.remove(pos);
                true
            }
            None => false,
        };
        if rule.flags.priority {
            self.rules.insert(0, rule);
        } else {
            self.rules.push(rule);
        }
        replaced
    }

    /// Removes the rule with `keyword`. When `arg` is given the stored
    /// argument must equal it.
    pub fn remove(&mut self, keyword: &str, arg: Option<&str>) -> Option<Rule> {
        let pos = self
            .rules
            .iter()
            .position(|r| r.keyword() == keyword && (arg.is_none() || r.raw_arg() == arg))?;
        Some(self.rules.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::CompileError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl CompiledRule for Counted {
        fn apply(&self, _prefix: &Prefix, _ctx: &mut MatchContext<'_>) -> FilterResult {
            FilterResult::Okay
        }
    }

    struct Cmd(&'static str, Arc<AtomicUsize>);

    impl RuleCommand for Cmd {
        fn keyword(&self) -> &str {
            self.0
        }

        fn compile(
            &self,
            _arg: Option<&str>,
            _flags: RuleFlags,
        ) -> Result<Box<dyn CompiledRule>, CompileError> {
            Ok(Box::new(Counted(Arc::clone(&self.1))))
        }
    }

    fn counted_rule(
        drops: &Arc<AtomicUsize>,
        keyword: &'static str,
        arg: Option<&str>,
        flags: RuleFlags,
    ) -> Rule {
        let cmd: Arc<dyn RuleCommand> = Arc::new(Cmd(keyword, Arc::clone(drops)));
        let value = cmd.compile(arg, flags).unwrap();
        Rule::new(cmd, value, arg.map(str::to_string), flags)
    }

    #[test]
    fn test_rule_list_semantics() {
        let drops = Arc::new(AtomicUsize::new(0));
        let rule = |keyword: &'static str, arg: Option<&'static str>, flags: RuleFlags| {
            counted_rule(&drops, keyword, arg, flags)
        };
        let mut list = RuleList::new();

        // replacing a keyword keeps one rule per keyword and frees the old value
        assert!(!list.install(rule("metric", Some("1"), RuleFlags::NONE)));
        assert!(!list.install(rule("tag", Some("5"), RuleFlags::NONE)));
        assert!(list.install(rule("metric", Some("2"), RuleFlags::NONE)));
        assert_eq!(list.len(), 2);
        assert_eq!(list.get("metric").unwrap().raw_arg(), Some("2"));
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        // priority rules go first
        list.install(rule("ip next-hop", Some("1.1.1.1"), RuleFlags::PRIORITY));
        let order: Vec<&str> = list.iter().map(|r| r.keyword()).collect();
        assert_eq!(order, vec!["ip next-hop", "tag", "metric"]);

        // removal honours the argument when one is given
        assert!(list.remove("metric", Some("1")).is_none());
        assert!(list.remove("metric", Some("2")).is_some());
        assert!(list.remove("tag", None).is_some());
        assert_eq!(list.len(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_clause_rendering() {
        let drops = Arc::new(AtomicUsize::new(0));
        let rule = |keyword: &'static str, arg: Option<&'static str>, flags: RuleFlags| {
            counted_rule(&drops, keyword, arg, flags)
        };
        let r = rule("community", Some("1:1"), RuleFlags::ADDITIVE);
        assert_eq!(r.clause(), "community 1:1 additive");
        let r = rule("atomic-aggregate", None, RuleFlags::NONE);
        assert_eq!(r.clause(), "atomic-aggregate");
    }
}
