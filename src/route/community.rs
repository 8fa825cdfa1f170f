use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::shared::CompileError;

pub const COMMUNITY_INTERNET: u32 = 0x0000_0000;
pub const COMMUNITY_NO_EXPORT: u32 = 0xFFFF_FF01;
pub const COMMUNITY_NO_ADVERTISE: u32 = 0xFFFF_FF02;
pub const COMMUNITY_LOCAL_AS: u32 = 0xFFFF_FF03;

lazy_static::lazy_static! {
    static ref WELL_KNOWN_COMMUNITIES: HashMap<&'static str, u32> = HashMap::from([
        ("internet", COMMUNITY_INTERNET),
        ("no-export", COMMUNITY_NO_EXPORT),
        ("no-advertise", COMMUNITY_NO_ADVERTISE),
        ("local-AS", COMMUNITY_LOCAL_AS),
    ]);
}

/// Renders a single community value the way it is written in configuration.
pub fn community_value_str(value: u32) -> String {
    match value {
        COMMUNITY_INTERNET => "internet".to_string(),
        COMMUNITY_NO_EXPORT => "no-export".to_string(),
        COMMUNITY_NO_ADVERTISE => "no-advertise".to_string(),
        COMMUNITY_LOCAL_AS => "local-AS".to_string(),
        v => format!("{}:{}", v >> 16, v & 0xFFFF),
    }
}

fn parse_community_value(token: &str) -> Result<u32, CompileError> {
    if let Some(value) = WELL_KNOWN_COMMUNITIES.get(token) {
        return Ok(*value);
    }
    if let Some((high, low)) = token.split_once(':') {
        let high = high
            .parse::<u16>()
            .map_err(|_| CompileError::new(format!("malformed community {}", token)))?;
        let low = low
            .parse::<u16>()
            .map_err(|_| CompileError::new(format!("malformed community {}", token)))?;
        return Ok(((high as u32) << 16) | low as u32);
    }
    token
        .parse::<u32>()
        .map_err(|_| CompileError::new(format!("malformed community {}", token)))
}

/// Standard communities attribute (RFC 1997). Values keep their insertion
/// order until [`Community::uniq_sort`] is called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Community {
    values: Vec<u32>,
}

impl Community {
    pub fn new() -> Self {
        Community::default()
    }

    pub fn from_values(values: Vec<u32>) -> Self {
        Community { values }
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    pub fn contains_all(&self, other: &Community) -> bool {
        other.values.iter().all(|v| self.contains(*v))
    }

    /// Appends `other` without removing duplicates.
    pub fn merge(&mut self, other: &Community) {
        self.values.extend_from_slice(&other.values);
    }

    pub fn uniq_sort(&mut self) {
        self.values.sort_unstable();
        self.values.dedup();
    }

    pub fn remove(&mut self, value: u32) {
        self.values.retain(|v| *v != value);
    }

    /// Same set of values, ignoring order and duplicates.
    pub fn same_set(&self, other: &Community) -> bool {
        self.contains_all(other) && other.contains_all(self)
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| community_value_str(*v)).collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl FromStr for Community {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(parse_community_value)
            .collect::<Result<Vec<u32>, CompileError>>()?;
        if values.is_empty() {
            return Err(CompileError::new("empty community"));
        }
        Ok(Community { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_known_and_numeric() {
        let com: Community = "65001:100 no-export 4259905636".parse().unwrap();
        assert_eq!(com.values(), &[(65001 << 16) | 100, COMMUNITY_NO_EXPORT, 4259905636]);
        assert_eq!(com.to_string(), "65001:100 no-export 65001:100");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Community>().is_err());
        assert!("70000:1".parse::<Community>().is_err());
        assert!("no-such-thing".parse::<Community>().is_err());
    }

    #[test]
    fn test_merge_then_uniq_sort() {
        let mut com: Community = "2:2 1:1".parse().unwrap();
        com.merge(&"1:1 3:3".parse().unwrap());
        assert_eq!(com.len(), 4);
        com.uniq_sort();
        assert_eq!(com.to_string(), "1:1 2:2 3:3");
    }
}
