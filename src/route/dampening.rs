use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::shared::CompileError;

pub const DEFAULT_HALF_LIFE_MIN: u64 = 15;
pub const DEFAULT_REUSE: u32 = 750;
pub const DEFAULT_SUPPRESS: u32 = 2000;
pub const DEFAULT_MAX_SUPPRESS_MIN: u64 = DEFAULT_HALF_LIFE_MIN * 4;

/// Route flap dampening parameters attached to a route by policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DampeningConfig {
    pub half_life: Duration,
    pub reuse: u32,
    pub suppress: u32,
    pub max_suppress: Duration,
    pub unreach_half_life: Duration,
}

impl Default for DampeningConfig {
    fn default() -> Self {
        DampeningConfig {
            half_life: minutes(DEFAULT_HALF_LIFE_MIN),
            reuse: DEFAULT_REUSE,
            suppress: DEFAULT_SUPPRESS,
            max_suppress: minutes(DEFAULT_MAX_SUPPRESS_MIN),
            unreach_half_life: minutes(DEFAULT_HALF_LIFE_MIN),
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

fn parse_in_range<T>(token: &str, what: &str, min: T, max: T) -> Result<T, CompileError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let value = token
        .parse::<T>()
        .map_err(|_| CompileError::new(format!("malformed {} {}", what, token)))?;
    if value < min || value > max {
        return Err(CompileError::new(format!(
            "{} {} out of range {}..={}",
            what, value, min, max
        )));
    }
    Ok(value)
}

impl FromStr for DampeningConfig {
    type Err = CompileError;

    /// Parses `[HALF-LIFE [REUSE SUPPRESS MAX-SUPPRESS [UNREACH-HALF-LIFE]]]`,
    /// times in minutes. Omitted fields keep their defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let mut config = DampeningConfig::default();

        match tokens.len() {
            0 => return Ok(config),
            1 | 4 | 5 => {}
            n => {
                return Err(CompileError::new(format!(
                    "dampening takes 0, 1, 4 or 5 parameters, got {}",
                    n
                )))
            }
        }

        let half = parse_in_range::<u64>(tokens[0], "half-life", 1, 45)?;
        config.half_life = minutes(half);
        config.unreach_half_life = minutes(half);
        config.max_suppress = minutes(half * 4);

        if tokens.len() >= 4 {
            config.reuse = parse_in_range::<u32>(tokens[1], "reuse", 1, 20000)?;
            config.suppress = parse_in_range::<u32>(tokens[2], "suppress", 1, 20000)?;
            let max = parse_in_range::<u64>(tokens[3], "max-suppress", 1, 255)?;
            if config.suppress <= config.reuse {
                return Err(CompileError::new("suppress value must exceed reuse value"));
            }
            if max < half {
                return Err(CompileError::new("max-suppress must not be below half-life"));
            }
            config.max_suppress = minutes(max);
        }
        if tokens.len() == 5 {
            let unreach = parse_in_range::<u64>(tokens[4], "unreachable half-life", 1, 45)?;
            config.unreach_half_life = minutes(unreach);
        }
        Ok(config)
    }
}
