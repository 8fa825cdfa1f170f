use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::route::ASN;
use crate::shared::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Sequence,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsSegment {
    pub kind: SegmentType,
    pub asns: Vec<ASN>,
}

impl AsSegment {
    pub fn sequence(asns: Vec<ASN>) -> Self {
        AsSegment {
            kind: SegmentType::Sequence,
            asns,
        }
    }

    pub fn set(asns: Vec<ASN>) -> Self {
        AsSegment {
            kind: SegmentType::Set,
            asns,
        }
    }
}

/// Most ASNs one AS_SEQUENCE segment can carry on the wire.
pub const AS_SEGMENT_MAX: usize = 255;

/// Ordered list of AS segments a route has traversed, leftmost is the most recent.
#[derive(Debug, Clone, Default)]
pub struct AsPath {
    segments: Vec<AsSegment>,
    // fragment put in front by the latest edit, if that edit was a prepend
    prepended: Option<Vec<ASN>>,
}

impl PartialEq for AsPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for AsPath {}

impl Hash for AsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl AsPath {
    pub fn new() -> Self {
        AsPath::default()
    }

    pub fn from_segments(segments: Vec<AsSegment>) -> Self {
        let mut path = AsPath {
            segments,
            prepended: None,
        };
        path.normalize();
        path
    }

    pub fn from_sequence(asns: Vec<ASN>) -> Self {
        AsPath::from_segments(vec![AsSegment::sequence(asns)])
    }

    pub fn segments(&self) -> &[AsSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path length as used by best-path selection: a set counts as one hop.
    pub fn path_length(&self) -> usize {
        self.segments
            .iter()
            .map(|seg| match seg.kind {
                SegmentType::Sequence => seg.asns.len(),
                SegmentType::Set => 1,
            })
            .sum()
    }

    pub fn first(&self) -> Option<ASN> {
        match self.segments.first() {
            Some(seg) if seg.kind == SegmentType::Sequence => seg.asns.first().copied(),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<ASN> {
        match self.segments.last() {
            Some(seg) if seg.kind == SegmentType::Sequence => seg.asns.last().copied(),
            _ => None,
        }
    }

    pub fn contains(&self, asn: ASN) -> bool {
        self.iter().any(|a| a == asn)
    }

    pub fn iter(&self) -> impl Iterator<Item = ASN> + '_ {
        self.segments.iter().flat_map(|seg| seg.asns.iter().copied())
    }

    /// Puts `fragment` in front of this path. A trailing sequence of the
    /// fragment is merged with a leading sequence of the path, and
    /// sequences longer than [`AS_SEGMENT_MAX`] are split.
    pub fn prepend(&mut self, fragment: &AsPath) {
        if fragment.is_empty() {
            return;
        }
        let mut segments = fragment.segments.clone();
        segments.append(&mut self.segments);
        self.segments = segments;
        self.normalize();
        self.prepended = Some(fragment.iter().collect());
    }

    /// True when the latest edit of this path was a prepend of exactly
    /// `fragment` and the path still leads with it.
    pub fn was_prepended_with(&self, fragment: &AsPath) -> bool {
        match &self.prepended {
            Some(hops) => hops.iter().copied().eq(fragment.iter()) && self.starts_with(fragment),
            None => false,
        }
    }

    /// True when the leading hops of this path are exactly `fragment`.
    pub fn starts_with(&self, fragment: &AsPath) -> bool {
        let mut ours = self.hops();
        for hop in fragment.hops() {
            if ours.next() != Some(hop) {
                return false;
            }
        }
        true
    }

    /// Removes every occurrence of the given ASNs. Empty segments are dropped.
    pub fn exclude(&mut self, asns: &[ASN]) {
        for seg in self.segments.iter_mut() {
            seg.asns.retain(|asn| !asns.contains(asn));
        }
        self.normalize();
        self.prepended = None;
    }

    fn hops(&self) -> impl Iterator<Item = (SegmentType, ASN)> + '_ {
        self.segments
            .iter()
            .flat_map(|seg| seg.asns.iter().map(move |asn| (seg.kind, *asn)))
    }

    fn normalize(&mut self) {
        self.segments.retain(|seg| !seg.asns.is_empty());
        let mut merged: Vec<AsSegment> = Vec::with_capacity(self.segments.len());
        for seg in self.segments.drain(..) {
            match merged.last_mut() {
                Some(prev)
                    if prev.kind == SegmentType::Sequence && seg.kind == SegmentType::Sequence =>
                {
                    prev.asns.extend(seg.asns)
                }
                _ => merged.push(seg),
            }
        }
        self.segments = Vec::with_capacity(merged.len());
        for seg in merged {
            if seg.kind == SegmentType::Sequence && seg.asns.len() > AS_SEGMENT_MAX {
                self.segments.extend(
                    seg.asns
                        .chunks(AS_SEGMENT_MAX)
                        .map(|chunk| AsSegment::sequence(chunk.to_vec())),
                );
            } else {
                self.segments.push(seg);
            }
        }
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for seg in &self.segments {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            let asns: Vec<String> = seg.asns.iter().map(|a| a.to_string()).collect();
            match seg.kind {
                SegmentType::Sequence => write!(f, "{}", asns.join(" "))?,
                SegmentType::Set => write!(f, "{{{}}}", asns.join(","))?,
            }
        }
        Ok(())
    }
}

impl FromStr for AsPath {
    type Err = CompileError;

    /// Parses `"65001 65002 {65003,65004}"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut sequence = Vec::new();
        let mut set: Option<Vec<ASN>> = None;
        let mut token = String::new();

        let flush = |token: &mut String, target: &mut Vec<ASN>| -> Result<(), CompileError> {
            if token.is_empty() {
                return Ok(());
            }
            let asn = token
                .parse::<ASN>()
                .map_err(|_| CompileError::new(format!("malformed AS number {}", token)))?;
            token.clear();
            target.push(asn);
            Ok(())
        };

        for c in s.chars() {
            match c {
                '{' => {
                    if set.is_some() {
                        return Err(CompileError::new("nested AS set"));
                    }
                    flush(&mut token, &mut sequence)?;
                    if !sequence.is_empty() {
                        segments.push(AsSegment::sequence(std::mem::take(&mut sequence)));
                    }
                    set = Some(Vec::new());
                }
                '}' => {
                    let mut members = set
                        .take()
                        .ok_or_else(|| CompileError::new("unbalanced '}' in AS path"))?;
                    flush(&mut token, &mut members)?;
                    segments.push(AsSegment::set(members));
                }
                ' ' | ',' | '\t' => match set.as_mut() {
                    Some(members) => flush(&mut token, members)?,
                    None => flush(&mut token, &mut sequence)?,
                },
                d if d.is_ascii_digit() => token.push(d),
                other => {
                    return Err(CompileError::new(format!(
                        "unexpected character '{}' in AS path",
                        other
                    )))
                }
            }
        }
        if set.is_some() {
            return Err(CompileError::new("unterminated AS set"));
        }
        flush(&mut token, &mut sequence)?;
        if !sequence.is_empty() {
            segments.push(AsSegment::sequence(sequence));
        }
        Ok(AsPath::from_segments(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path: AsPath = "65001 65002 {65003,65004} 65005".parse().unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.to_string(), "65001 65002 {65003,65004} 65005");
        assert_eq!(path.path_length(), 4);
        assert_eq!(path.first(), Some(65001));
        assert_eq!(path.origin(), Some(65005));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("65001 abc".parse::<AsPath>().is_err());
        assert!("{65001".parse::<AsPath>().is_err());
        assert!("65001}".parse::<AsPath>().is_err());
        assert!("99999999999".parse::<AsPath>().is_err());
    }

    #[test]
    fn test_prepend_merges_sequences() {
        let mut path = AsPath::from_sequence(vec![65010, 65020]);
        path.prepend(&AsPath::from_sequence(vec![65001, 65001]));
        assert_eq!(path.segments().len(), 1);
        assert_eq!(path.to_string(), "65001 65001 65010 65020");
        assert!(path.starts_with(&AsPath::from_sequence(vec![65001, 65001])));
        assert!(!path.starts_with(&AsPath::from_sequence(vec![65010])));
    }

    #[test]
    fn test_prepend_before_set() {
        let mut path: AsPath = "{1,2}".parse().unwrap();
        path.prepend(&AsPath::from_sequence(vec![3]));
        assert_eq!(path.to_string(), "3 {1,2}");
    }

    #[test]
    fn test_long_sequences_split_at_segment_limit() {
        let mut path = AsPath::from_sequence((1..=300).collect());
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.segments()[0].asns.len(), AS_SEGMENT_MAX);
        assert_eq!(path.segments()[1].asns.len(), 45);

        path.prepend(&AsPath::from_sequence(vec![65000; 300]));
        assert!(path
            .segments()
            .iter()
            .all(|seg| seg.asns.len() <= AS_SEGMENT_MAX));
        assert_eq!(path.path_length(), 600);
        assert_eq!(path.first(), Some(65000));
        assert_eq!(path.origin(), Some(300));
    }

    #[test]
    fn test_prepend_marks_path() {
        let fragment = AsPath::from_sequence(vec![65000]);
        let mut path = AsPath::from_sequence(vec![65000, 1]);
        assert!(!path.was_prepended_with(&fragment));

        path.prepend(&fragment);
        assert!(path.was_prepended_with(&fragment));
        assert!(!path.was_prepended_with(&AsPath::from_sequence(vec![65001])));
        assert_eq!(path, "65000 65000 1".parse().unwrap());

        path.exclude(&[1]);
        assert!(!path.was_prepended_with(&fragment));
    }

    #[test]
    fn test_exclude() {
        let mut path: AsPath = "1 2 {2,3} 2".parse().unwrap();
        path.exclude(&[2]);
        assert_eq!(path.to_string(), "1 {3}");
        path.exclude(&[3]);
        assert_eq!(path.to_string(), "1");
    }
}
