use std::fmt;
use std::net::Ipv4Addr;

use crate::shared::CompileError;

const ECOMMUNITY_ENCODE_AS: u8 = 0x00;
const ECOMMUNITY_ENCODE_IP: u8 = 0x01;
const ECOMMUNITY_ENCODE_AS4: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtCommunityKind {
    RouteTarget,
    SiteOfOrigin,
}

impl ExtCommunityKind {
    fn subtype(&self) -> u8 {
        match self {
            ExtCommunityKind::RouteTarget => 0x02,
            ExtCommunityKind::SiteOfOrigin => 0x03,
        }
    }

    fn label(subtype: u8) -> Option<&'static str> {
        match subtype {
            0x02 => Some("RT"),
            0x03 => Some("SoO"),
            _ => None,
        }
    }
}

/// One 8-byte extended community value in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtCommunityValue(pub [u8; 8]);

impl ExtCommunityValue {
    /// Parses `ASN:NN` or `A.B.C.D:NN`.
    pub fn parse(kind: ExtCommunityKind, token: &str) -> Result<Self, CompileError> {
        let malformed = || CompileError::new(format!("malformed extended community {}", token));
        let (global, local) = token.rsplit_once(':').ok_or_else(malformed)?;
        let mut val = [0u8; 8];
        val[1] = kind.subtype();

        if let Ok(addr) = global.parse::<Ipv4Addr>() {
            let local = local.parse::<u16>().map_err(|_| malformed())?;
            val[0] = ECOMMUNITY_ENCODE_IP;
            val[2..6].copy_from_slice(&addr.octets());
            val[6..8].copy_from_slice(&local.to_be_bytes());
            return Ok(ExtCommunityValue(val));
        }

        let asn = global.parse::<u32>().map_err(|_| malformed())?;
        if asn > u16::MAX as u32 {
            let local = local.parse::<u16>().map_err(|_| malformed())?;
            val[0] = ECOMMUNITY_ENCODE_AS4;
            val[2..6].copy_from_slice(&asn.to_be_bytes());
            val[6..8].copy_from_slice(&local.to_be_bytes());
        } else {
            let local = local.parse::<u32>().map_err(|_| malformed())?;
            val[0] = ECOMMUNITY_ENCODE_AS;
            val[2..4].copy_from_slice(&(asn as u16).to_be_bytes());
            val[4..8].copy_from_slice(&local.to_be_bytes());
        }
        Ok(ExtCommunityValue(val))
    }
}

impl fmt::Display for ExtCommunityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.0;
        let label = ExtCommunityKind::label(v[1]).unwrap_or("?");
        match v[0] {
            ECOMMUNITY_ENCODE_AS => write!(
                f,
                "{}:{}:{}",
                label,
                u16::from_be_bytes([v[2], v[3]]),
                u32::from_be_bytes([v[4], v[5], v[6], v[7]])
            ),
            ECOMMUNITY_ENCODE_IP => write!(
                f,
                "{}:{}:{}",
                label,
                Ipv4Addr::new(v[2], v[3], v[4], v[5]),
                u16::from_be_bytes([v[6], v[7]])
            ),
            ECOMMUNITY_ENCODE_AS4 => write!(
                f,
                "{}:{}:{}",
                label,
                u32::from_be_bytes([v[2], v[3], v[4], v[5]]),
                u16::from_be_bytes([v[6], v[7]])
            ),
            _ => write!(f, "{:02x?}", v),
        }
    }
}

/// Extended communities attribute; kept sorted and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExtCommunity {
    values: Vec<ExtCommunityValue>,
}

impl ExtCommunity {
    pub fn new() -> Self {
        ExtCommunity::default()
    }

    /// Parses a whitespace separated list of values of one kind.
    pub fn parse(kind: ExtCommunityKind, s: &str) -> Result<Self, CompileError> {
        let mut ecom = ExtCommunity::new();
        for token in s.split_whitespace() {
            ecom.add_val(ExtCommunityValue::parse(kind, token)?);
        }
        if ecom.is_empty() {
            return Err(CompileError::new("empty extended community"));
        }
        Ok(ecom)
    }

    pub fn values(&self) -> &[ExtCommunityValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &ExtCommunityValue) -> bool {
        self.values.binary_search(value).is_ok()
    }

    pub fn add_val(&mut self, value: ExtCommunityValue) {
        if let Err(pos) = self.values.binary_search(&value) {
            self.values.insert(pos, value);
        }
    }

    pub fn merge(&mut self, other: &ExtCommunity) {
        for value in &other.values {
            self.add_val(*value);
        }
    }
}

impl fmt::Display for ExtCommunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encodings() {
        let ecom = ExtCommunity::parse(
            ExtCommunityKind::RouteTarget,
            "65001:100 10.0.0.1:7 4200000000:1",
        )
        .unwrap();
        assert_eq!(
            ecom.to_string(),
            "RT:65001:100 RT:10.0.0.1:7 RT:4200000000:1"
        );
    }

    #[test]
    fn test_merge_dedups() {
        let mut a = ExtCommunity::parse(ExtCommunityKind::RouteTarget, "1:1 2:2").unwrap();
        let b = ExtCommunity::parse(ExtCommunityKind::RouteTarget, "2:2 3:3").unwrap();
        a.merge(&b);
        assert_eq!(a.values().len(), 3);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ExtCommunity::parse(ExtCommunityKind::SiteOfOrigin, "1").is_err());
        assert!(ExtCommunity::parse(ExtCommunityKind::SiteOfOrigin, "").is_err());
        assert!(ExtCommunity::parse(ExtCommunityKind::SiteOfOrigin, "10.0.0.1:70000").is_err());
    }
}
