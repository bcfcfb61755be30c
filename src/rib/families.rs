use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use bgp_rs::{AFI, SAFI};
use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

/// AFI/SAFI pair identifying one routing table
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TableKey {
    pub afi: AFI,
    pub safi: SAFI,
}

impl TableKey {
    pub fn new(afi: AFI, safi: SAFI) -> Self {
        Self { afi, safi }
    }

    fn codes(&self) -> (u16, u8) {
        (self.afi as u16, self.safi as u8)
    }
}

impl Ord for TableKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.codes().cmp(&other.codes())
    }
}

impl PartialOrd for TableKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for TableKey {
    fn default() -> Self {
        Self::new(AFI::IPV4, SAFI::Unicast)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.afi, self.safi)
    }
}

impl Serialize for TableKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TableKey {
    fn deserialize<D>(deserializer: D) -> Result<TableKey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let parts: Vec<&str> = s.trim().split_whitespace().collect();
        if parts.len() != 2 {
            return Err(serde::de::Error::custom(format!(
                "Incorrect table format: '{}'",
                s
            )));
        }
        let afi = match parts[0] {
            "ipv4" => AFI::IPV4,
            "ipv6" => AFI::IPV6,
            "l2vpn" => AFI::L2VPN,
            family => {
                return Err(serde::de::Error::custom(format!(
                    "Unsupported AFI: '{}'",
                    family
                )))
            }
        };
        let safi = match parts[1] {
            "unicast" => SAFI::Unicast,
            "flow" => SAFI::Flowspec,
            sfamily => {
                return Err(serde::de::Error::custom(format!(
                    "Unsupported SAFI: '{}'",
                    sfamily
                )))
            }
        };
        Ok(TableKey::new(afi, safi))
    }
}

/// Set of tables a peer has negotiated
#[derive(Debug, Clone, Default)]
pub struct Families(BTreeSet<TableKey>);

impl Families {
    pub fn new(families: Vec<TableKey>) -> Self {
        Self(families.into_iter().collect())
    }

    pub fn common(&self, other: &Families) -> Self {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn contains(&self, family: TableKey) -> bool {
        self.0.contains(&family)
    }

    pub fn iter(&self) -> std::collections::btree_set::Iter<TableKey> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
