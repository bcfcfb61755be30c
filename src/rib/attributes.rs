use std::borrow::Borrow;
use std::fmt;
use std::net::IpAddr;

use bgp_rs::{PathAttribute, Segment, AFI};
use itertools::Itertools;
use serde::{self, Deserialize, Deserializer, Serialize};

use super::{Candidate, PathComparator};
use crate::utils::{asn_to_dotted, bytes_to_ipv6, maybe_string};

/// LOCAL_PREF assumed for paths that don't carry one
pub const DEFAULT_LOCAL_PREF: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Origin {
    #[serde(rename = "IGP")]
    Igp,
    #[serde(rename = "EGP")]
    Egp,
    Incomplete,
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Igp
    }
}

impl From<&bgp_rs::Origin> for Origin {
    fn from(origin: &bgp_rs::Origin) -> Self {
        match origin {
            bgp_rs::Origin::IGP => Origin::Igp,
            bgp_rs::Origin::EGP => Origin::Egp,
            bgp_rs::Origin::INCOMPLETE => Origin::Incomplete,
        }
    }
}

impl From<Origin> for bgp_rs::Origin {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Igp => bgp_rs::Origin::IGP,
            Origin::Egp => bgp_rs::Origin::EGP,
            Origin::Incomplete => bgp_rs::Origin::INCOMPLETE,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            Origin::Igp => "IGP",
            Origin::Egp => "EGP",
            Origin::Incomplete => "Incomplete",
        };
        write!(f, "{}", word)
    }
}

impl<'de> Deserialize<'de> for Origin {
    fn deserialize<D>(deserializer: D) -> Result<Origin, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "igp" => Ok(Origin::Igp),
            "egp" => Ok(Origin::Egp),
            "incomplete" | "?" => Ok(Origin::Incomplete),
            _ => Err(serde::de::Error::custom(format!(
                "Unsupported Origin: '{}'",
                s
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AsPathSegment {
    Sequence(Vec<u32>),
    Set(Vec<u32>),
}

impl From<&Segment> for AsPathSegment {
    fn from(segment: &Segment) -> Self {
        match segment {
            Segment::AS_SEQUENCE(sequence) => AsPathSegment::Sequence(sequence.clone()),
            Segment::AS_SET(set) => AsPathSegment::Set(set.clone()),
        }
    }
}

impl fmt::Display for AsPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AsPathSegment::Sequence(sequence) => {
                write!(f, "{}", sequence.iter().map(|asn| asn_to_dotted(*asn)).join(" "))
            }
            AsPathSegment::Set(set) => {
                write!(f, "{{{}}}", set.iter().map(|asn| asn_to_dotted(*asn)).join(","))
            }
        }
    }
}

/// Decoded path attributes of one route
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PathAttributes {
    pub next_hop: Option<IpAddr>,
    pub origin: Origin,
    pub as_path: Vec<AsPathSegment>,
    pub local_pref: Option<u32>,
    pub multi_exit_disc: Option<u32>,
    pub communities: Vec<u32>,
}

impl PathAttributes {
    pub fn from_attributes(attributes: &[PathAttribute]) -> Self {
        let mut decoded = PathAttributes::default();
        let mut mp_next_hop: Option<IpAddr> = None;
        for attribute in attributes {
            match attribute {
                PathAttribute::ORIGIN(origin) => decoded.origin = Origin::from(origin),
                PathAttribute::AS_PATH(as_path) => {
                    decoded.as_path = as_path.segments.iter().map(AsPathSegment::from).collect()
                }
                PathAttribute::NEXT_HOP(next_hop) => decoded.next_hop = Some(*next_hop),
                // IPv6 next hop is carried in MP_REACH_NLRI
                PathAttribute::MP_REACH_NLRI(nlri) if nlri.afi == AFI::IPV6 => {
                    mp_next_hop = bytes_to_ipv6(&nlri.next_hop)
                }
                PathAttribute::LOCAL_PREF(local_pref) => decoded.local_pref = Some(*local_pref),
                PathAttribute::MULTI_EXIT_DISC(metric) => decoded.multi_exit_disc = Some(*metric),
                PathAttribute::COMMUNITY(communities) => decoded.communities = communities.clone(),
                _ => (),
            }
        }
        if mp_next_hop.is_some() {
            decoded.next_hop = mp_next_hop;
        }
        decoded
    }

    /// AS path length as counted by the decision process: an AS_SET counts once
    pub fn as_path_length(&self) -> usize {
        self.as_path
            .iter()
            .map(|segment| match segment {
                AsPathSegment::Sequence(sequence) => sequence.len(),
                AsPathSegment::Set(_) => 1,
            })
            .sum()
    }

    /// Neighboring AS, the first ASN of a leading AS_SEQUENCE
    pub fn peer_as(&self) -> Option<u32> {
        match self.as_path.first() {
            Some(AsPathSegment::Sequence(sequence)) => sequence.first().copied(),
            _ => None,
        }
    }

    pub fn effective_local_pref(&self) -> u32 {
        self.local_pref.unwrap_or(DEFAULT_LOCAL_PREF)
    }

    pub fn as_path_string(&self) -> String {
        self.as_path.iter().join(" ")
    }
}

impl fmt::Display for PathAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "next_hop={} origin={} local_pref={} med={} as_path=[{}]",
            maybe_string(self.next_hop.as_ref()),
            self.origin,
            maybe_string(self.local_pref.as_ref()),
            maybe_string(self.multi_exit_disc.as_ref()),
            self.as_path_string(),
        )
    }
}

/// Prefers the higher LOCAL_PREF. Anything else ties and falls back to
/// the lowest route key.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalPreference;

impl<T> PathComparator<T> for LocalPreference
where
    T: Borrow<PathAttributes>,
{
    fn is_existing_path_better(
        &self,
        _local_as: u32,
        existing: &Candidate<T>,
        candidate: &Candidate<T>,
    ) -> bool {
        let existing: &PathAttributes = Borrow::borrow(existing.attributes);
        let candidate: &PathAttributes = Borrow::borrow(candidate.attributes);
        existing.effective_local_pref() > candidate.effective_local_pref()
    }
}
