//! Forming-node election
//!
//! StatefulSet pods get stable names `<set>-0 .. <set>-(N-1)` and scale up
//! in ordinal order, so the highest ordinal is the last to start and can
//! already reach every other member. It is the one that forms the cluster.

use crate::common::{Error, Result};
use regex::Regex;

/// This pod's place in the StatefulSet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberIdentity {
    pub ordinal: u32,
    pub group: String,
    pub hostname: String,
}

impl MemberIdentity {
    /// Derive the identity from the pod hostname.
    ///
    /// The group name is `group_override` when given, otherwise the hostname
    /// without its `-<ordinal>` suffix.
    pub fn resolve(hostname: &str, group_override: Option<&str>) -> Result<Self> {
        let suffix = Regex::new("-([0-9]+)$")?;
        let captures = suffix.captures(hostname).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "hostname {hostname} does not end in a StatefulSet ordinal"
            ))
        })?;

        let ordinal = captures[1].parse::<u32>().map_err(|_| {
            Error::InvalidConfig(format!("ordinal of {hostname} is out of range"))
        })?;

        let group = match group_override {
            Some(group) => group.to_string(),
            None => {
                let start = captures.get(0).map_or(hostname.len(), |m| m.start());
                hostname[..start].to_string()
            }
        };
        if group.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "cannot infer the StatefulSet name from {hostname}"
            )));
        }

        Ok(Self {
            ordinal,
            group,
            hostname: hostname.to_string(),
        })
    }
}

/// Expected number of StatefulSet members, always at least one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality(u32);

impl Cardinality {
    pub fn new(replicas: i64) -> Result<Self> {
        match u32::try_from(replicas) {
            Ok(n) if n >= 1 => Ok(Self(n)),
            _ => Err(Error::InvalidCardinality(replicas)),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Ordinal of the last member to start
    pub fn last_ordinal(self) -> u32 {
        self.0 - 1
    }

    /// All ordinals in increasing order
    pub fn ordinals(self) -> impl Iterator<Item = u32> {
        0..self.0
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationRole {
    /// Drives the join protocol
    Coordinator,
    Follower,
}

impl std::fmt::Display for FormationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormationRole::Coordinator => write!(f, "coordinator"),
            FormationRole::Follower => write!(f, "follower"),
        }
    }
}

/// Decide this pod's role. Compares hostnames byte for byte.
pub fn elect(group: &str, cardinality: Cardinality, hostname: &str) -> FormationRole {
    let last = format!("{}-{}", group, cardinality.last_ordinal());
    if last == hostname {
        FormationRole::Coordinator
    } else {
        FormationRole::Follower
    }
}
