use std::time::Duration;

use serde::Serialize;

/// Name of the policy every unknown policy name falls back to.
pub const DEFAULT_POLICY: &str = "default";

/// A named rate limit: `requests` per fixed `window`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub name: &'static str,
    pub requests: u32,
    #[serde(rename = "window_secs", serialize_with = "serialize_secs")]
    pub window: Duration,
}

impl Policy {
    pub const fn new(name: &'static str, requests: u32, window_secs: u64) -> Self {
        Self {
            name,
            requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

fn serialize_secs<S: serde::Serializer>(window: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(window.as_secs())
}

const POLICIES: [Policy; 3] = [
    Policy::new(DEFAULT_POLICY, 1000, 60),
    Policy::new("auth", 100, 60),
    Policy::new("api", 10_000, 3600),
];

/// The fixed policy table, built once at startup.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: Vec<Policy>,
}

impl PolicyTable {
    /// Look up a policy by name, falling back to `default` for unknown names.
    pub fn resolve(&self, name: &str) -> &Policy {
        self.policies
            .iter()
            .find(|p| p.name == name)
            .unwrap_or(&self.policies[0])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        // `default` must stay first: `resolve` falls back to index 0.
        Self {
            policies: POLICIES.to_vec(),
        }
    }
}
