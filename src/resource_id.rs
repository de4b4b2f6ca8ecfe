//! FPGA resource identifiers and deployment modes
//!
//! The device plugin advertises capacity on nodes under one name
//! (`<domain>/af-<hash>`, `<domain>/region-<hash>`) while workloads request
//! it under another (`<domain>/<family>.<variant>`), with the admission
//! webhook translating between the two. The names are kept in separate
//! types so a capacity check can never be handed a request name and vice
//! versa.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Accelerator function capacity for nlb0, advertised in `af` mode
pub const NLB0_NODE_RESOURCE: &str = "fpga.intel.com/af-d8424dc4a4a3c413f89e433683f9040b";
/// Arria10 region capacity, advertised in `region` mode
pub const ARRIA10_NODE_RESOURCE: &str = "fpga.intel.com/region-69528db6eb31577a8c3668f9faa081f6";
/// Pod request for the nlb0 accelerator function
pub const NLB0_POD_RESOURCE: &str = "fpga.intel.com/arria10.dcp1.2-nlb0";
/// Pod request for the nlb3 accelerator function
pub const NLB3_POD_RESOURCE: &str = "fpga.intel.com/arria10.dcp1.2-nlb3";

const AF_PREFIX: &str = "af-";
const REGION_PREFIX: &str = "region-";

/// Device plugin operating mode, passed verbatim to the plugin deploy script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PluginMode {
    /// Advertise reprogrammable regions; the webhook orchestrates programming
    Region,
    /// Advertise preprogrammed accelerator functions
    Af,
}

impl PluginMode {
    /// The mode string understood by the deploy script
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginMode::Region => "region",
            PluginMode::Af => "af",
        }
    }
}

impl fmt::Display for PluginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Admission webhook operating mode, passed verbatim to the webhook deploy script
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookMode {
    /// Rewrite function requests to region requests and program on demand
    Orchestrated,
    /// Rewrite function requests to preprogrammed accelerator function requests
    Preprogrammed,
}

impl WebhookMode {
    /// The mode string understood by the deploy script
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookMode::Orchestrated => "orchestrated",
            WebhookMode::Preprogrammed => "preprogrammed",
        }
    }
}

impl fmt::Display for WebhookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Kind of capacity a node-scope resource names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeResourceKind {
    /// Fixed-function accelerator capacity (`af-<hash>`)
    Af,
    /// Reprogrammable region capacity (`region-<hash>`)
    Region,
}

impl NodeResourceKind {
    /// Plugin mode that advertises this kind of capacity
    pub fn plugin_mode(&self) -> PluginMode {
        match self {
            NodeResourceKind::Af => PluginMode::Af,
            NodeResourceKind::Region => PluginMode::Region,
        }
    }
}

/// Capacity name as reported in a node's allocatable resources
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeResource {
    raw: String,
    kind: NodeResourceKind,
}

impl NodeResource {
    /// Full resource name
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this names region or accelerator function capacity
    pub fn kind(&self) -> NodeResourceKind {
        self.kind
    }

    /// Resource domain (e.g., `fpga.intel.com`)
    pub fn domain(&self) -> &str {
        split_resource(&self.raw).map(|(d, _)| d).unwrap_or_default()
    }
}

impl FromStr for NodeResource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, name) = split_resource(s)
            .ok_or_else(|| invalid("nodeResource", s, "expected <domain>/<name>"))?;

        let (kind, hash) = if let Some(hash) = name.strip_prefix(AF_PREFIX) {
            (NodeResourceKind::Af, hash)
        } else if let Some(hash) = name.strip_prefix(REGION_PREFIX) {
            (NodeResourceKind::Region, hash)
        } else {
            return Err(invalid(
                "nodeResource",
                s,
                "name must start with af- or region-",
            ));
        };

        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("nodeResource", s, "hash must be hexadecimal"));
        }

        Ok(Self {
            raw: s.to_string(),
            kind,
        })
    }
}

impl fmt::Display for NodeResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resource name a workload puts in its container requests
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PodResource {
    raw: String,
}

impl PodResource {
    /// Full resource name
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resource domain (e.g., `fpga.intel.com`)
    pub fn domain(&self) -> &str {
        split_resource(&self.raw).map(|(d, _)| d).unwrap_or_default()
    }

}

impl FromStr for PodResource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, name) = split_resource(s)
            .ok_or_else(|| invalid("podResource", s, "expected <domain>/<family>.<variant>"))?;

        if name.starts_with(AF_PREFIX) || name.starts_with(REGION_PREFIX) {
            return Err(invalid(
                "podResource",
                s,
                "node capacity names cannot be requested by pods",
            ));
        }

        match name.split_once('.') {
            Some((family, variant)) if !family.is_empty() && !variant.is_empty() => Ok(Self {
                raw: s.to_string(),
            }),
            _ => Err(invalid(
                "podResource",
                s,
                "expected <domain>/<family>.<variant>",
            )),
        }
    }
}

impl fmt::Display for PodResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split `<domain>/<name>`, requiring both parts and no whitespace.
fn split_resource(s: &str) -> Option<(&str, &str)> {
    if s.chars().any(char::is_whitespace) {
        return None;
    }
    match s.split_once('/') {
        Some((domain, name)) if !domain.is_empty() && !name.is_empty() && !name.contains('/') => {
            Some((domain, name))
        }
        _ => None,
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> Error {
    Error::validation_for_field(field, format!("invalid resource {value:?}: {reason}"))
}
