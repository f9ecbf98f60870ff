//! Network primitives: CIDR arithmetic, subnet tiers, flow-log scope

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on availability zones per region accepted here
pub const MAX_AZS: u8 = 6;

/// Zone suffixes in their fixed, stable ordering. Subnet indices are
/// 1-based ordinals into this list, so re-synthesis with unchanged
/// inputs always produces identical logical names.
const ZONE_SUFFIXES: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

/// Availability zone names for a region, in the fixed ordering
pub fn availability_zones(region: &str, count: u8) -> Vec<String> {
    ZONE_SUFFIXES
        .iter()
        .take(count.min(MAX_AZS) as usize)
        .map(|suffix| format!("{region}{suffix}"))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CidrError {
    #[error("CIDR block must be in format x.x.x.x/n, got '{0}'")]
    InvalidFormat(String),

    #[error("Invalid IP address in CIDR block '{0}'")]
    InvalidAddress(String),

    #[error("Prefix length must be between 0 and 32, got {0}")]
    InvalidPrefix(u8),

    #[error("Subnet mask /{mask} does not fit inside /{prefix} network")]
    MaskOutsideNetwork { mask: u8, prefix: u8 },

    #[error("Address space of {block} exhausted while allocating a /{mask} subnet")]
    Exhausted { block: String, mask: u8 },
}

/// An IPv4 CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidrBlock {
    addr: u32,
    prefix: u8,
}

impl CidrBlock {
    pub fn parse(s: &str) -> Result<Self, CidrError> {
        let (addr_part, prefix_part) = s
            .split_once('/')
            .ok_or_else(|| CidrError::InvalidFormat(s.to_string()))?;

        let octets: Vec<&str> = addr_part.split('.').collect();
        if octets.len() != 4 {
            return Err(CidrError::InvalidAddress(s.to_string()));
        }
        let mut addr: u32 = 0;
        for octet in octets {
            let n: u8 = octet
                .parse()
                .map_err(|_| CidrError::InvalidAddress(s.to_string()))?;
            addr = (addr << 8) | u32::from(n);
        }

        let prefix: u8 = prefix_part
            .parse()
            .map_err(|_| CidrError::InvalidFormat(s.to_string()))?;
        if prefix > 32 {
            return Err(CidrError::InvalidPrefix(prefix));
        }

        Ok(Self {
            addr: addr & Self::mask_bits(prefix),
            prefix,
        })
    }

    fn mask_bits(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        }
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses covered by this block
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix)
    }

    pub fn contains(&self, other: &CidrBlock) -> bool {
        other.prefix >= self.prefix && (other.addr & Self::mask_bits(self.prefix)) == self.addr
    }
}

impl std::fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}/{}",
            (self.addr >> 24) & 0xff,
            (self.addr >> 16) & 0xff,
            (self.addr >> 8) & 0xff,
            self.addr & 0xff,
            self.prefix
        )
    }
}

/// Sequential, deterministic allocator of subnet blocks within a network
///
/// Allocations are aligned to their own size and never overlap; running
/// the same allocation sequence twice yields the same blocks.
#[derive(Debug, Clone)]
pub struct CidrAllocator {
    network: CidrBlock,
    cursor: u64,
}

impl CidrAllocator {
    pub fn new(network: CidrBlock) -> Self {
        Self { network, cursor: 0 }
    }

    /// Allocate the next /`mask` block
    pub fn allocate(&mut self, mask: u8) -> Result<CidrBlock, CidrError> {
        if mask > 32 {
            return Err(CidrError::InvalidPrefix(mask));
        }
        if mask < self.network.prefix {
            return Err(CidrError::MaskOutsideNetwork {
                mask,
                prefix: self.network.prefix,
            });
        }
        let block_size = 1u64 << (32 - mask);
        let aligned = self.cursor.div_ceil(block_size) * block_size;
        if aligned + block_size > self.network.size() {
            return Err(CidrError::Exhausted {
                block: self.network.to_string(),
                mask,
            });
        }
        self.cursor = aligned + block_size;
        Ok(CidrBlock {
            addr: self.network.addr + aligned as u32,
            prefix: mask,
        })
    }
}

/// Visibility tier of a subnet group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetTier {
    /// Internet-routable, route to the internet gateway
    Public,
    /// Outbound only, route to a NAT gateway
    PrivateWithEgress,
}

impl SubnetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetTier::Public => "public",
            SubnetTier::PrivateWithEgress => "private",
        }
    }

    /// Title-cased label used in `Name` tags (e.g., "Public-Subnet-1")
    pub fn title(&self) -> &'static str {
        match self {
            SubnetTier::Public => "Public",
            SubnetTier::PrivateWithEgress => "Private",
        }
    }
}

impl std::fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named class of subnets, instantiated once per availability zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetGroupDef {
    /// Group name; doubles as the logical name stem (`{name}-{index}`)
    pub name: String,
    pub tier: SubnetTier,
    /// Prefix length of each subnet in the group
    pub cidr_mask: u8,
}

impl SubnetGroupDef {
    pub fn public(name: impl Into<String>, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            tier: SubnetTier::Public,
            cidr_mask,
        }
    }

    pub fn private_with_egress(name: impl Into<String>, cidr_mask: u8) -> Self {
        Self {
            name: name.into(),
            tier: SubnetTier::PrivateWithEgress,
            cidr_mask,
        }
    }
}

/// Traffic capture scope of a flow log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowLogTraffic {
    All,
    Accept,
    Reject,
}

impl FlowLogTraffic {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowLogTraffic::All => "ALL",
            FlowLogTraffic::Accept => "ACCEPT",
            FlowLogTraffic::Reject => "REJECT",
        }
    }
}

/// Removal policy of the flow-log destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "destroy",
            RemovalPolicy::Retain => "retain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let block = CidrBlock::parse("10.0.0.0/16").unwrap();
        assert_eq!(block.to_string(), "10.0.0.0/16");
        assert_eq!(block.prefix(), 16);
        assert_eq!(block.size(), 65536);
    }

    #[test]
    fn parse_normalizes_host_bits() {
        let block = CidrBlock::parse("10.0.3.7/16").unwrap();
        assert_eq!(block.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(matches!(
            CidrBlock::parse("10.0.0.0"),
            Err(CidrError::InvalidFormat(_))
        ));
        assert!(matches!(
            CidrBlock::parse("10.0.0/16"),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            CidrBlock::parse("10.0.0.300/16"),
            Err(CidrError::InvalidAddress(_))
        ));
        assert!(matches!(
            CidrBlock::parse("10.0.0.0/33"),
            Err(CidrError::InvalidPrefix(33))
        ));
    }

    #[test]
    fn allocator_is_sequential_and_non_overlapping() {
        let network = CidrBlock::parse("10.0.0.0/16").unwrap();
        let mut alloc = CidrAllocator::new(network);

        let blocks: Vec<String> = (0..6)
            .map(|_| alloc.allocate(24).unwrap().to_string())
            .collect();
        assert_eq!(
            blocks,
            vec![
                "10.0.0.0/24",
                "10.0.1.0/24",
                "10.0.2.0/24",
                "10.0.3.0/24",
                "10.0.4.0/24",
                "10.0.5.0/24",
            ]
        );
        for s in &blocks {
            assert!(network.contains(&CidrBlock::parse(s).unwrap()));
        }
    }

    #[test]
    fn allocator_rejects_mask_wider_than_network() {
        let network = CidrBlock::parse("10.0.0.0/24").unwrap();
        let mut alloc = CidrAllocator::new(network);
        assert_eq!(
            alloc.allocate(16).unwrap_err(),
            CidrError::MaskOutsideNetwork { mask: 16, prefix: 24 }
        );
    }

    #[test]
    fn allocator_exhausts_address_space() {
        let network = CidrBlock::parse("10.0.0.0/24").unwrap();
        let mut alloc = CidrAllocator::new(network);
        alloc.allocate(25).unwrap();
        alloc.allocate(25).unwrap();
        assert!(matches!(
            alloc.allocate(25),
            Err(CidrError::Exhausted { .. })
        ));
    }

    #[test]
    fn availability_zones_are_stable() {
        assert_eq!(
            availability_zones("us-east-1", 3),
            vec!["us-east-1a", "us-east-1b", "us-east-1c"]
        );
        assert_eq!(availability_zones("us-east-1", 3), availability_zones("us-east-1", 3));
    }
}
