//! Network definitions and known token deployments.
//!
//! This module defines the networks supported by the engine, groups them into
//! families that share a settlement mechanism, and provides statically known
//! USDC deployments for the networks that carry a default asset.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::str::FromStr;

use crate::address::MixedAddress;

/// Networks recognized by the x402 A2A extension.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Base mainnet (chain ID 8453).
    #[serde(rename = "base")]
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    #[serde(rename = "base-sepolia")]
    BaseSepolia,
    /// Avalanche C-Chain (chain ID 43114).
    #[serde(rename = "avalanche")]
    Avalanche,
    /// Avalanche Fuji testnet (chain ID 43113).
    #[serde(rename = "avalanche-fuji")]
    AvalancheFuji,
    /// Sui mainnet.
    #[serde(rename = "sui")]
    Sui,
    /// Sui testnet.
    #[serde(rename = "sui-testnet")]
    SuiTestnet,
    /// Spark, a Bitcoin-layer payment network with Lightning and L1 transports.
    #[serde(rename = "spark")]
    Spark,
    /// Bitcoin mainnet, used by the Cashu ecash scheme.
    #[serde(rename = "bitcoin-mainnet")]
    BitcoinMainnet,
    /// Bitcoin testnet, used by the Cashu ecash scheme.
    #[serde(rename = "bitcoin-testnet")]
    BitcoinTestnet,
}

/// Settlement families a [`Network`] can belong to.
///
/// The family decides which payload variant and which signing helper apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFamily {
    Evm,
    Sui,
    Spark,
    Bitcoin,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::Avalanche => "avalanche",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::Sui => "sui",
            Network::SuiTestnet => "sui-testnet",
            Network::Spark => "spark",
            Network::BitcoinMainnet => "bitcoin-mainnet",
            Network::BitcoinTestnet => "bitcoin-testnet",
        }
    }

    /// Return the numeric chain ID for EVM networks, `None` otherwise.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Network::Base => Some(8453),
            Network::BaseSepolia => Some(84532),
            Network::Avalanche => Some(43114),
            Network::AvalancheFuji => Some(43113),
            _ => None,
        }
    }

    pub fn family(&self) -> NetworkFamily {
        match self {
            Network::Base | Network::BaseSepolia | Network::Avalanche | Network::AvalancheFuji => {
                NetworkFamily::Evm
            }
            Network::Sui | Network::SuiTestnet => NetworkFamily::Sui,
            Network::Spark => NetworkFamily::Spark,
            Network::BitcoinMainnet | Network::BitcoinTestnet => NetworkFamily::Bitcoin,
        }
    }

    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[
            Network::Base,
            Network::BaseSepolia,
            Network::Avalanche,
            Network::AvalancheFuji,
            Network::Sui,
            Network::SuiTestnet,
            Network::Spark,
            Network::BitcoinMainnet,
            Network::BitcoinTestnet,
        ]
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown network name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown network: {0}")]
pub struct UnknownNetwork(pub String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::variants()
            .iter()
            .find(|n| n.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

/// EIP-712 domain metadata of a token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Meta {
    pub name: String,
    pub version: String,
}

/// A token deployed on a specific network.
///
/// `eip712` is present for EVM deployments only; it carries the domain name
/// and version used when signing `transferWithAuthorization` messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDeployment {
    pub address: MixedAddress,
    pub network: Network,
    pub decimals: u8,
    pub eip712: Option<Eip712Meta>,
}

/// A known USDC deployment as a wrapper around [`TokenDeployment`].
#[derive(Clone, Debug)]
pub struct USDCDeployment(pub TokenDeployment);

impl Deref for USDCDeployment {
    type Target = TokenDeployment;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&USDCDeployment> for TokenDeployment {
    fn from(deployment: &USDCDeployment) -> Self {
        deployment.0.clone()
    }
}

fn usdc(address: &str, network: Network, eip712_name: Option<&str>) -> USDCDeployment {
    USDCDeployment(TokenDeployment {
        address: MixedAddress::new(address).expect("valid static USDC address"),
        network,
        decimals: 6,
        eip712: eip712_name.map(|name| Eip712Meta {
            name: name.into(),
            version: "2".into(),
        }),
    })
}

static USDC_BASE: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        Network::Base,
        Some("USDC"),
    )
});

static USDC_BASE_SEPOLIA: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        Network::BaseSepolia,
        Some("USDC"),
    )
});

static USDC_AVALANCHE: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        Network::Avalanche,
        Some("USD Coin"),
    )
});

static USDC_AVALANCHE_FUJI: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0x5425890298aed601595a70AB815c96711a31Bc65",
        Network::AvalancheFuji,
        Some("USD Coin"),
    )
});

static USDC_SUI: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
        Network::Sui,
        None,
    )
});

static USDC_SUI_TESTNET: Lazy<USDCDeployment> = Lazy::new(|| {
    usdc(
        "0xa1ec7fc00a6f40db9693ad1415d0c193ad3906494428cf252621037bd7117e29::usdc::USDC",
        Network::SuiTestnet,
        None,
    )
});

impl USDCDeployment {
    /// Return the known USDC deployment for the given network, or `None` when
    /// the network has no default asset. Callers must surface the absence as a
    /// validation error rather than silently defaulting.
    pub fn by_network<N: Borrow<Network>>(network: N) -> Option<&'static USDCDeployment> {
        match network.borrow() {
            Network::Base => Some(&USDC_BASE),
            Network::BaseSepolia => Some(&USDC_BASE_SEPOLIA),
            Network::Avalanche => Some(&USDC_AVALANCHE),
            Network::AvalancheFuji => Some(&USDC_AVALANCHE_FUJI),
            Network::Sui => Some(&USDC_SUI),
            Network::SuiTestnet => Some(&USDC_SUI_TESTNET),
            Network::Spark | Network::BitcoinMainnet | Network::BitcoinTestnet => None,
        }
    }
}
