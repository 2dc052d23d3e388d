//! Static selector/topic tables and address allow-lists.
//!
//! Signatures are hashed once on first use. Function names reported by the
//! explorer (`stake(uint256 amount)`) are matched on the bare lowercase
//! method name, so a feed that decodes a method we have no selector for still
//! lands in the right family.

use std::collections::HashSet;
use std::sync::OnceLock;

use ethers_core::types::H256;
use ethers_core::utils::{id, keccak256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Stake,
    Swap,
    AddLiquidity,
    RemoveLiquidity,
    Gm,
    Approve,
    DomainRegister,
    Mint,
}

#[derive(Debug)]
pub struct SignatureFamily {
    selectors: HashSet<[u8; 4]>,
    names: HashSet<&'static str>,
}

impl SignatureFamily {
    fn new(signatures: &[&str], names: &[&'static str]) -> Self {
        Self {
            selectors: signatures.iter().map(|sig| id(sig)).collect(),
            names: names.iter().copied().collect(),
        }
    }

    pub fn matches(&self, selector: Option<[u8; 4]>, function_name: Option<&str>) -> bool {
        if selector.is_some_and(|s| self.selectors.contains(&s)) {
            return true;
        }
        function_name
            .and_then(method_name)
            .is_some_and(|name| self.names.contains(name.as_str()))
    }
}

/// `swapExactTokensForETH(uint256 amountIn, ...)` -> `swapexacttokensforeth`
pub fn method_name(function_name: &str) -> Option<String> {
    let bare = function_name.split('(').next()?.trim();
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_ascii_lowercase())
    }
}

fn topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

#[derive(Debug)]
struct SignatureTables {
    stake: SignatureFamily,
    swap: SignatureFamily,
    add_liquidity: SignatureFamily,
    remove_liquidity: SignatureFamily,
    gm: SignatureFamily,
    approve: SignatureFamily,
    domain_register: SignatureFamily,
    mint: SignatureFamily,
    domain_topics: HashSet<H256>,
    erc721_transfer: H256,
    consecutive_transfer: H256,
    transfer_single: H256,
    transfer_batch: H256,
}

fn tables() -> &'static SignatureTables {
    static TABLES: OnceLock<SignatureTables> = OnceLock::new();
    TABLES.get_or_init(|| SignatureTables {
        stake: SignatureFamily::new(
            &[
                "stake()",
                "stake(uint256)",
                "stake(address,uint256)",
                "delegate(address)",
                "delegate(uint64)",
                "delegate(address,uint256)",
                "bond(uint256)",
                "bond(address,uint256)",
                "depositAndStake(uint256)",
            ],
            &["stake", "delegate", "bond", "depositandstake", "stakeeth"],
        ),
        swap: SignatureFamily::new(
            &[
                "swapExactETHForTokens(uint256,address[],address,uint256)",
                "swapETHForExactTokens(uint256,address[],address,uint256)",
                "swapExactTokensForETH(uint256,uint256,address[],address,uint256)",
                "swapTokensForExactETH(uint256,uint256,address[],address,uint256)",
                "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
                "swapTokensForExactTokens(uint256,uint256,address[],address,uint256)",
                "swapExactETHForTokensSupportingFeeOnTransferTokens(uint256,address[],address,uint256)",
                "swapExactTokensForETHSupportingFeeOnTransferTokens(uint256,uint256,address[],address,uint256)",
                "swapExactTokensForTokensSupportingFeeOnTransferTokens(uint256,uint256,address[],address,uint256)",
                "exactInputSingle((address,address,uint24,address,uint256,uint256,uint256,uint160))",
                "exactInput((bytes,address,uint256,uint256,uint256))",
                "exactOutputSingle((address,address,uint24,address,uint256,uint256,uint256,uint160))",
                "exactOutput((bytes,address,uint256,uint256,uint256))",
                "execute(bytes,bytes[],uint256)",
            ],
            &[
                "swap",
                "swapexactethfortokens",
                "swapethforexacttokens",
                "swapexacttokensforeth",
                "swaptokensforexacteth",
                "swapexacttokensfortokens",
                "swaptokensforexacttokens",
                "exactinputsingle",
                "exactinput",
                "exactoutputsingle",
                "exactoutput",
            ],
        ),
        add_liquidity: SignatureFamily::new(
            &[
                "addLiquidity(address,address,uint256,uint256,uint256,uint256,address,uint256)",
                "addLiquidityETH(address,uint256,uint256,uint256,address,uint256)",
                "increaseLiquidity((uint256,uint256,uint256,uint256,uint256,uint256))",
            ],
            &["addliquidity", "addliquidityeth", "increaseliquidity"],
        ),
        remove_liquidity: SignatureFamily::new(
            &[
                "removeLiquidity(address,address,uint256,uint256,uint256,address,uint256)",
                "removeLiquidityETH(address,uint256,uint256,uint256,address,uint256)",
                "removeLiquidityWithPermit(address,address,uint256,uint256,uint256,address,uint256,bool,uint8,bytes32,bytes32)",
                "removeLiquidityETHWithPermit(address,uint256,uint256,uint256,address,uint256,bool,uint8,bytes32,bytes32)",
                "removeLiquidityETHSupportingFeeOnTransferTokens(address,uint256,uint256,uint256,address,uint256)",
                "decreaseLiquidity((uint256,uint128,uint256,uint256,uint256))",
            ],
            &[
                "removeliquidity",
                "removeliquidityeth",
                "removeliquiditywithpermit",
                "removeliquidityethwithpermit",
                "decreaseliquidity",
            ],
        ),
        gm: SignatureFamily::new(
            &["gm()", "sayGM()", "sayGm()", "sendGM()", "gm(string)"],
            &["gm", "saygm", "sendgm"],
        ),
        approve: SignatureFamily::new(
            &[
                "approve(address,uint256)",
                "setApprovalForAll(address,bool)",
                "increaseAllowance(address,uint256)",
            ],
            &["approve", "setapprovalforall", "increaseallowance"],
        ),
        domain_register: SignatureFamily::new(
            &[
                "register(string,address,uint256,bytes32,address,bytes[],bool,uint16)",
                "register(string,address,uint256)",
                "registerWithConfig(string,address,uint256,bytes32,address,address)",
                "registerDomain(string)",
                "registerName(string)",
            ],
            &["register", "registerwithconfig", "registerdomain", "registername"],
        ),
        mint: SignatureFamily::new(
            &[
                "mint()",
                "mint(uint256)",
                "mint(address)",
                "mint(address,uint256)",
                "safeMint(address)",
                "safeMint(address,uint256)",
                "publicMint(uint256)",
                "claim()",
            ],
            &["mint", "safemint", "publicmint", "mintpublic", "freemint", "claim"],
        ),
        domain_topics: [
            "NameRegistered(string,bytes32,address,uint256,uint256)",
            "NameRegistered(string,bytes32,address,uint256,uint256,uint256)",
            "NameRegistered(uint256,address,uint256)",
            "DomainRegistered(string,address,uint256)",
            "NewOwner(bytes32,bytes32,address)",
        ]
        .iter()
        .map(|sig| topic(sig))
        .collect(),
        erc721_transfer: topic("Transfer(address,address,uint256)"),
        consecutive_transfer: topic("ConsecutiveTransfer(uint256,uint256,address,address)"),
        transfer_single: topic("TransferSingle(address,address,address,uint256,uint256)"),
        transfer_batch: topic("TransferBatch(address,address,address,uint256[],uint256[])"),
    })
}

/// Which positions of a mint-shaped event carry `from` and `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferShape {
    pub from_topic: usize,
    pub to_topic: usize,
}

/// Static signature tables plus the configured address allow-lists.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    gm_contracts: HashSet<String>,
    deploy_relays: HashSet<String>,
    relay_target: Option<String>,
}

impl Registry {
    pub fn new(
        gm_contracts: impl IntoIterator<Item = String>,
        deploy_relays: impl IntoIterator<Item = String>,
        relay_target: Option<String>,
    ) -> Self {
        Self {
            gm_contracts: gm_contracts.into_iter().map(|a| a.to_lowercase()).collect(),
            deploy_relays: deploy_relays.into_iter().map(|a| a.to_lowercase()).collect(),
            relay_target: relay_target.map(|a| a.to_lowercase()),
        }
    }

    pub fn is_gm_contract(&self, address: &str) -> bool {
        self.gm_contracts.contains(address)
    }

    pub fn is_deploy_relay(&self, address: &str) -> bool {
        self.deploy_relays.contains(address)
    }

    pub fn is_relay_target(&self, address: &str) -> bool {
        self.relay_target.as_deref() == Some(address)
    }

    pub fn family(&self, intent: Intent) -> &'static SignatureFamily {
        let t = tables();
        match intent {
            Intent::Stake => &t.stake,
            Intent::Swap => &t.swap,
            Intent::AddLiquidity => &t.add_liquidity,
            Intent::RemoveLiquidity => &t.remove_liquidity,
            Intent::Gm => &t.gm,
            Intent::Approve => &t.approve,
            Intent::DomainRegister => &t.domain_register,
            Intent::Mint => &t.mint,
        }
    }

    pub fn matches(
        &self,
        intent: Intent,
        selector: Option<[u8; 4]>,
        function_name: Option<&str>,
    ) -> bool {
        self.family(intent).matches(selector, function_name)
    }

    pub fn is_domain_topic(&self, topic0: &H256) -> bool {
        tables().domain_topics.contains(topic0)
    }

    /// Positions of `from`/`to` for ERC-721 `Transfer`/`ConsecutiveTransfer`
    /// and ERC-1155 `TransferSingle`/`TransferBatch`. ERC-20 `Transfer`
    /// shares topic0 with ERC-721 but has only three topics, so it is rejected.
    pub fn mint_transfer_shape(&self, topics: &[H256]) -> Option<TransferShape> {
        let t = tables();
        let topic0 = topics.first()?;
        if *topic0 == t.erc721_transfer && topics.len() == 4 {
            Some(TransferShape { from_topic: 1, to_topic: 2 })
        } else if *topic0 == t.consecutive_transfer && topics.len() == 4 {
            Some(TransferShape { from_topic: 2, to_topic: 3 })
        } else if (*topic0 == t.transfer_single || *topic0 == t.transfer_batch)
            && topics.len() == 4
        {
            Some(TransferShape { from_topic: 2, to_topic: 3 })
        } else {
            None
        }
    }
}

const DOMAIN_TLDS: &[&str] = &[
    ".eth", ".mon", ".nad", ".bnb", ".arb", ".base", ".sol", ".crypto", ".nft", ".xyz",
    ".lens", ".ens",
];

const NAMING_SYSTEM_TOKENS: &[&str] = &["ens", "sns", "nns", "bns", "mns", "ans", "spaceid", "unstoppable"];

const DOMAIN_PHRASES: &[&str] = &["name service", "domain registrar", "name registry", "domain name"];

/// Heuristic match on an NFT collection's symbol or name.
///
/// A bare `name` or a lone dot never matches; the text needs a TLD-like
/// suffix, a naming-system acronym as its own token, or one of the phrases.
pub fn is_domain_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    if DOMAIN_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if DOMAIN_TLDS.iter().any(|tld| {
        lower.match_indices(tld).any(|(idx, _)| {
            let after = lower[idx + tld.len()..].chars().next();
            !after.is_some_and(|c| c.is_ascii_alphanumeric())
        })
    }) {
        return true;
    }
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| NAMING_SYSTEM_TOKENS.contains(&token))
}
