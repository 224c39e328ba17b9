//! Limit order struct and EIP-712 domain

use super::exact::ExactAmount;
use crate::config::OrderConfig;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};
use serde_json::{json, Value};
use std::borrow::Cow;

sol! {
    /// Limit order as signed by the maker
    #[derive(Debug, PartialEq, Eq)]
    struct Order {
        uint256 salt;
        address maker;
        address receiver;
        address makerAsset;
        address takerAsset;
        uint256 makingAmount;
        uint256 takingAmount;
        uint256 makerTraits;
    }
}

/// An order bound to the quote that priced it
#[derive(Debug, Clone)]
pub struct SignableOrder {
    pub order: Order,
    pub quote_id: String,
    pub src_chain_id: u64,
    pub extension: Bytes,
    /// Decimal text of the uint256 fields exactly as quoted
    pub making_amount: ExactAmount,
    pub taking_amount: ExactAmount,
    pub salt: ExactAmount,
    pub maker_traits: ExactAmount,
}

impl SignableOrder {
    /// EIP-712 digest the maker signs
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        self.order.eip712_signing_hash(domain)
    }

    /// Order message as the relayer and JSON wallets expect it
    pub fn message_json(&self) -> Value {
        json!({
            "salt": self.salt.as_str(),
            "maker": self.order.maker.to_checksum(None),
            "receiver": self.order.receiver.to_checksum(None),
            "makerAsset": self.order.makerAsset.to_checksum(None),
            "takerAsset": self.order.takerAsset.to_checksum(None),
            "makingAmount": self.making_amount.as_str(),
            "takingAmount": self.taking_amount.as_str(),
            "makerTraits": self.maker_traits.as_str(),
        })
    }

    /// Full `eth_signTypedData_v4` payload
    pub fn typed_data_json(&self, domain: &Eip712Domain) -> Value {
        let mut domain_json = serde_json::Map::new();
        let mut domain_types = Vec::new();

        if let Some(name) = &domain.name {
            domain_json.insert("name".into(), json!(name));
            domain_types.push(json!({ "name": "name", "type": "string" }));
        }
        if let Some(version) = &domain.version {
            domain_json.insert("version".into(), json!(version));
            domain_types.push(json!({ "name": "version", "type": "string" }));
        }
        if let Some(chain_id) = domain.chain_id {
            domain_json.insert("chainId".into(), json!(chain_id.to_string()));
            domain_types.push(json!({ "name": "chainId", "type": "uint256" }));
        }
        if let Some(contract) = domain.verifying_contract {
            domain_json.insert("verifyingContract".into(), json!(contract.to_checksum(None)));
            domain_types.push(json!({ "name": "verifyingContract", "type": "address" }));
        }

        json!({
            "types": {
                "EIP712Domain": domain_types,
                "Order": [
                    { "name": "salt", "type": "uint256" },
                    { "name": "maker", "type": "address" },
                    { "name": "receiver", "type": "address" },
                    { "name": "makerAsset", "type": "address" },
                    { "name": "takerAsset", "type": "address" },
                    { "name": "makingAmount", "type": "uint256" },
                    { "name": "takingAmount", "type": "uint256" },
                    { "name": "makerTraits", "type": "uint256" },
                ],
            },
            "primaryType": "Order",
            "domain": Value::Object(domain_json),
            "message": self.message_json(),
        })
    }
}

/// Domain of the limit order contract on the source chain
pub fn order_domain(config: &OrderConfig, chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Owned(config.domain_name.clone())),
        Some(Cow::Owned(config.domain_version.clone())),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_string() {
        assert_eq!(
            Order::eip712_encode_type(),
            "Order(uint256 salt,address maker,address receiver,address makerAsset,address takerAsset,uint256 makingAmount,uint256 takingAmount,uint256 makerTraits)"
        );
    }

    #[test]
    fn test_domain_fields() {
        let contract: Address = "0x111111125421ca6dc452d289314280a0f8842a65".parse().unwrap();
        let domain = order_domain(&OrderConfig::default(), 137, contract);
        assert_eq!(domain.name.as_deref(), Some("1inch Aggregation Router"));
        assert_eq!(domain.version.as_deref(), Some("6"));
        assert_eq!(domain.chain_id, Some(U256::from(137u64)));
        assert_eq!(domain.verifying_contract, Some(contract));
    }
}
