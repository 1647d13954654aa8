//! EVM contract access conditions evaluated by the key-escrow network.
//!
//! The JSON produced here is a wire contract: field names, clause order and
//! comparator strings must not change, or the escrow network refuses to
//! release keys for listings that were already published.

use serde::{Deserialize, Serialize};

/// Placeholder the escrow network replaces with the requester's address.
pub const USER_ADDRESS_PLACEHOLDER: &str = ":userAddress";

pub const ITEMS_FUNCTION: &str = "items";
pub const PURCHASE_FUNCTION: &str = "purchase";
pub const EQUALS: &str = "=";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiParam {
    pub internal_type: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl AbiParam {
    fn new(kind: &str, name: &str) -> Self {
        Self {
            internal_type: kind.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionAbi {
    pub inputs: Vec<AbiParam>,
    pub name: String,
    pub outputs: Vec<AbiParam>,
    pub state_mutability: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FunctionAbi {
    fn view(name: &str, inputs: Vec<AbiParam>, outputs: Vec<AbiParam>) -> Self {
        Self {
            inputs,
            name: name.to_string(),
            outputs,
            state_mutability: "view".to_string(),
            kind: "function".to_string(),
        }
    }

    /// `items(uint256) returns (address seller, address investor, string uri, uint256 price)`
    pub fn items() -> Self {
        Self::view(
            ITEMS_FUNCTION,
            vec![AbiParam::new("uint256", "")],
            vec![
                AbiParam::new("address", "seller"),
                AbiParam::new("address", "investor"),
                AbiParam::new("string", "uri"),
                AbiParam::new("uint256", "price"),
            ],
        )
    }

    /// `purchase(uint256, address) returns (bool)`
    pub fn purchase() -> Self {
        Self::view(
            PURCHASE_FUNCTION,
            vec![AbiParam::new("uint256", ""), AbiParam::new("address", "")],
            vec![AbiParam::new("bool", "")],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValueTest {
    pub key: String,
    pub comparator: String,
    pub value: String,
}

impl ReturnValueTest {
    fn equals(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            comparator: EQUALS.to_string(),
            value: value.into(),
        }
    }
}

/// A clause asserting the return value of a view call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCondition {
    pub contract_address: String,
    pub chain: String,
    pub function_name: String,
    pub function_params: Vec<String>,
    pub function_abi: FunctionAbi,
    pub return_value_test: ReturnValueTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCondition {
    pub operator: Operator,
}

/// One entry of the ordered condition list; evaluated left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessCondition {
    Contract(ContractCondition),
    Operator(OperatorCondition),
}

impl AccessCondition {
    pub fn and() -> Self {
        AccessCondition::Operator(OperatorCondition {
            operator: Operator::And,
        })
    }

    pub fn as_contract(&self) -> Option<&ContractCondition> {
        match self {
            AccessCondition::Contract(condition) => Some(condition),
            AccessCondition::Operator(_) => None,
        }
    }
}

/// Inputs of [`build_contract_conditions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionArgs {
    pub contract_address: String,
    pub chain: String,
    pub item_id: String,
    /// Price in wei as a decimal integer string.
    pub price: String,
    pub seller: String,
}

/// Build the five-clause policy: the listing's seller matches, the listing's
/// price matches, and the requester has purchased the item.
pub fn build_contract_conditions(args: &ConditionArgs) -> Vec<AccessCondition> {
    let items_call = |test: ReturnValueTest| {
        AccessCondition::Contract(ContractCondition {
            contract_address: args.contract_address.clone(),
            chain: args.chain.clone(),
            function_name: ITEMS_FUNCTION.to_string(),
            function_params: vec![args.item_id.clone()],
            function_abi: FunctionAbi::items(),
            return_value_test: test,
        })
    };

    vec![
        items_call(ReturnValueTest::equals(
            "seller",
            args.seller.to_lowercase(),
        )),
        AccessCondition::and(),
        items_call(ReturnValueTest::equals("price", args.price.clone())),
        AccessCondition::and(),
        AccessCondition::Contract(ContractCondition {
            contract_address: args.contract_address.clone(),
            chain: args.chain.clone(),
            function_name: PURCHASE_FUNCTION.to_string(),
            function_params: vec![
                args.item_id.clone(),
                USER_ADDRESS_PLACEHOLDER.to_string(),
            ],
            function_abi: FunctionAbi::purchase(),
            return_value_test: ReturnValueTest::equals("", "true"),
        }),
    ]
}
