use serde::{Deserialize, Serialize};

/// Bank account printed on documents so customers know where to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub ifsc: String,
    pub branch: Option<String>,
}
