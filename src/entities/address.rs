use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub formatted_address: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}
