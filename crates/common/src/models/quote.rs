use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, price: f64, change_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_percent,
        }
    }
}
