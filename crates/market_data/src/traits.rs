use anyhow::Context;

/// A decoded remote payload that converts into a domain value.
pub trait RemoteResponse<T> {
    fn to_domain(&self) -> anyhow::Result<T>;

    /// Binance sends decimals as strings.
    fn parse_decimal(&self, field: &'static str, raw: &str) -> anyhow::Result<f64> {
        raw.trim()
            .parse::<f64>()
            .with_context(|| format!("Field {} is not a number: {:?}", field, raw))
    }
}
