use crate::error::{Error, Result};

/// Parse a displayed price such as `$1,234.50`, `US $12.99`,
/// `Subtotal (2 items): US $198.50` or `$10.00 to $25.00` (first price wins).
pub fn parse_price(text: &str) -> Result<f64> {
    let mut cleaned = text.replace(['$', ','], "").replace("US", "");
    if let Some((_, tail)) = cleaned.rsplit_once(':') {
        cleaned = tail.to_string();
    }
    let lowered = cleaned.to_ascii_lowercase();
    let first = match lowered.find(" to ") {
        Some(idx) => &cleaned[..idx],
        None => cleaned.as_str(),
    };
    first
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
        .ok_or_else(|| Error::PriceParse(text.to_string()))
}
