//! Order pricing
//!
//! Prices are per kilobyte of the uploaded file. Amounts keep two decimal
//! places, matching how they are stored.

use rust_decimal::Decimal;

use crate::types::{CartEntry, PriceRule};

/// Decimal places kept on every stored amount
pub const PRICE_SCALE: u32 = 2;

/// Price for a document of `size_kb` kilobytes at `price_per_unit` per KB
pub fn order_price(size_kb: i64, price_per_unit: Decimal) -> Decimal {
    (Decimal::from(size_kb) * price_per_unit).round_dp(PRICE_SCALE)
}

/// Sum of the order prices of `entries`
pub fn cart_total<'a, I>(entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a CartEntry>,
{
    entries
        .into_iter()
        .map(|entry| entry.order_price)
        .sum::<Decimal>()
        .round_dp(PRICE_SCALE)
}

/// Canonical form of a file-type key: no leading dot, lowercase
pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}

/// The price table installed by `init-prices`
pub fn default_price_rules() -> Vec<PriceRule> {
    [("jpg", 5), ("jpeg", 5), ("png", 7), ("pdf", 10)]
        .into_iter()
        .map(|(ext, cents)| PriceRule {
            file_extension: ext.to_string(),
            price_per_unit: Decimal::new(cents, PRICE_SCALE),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pdf_example_price() {
        let price = order_price(100, Decimal::new(10, 2));
        assert_eq!(price, Decimal::new(1000, 2));
        assert_eq!(price.to_string(), "10.00");
    }

    #[test]
    fn test_price_rounds_to_cents() {
        // 3 KB at 0.333 = 0.999
        assert_eq!(order_price(3, Decimal::new(333, 3)), Decimal::new(100, 2));
        assert_eq!(order_price(0, Decimal::new(10, 2)), Decimal::ZERO);
    }

    #[test]
    fn test_cart_total_over_two_entries() {
        let entries: Vec<CartEntry> = (1..=2)
            .map(|id| CartEntry {
                id,
                owner_id: 1,
                document_id: id,
                order_price: order_price(100, Decimal::new(10, 2)),
                paid: false,
                created_at: Utc::now(),
            })
            .collect();

        assert_eq!(cart_total(&entries), Decimal::new(2000, 2));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".PDF"), "pdf");
        assert_eq!(normalize_extension(" jpeg "), "jpeg");
    }

    #[test]
    fn test_default_price_rules() {
        let rules = default_price_rules();
        let lookup = |ext: &str| {
            rules
                .iter()
                .find(|r| r.file_extension == ext)
                .map(|r| r.price_per_unit.to_string())
        };

        assert_eq!(rules.len(), 4);
        assert_eq!(lookup("jpg").as_deref(), Some("0.05"));
        assert_eq!(lookup("jpeg").as_deref(), Some("0.05"));
        assert_eq!(lookup("png").as_deref(), Some("0.07"));
        assert_eq!(lookup("pdf").as_deref(), Some("0.10"));
    }
}
