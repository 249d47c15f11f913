//! Provider payload normalization
//!
//! Turns a raw [`ProviderPayload`] into a complete [`Product`]. Missing or
//! non-finite numbers become zero, rank and sales counts are floored, and
//! absent presentation fields get fixed defaults.

use pulse_core::{
    Asin, Product, ProviderPayload, Timestamp, DEFAULT_SEASONALITY_TAG, DEFAULT_STORAGE_FEE,
};

/// Brand reported when the provider omits one.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Category reported when the provider omits one.
pub const DEFAULT_CATEGORY: &str = "Misc";

/// Placeholder image for products without one.
pub fn placeholder_image(asin: &Asin) -> String {
    format!("https://picsum.photos/seed/{}/400/400", asin)
}

fn number(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn count(value: Option<f64>) -> i64 {
    number(value).floor() as i64
}

fn text(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Canonical value first; a zero or missing one falls through to the
/// alternate spelling.
fn either_number(canonical: Option<f64>, alternate: Option<f64>) -> Option<f64> {
    canonical
        .filter(|v| v.is_finite() && *v != 0.0)
        .or(alternate)
        .or(canonical)
}

fn either_text(canonical: Option<String>, alternate: Option<String>) -> Option<String> {
    text(canonical).or_else(|| text(alternate))
}

/// Build the normalized record for `asin` from a raw payload.
///
/// The identifier always comes from the caller, never the payload.
/// A zero storage fee is treated as unreported.
pub fn normalize(asin: &Asin, raw: ProviderPayload, now: Timestamp) -> Product {
    let storage_fee = match number(raw.storage_fee) {
        fee if fee == 0.0 => DEFAULT_STORAGE_FEE,
        fee => fee,
    };

    let seasonality_tags = raw
        .seasonality_tags
        .filter(|tags| !tags.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_SEASONALITY_TAG.to_string()]);

    Product {
        asin: asin.clone(),
        title: either_text(raw.title, raw.name).unwrap_or_else(|| asin.to_string()),
        brand: either_text(raw.brand, raw.manufacturer)
            .unwrap_or_else(|| UNKNOWN_BRAND.to_string()),
        category: text(raw.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        sub_category: text(raw.sub_category),
        image: text(raw.image).unwrap_or_else(|| placeholder_image(asin)),
        price: number(either_number(raw.price, raw.current_price)),
        bsr: count(either_number(raw.bsr, raw.rank)),
        est_sales: count(either_number(raw.est_sales, raw.estimated_sales)),
        sellers: count(either_number(raw.sellers, raw.offer_count)),
        referral_fee: number(raw.referral_fee),
        fba_fee: number(raw.fba_fee),
        storage_fee,
        weight: text(raw.weight),
        dimensions: text(raw.dimensions),
        is_hazmat: raw.is_hazmat.unwrap_or(false),
        is_ip_risk: raw.is_ip_risk.unwrap_or(false),
        is_oversized: raw.is_oversized.unwrap_or(false),
        rating: number(raw.rating),
        reviews: count(raw.reviews),
        trend: number(raw.trend),
        description: raw.description.unwrap_or_default(),
        seasonality_tags,
        analysis: raw.analysis.filter(|v| !v.is_null()),
        price_history: raw.price_history.unwrap_or_default(),
        bsr_history: raw.bsr_history.unwrap_or_default(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use pulse_core::PricePoint;

    fn asin() -> Asin {
        Asin::parse("B07XJWD7Z3").unwrap()
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let product = normalize(&asin(), ProviderPayload::default(), Utc::now());

        assert_eq!(product.rating, 0.0);
        assert_eq!(product.seasonality_tags, vec!["Evergreen".to_string()]);
        assert_eq!(product.image, "https://picsum.photos/seed/B07XJWD7Z3/400/400");
        assert_eq!(product.storage_fee, 0.55);
        assert_eq!(product.title, "B07XJWD7Z3");
        assert_eq!(product.brand, "Unknown");
        assert_eq!(product.category, "Misc");
        assert_eq!(product.description, "");
        assert!(product.price_history.is_empty());
        assert!(!product.is_hazmat);
    }

    #[test]
    fn test_counts_are_floored() {
        let raw = ProviderPayload {
            bsr: Some(1234.9),
            est_sales: Some(404.99),
            sellers: Some(3.5),
            ..ProviderPayload::default()
        };
        let product = normalize(&asin(), raw, Utc::now());
        assert_eq!(product.bsr, 1234);
        assert_eq!(product.est_sales, 404);
        assert_eq!(product.sellers, 3);
    }

    #[test]
    fn test_reported_values_are_kept() {
        let now = Utc::now();
        let raw = ProviderPayload {
            asin: Some("SOMETHING01".to_string()),
            title: Some("Silicone Spatula".to_string()),
            price: Some(14.99),
            storage_fee: Some(1.2),
            seasonality_tags: Some(vec!["Q4".to_string()]),
            image: Some("https://cdn.test/a.png".to_string()),
            price_history: Some(vec![PricePoint {
                date: "2026-10-01".to_string(),
                price: 14.5,
            }]),
            ..ProviderPayload::default()
        };
        let product = normalize(&asin(), raw, now);

        assert_eq!(product.asin, asin());
        assert_eq!(product.title, "Silicone Spatula");
        assert_eq!(product.price, 14.99);
        assert_eq!(product.storage_fee, 1.2);
        assert_eq!(product.seasonality_tags, vec!["Q4".to_string()]);
        assert_eq!(product.image, "https://cdn.test/a.png");
        assert_eq!(product.price_history.len(), 1);
        assert_eq!(product.updated_at, now);
    }

    #[test]
    fn test_lenient_payload_from_json() {
        let raw: ProviderPayload = serde_json::from_str(
            r#"{"name": "Mat", "currentPrice": "9.50", "rank": "n/a", "rating": null}"#,
        )
        .unwrap();
        let product = normalize(&asin(), raw, Utc::now());
        assert_eq!(product.title, "Mat");
        assert_eq!(product.price, 9.5);
        assert_eq!(product.bsr, 0);
        assert_eq!(product.rating, 0.0);
    }

    #[test]
    fn test_canonical_keys_win_over_alternates() {
        let raw: ProviderPayload = serde_json::from_str(
            r#"{"title": "Spatula", "name": "Other", "price": 7, "currentPrice": 9,
                "manufacturer": "Kitchenly", "rank": 55, "estSales": 0, "estimatedSales": 12}"#,
        )
        .unwrap();
        let product = normalize(&asin(), raw, Utc::now());

        assert_eq!(product.title, "Spatula");
        assert_eq!(product.price, 7.0);
        assert_eq!(product.brand, "Kitchenly");
        assert_eq!(product.bsr, 55);
        assert_eq!(product.est_sales, 12);
        assert_eq!(product.sellers, 0);
    }

    #[test]
    fn test_off_type_fields_do_not_fail_normalization() {
        let raw: ProviderPayload = serde_json::from_str(
            r#"{"isHazmat": 1, "weight": 1.2, "seasonalityTags": "Q4", "offerCount": "3"}"#,
        )
        .unwrap();
        let product = normalize(&asin(), raw, Utc::now());

        assert!(product.is_hazmat);
        assert_eq!(product.weight.as_deref(), Some("1.2"));
        assert_eq!(product.seasonality_tags, vec!["Q4".to_string()]);
        assert_eq!(product.sellers, 3);
    }

    proptest! {
        #[test]
        fn prop_normalized_numbers_are_finite(
            price in proptest::option::of(proptest::num::f64::ANY),
            bsr in proptest::option::of(proptest::num::f64::ANY),
            fee in proptest::option::of(proptest::num::f64::ANY),
        ) {
            let raw = ProviderPayload {
                price,
                bsr,
                storage_fee: fee,
                ..ProviderPayload::default()
            };
            let product = normalize(&asin(), raw, Utc::now());
            prop_assert!(product.price.is_finite());
            prop_assert!(product.storage_fee.is_finite());
            prop_assert!(product.storage_fee != 0.0);
            prop_assert!(!product.seasonality_tags.is_empty());
            prop_assert!(!product.image.is_empty());
        }
    }
}
