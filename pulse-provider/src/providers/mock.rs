//! Synthetic product provider for development.
//!
//! Values are derived from a hash of the identifier, so the same ASIN always
//! yields the same product. Only the history dates move with the clock.

use crate::ProductProvider;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use pulse_core::{history_date, Asin, PricePoint, ProviderError, ProviderPayload, RankPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Days of history before today; the series has `HISTORY_DAYS + 1` points.
pub const HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct MockProductProvider {
    latency: Duration,
}

impl Default for MockProductProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl MockProductProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn rng_for(asin: &Asin) -> StdRng {
        let digest = Sha256::digest(asin.as_str().as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        StdRng::seed_from_u64(u64::from_le_bytes(seed))
    }

    /// Build the payload for `asin` without simulated latency.
    pub fn payload_for(&self, asin: &Asin) -> ProviderPayload {
        let mut rng = Self::rng_for(asin);

        let base_price = round2(rng.random_range(20.0..120.0));
        let base_bsr: i64 = rng.random_range(500..20_500);
        let sellers: i64 = rng.random_range(1..=15);
        let is_hazmat = rng.random_bool(0.1);
        let is_ip_risk = rng.random_bool(0.1);

        let today = Utc::now();
        let mut price_history = Vec::with_capacity(HISTORY_DAYS as usize + 1);
        let mut bsr_history = Vec::with_capacity(HISTORY_DAYS as usize + 1);
        for days_ago in (0..=HISTORY_DAYS).rev() {
            let date = history_date(&(today - ChronoDuration::days(days_ago)));
            let price_jitter = (rng.random::<f64>() - 0.5) * base_price * 0.1;
            let rank_jitter = (rng.random::<f64>() - 0.5) * base_bsr as f64 * 0.1;
            price_history.push(PricePoint {
                date: date.clone(),
                price: round2((base_price + price_jitter).max(0.0)),
            });
            bsr_history.push(RankPoint {
                date,
                rank: (base_bsr as f64 + rank_jitter).max(1.0).floor() as i64,
            });
        }

        ProviderPayload {
            asin: Some(asin.to_string()),
            title: Some(format!("Mock Product Title for {}", asin)),
            brand: Some("MockBrand".to_string()),
            category: Some("Home & Kitchen".to_string()),
            price: Some(base_price),
            bsr: Some(base_bsr as f64),
            est_sales: Some((500_000 / base_bsr) as f64),
            sellers: Some(sellers as f64),
            referral_fee: Some(round2(base_price * 0.15)),
            fba_fee: Some(5.50),
            weight: Some("1.2 lbs".to_string()),
            dimensions: Some("10x5x2 in".to_string()),
            is_hazmat: Some(is_hazmat),
            is_ip_risk: Some(is_ip_risk),
            image: Some(format!("https://picsum.photos/seed/{}/400/400", asin)),
            price_history: Some(price_history),
            bsr_history: Some(bsr_history),
            ..ProviderPayload::default()
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl ProductProvider for MockProductProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_product(&self, asin: &Asin) -> Result<ProviderPayload, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.payload_for(asin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_deterministic_per_asin() {
        let provider = MockProductProvider::new(Duration::ZERO);
        let a = Asin::parse("B000000001").unwrap();
        let b = Asin::parse("B000000002").unwrap();

        let first = provider.payload_for(&a);
        assert_eq!(first, provider.payload_for(&a));
        assert_ne!(first.price, provider.payload_for(&b).price);
    }

    #[test]
    fn test_payload_has_31_days_of_history() {
        let provider = MockProductProvider::new(Duration::ZERO);
        let payload = provider.payload_for(&Asin::parse("B000000001").unwrap());
        let prices = payload.price_history.unwrap();
        let ranks = payload.bsr_history.unwrap();
        assert_eq!(prices.len(), 31);
        assert_eq!(ranks.len(), 31);
        assert!(ranks.iter().all(|r| r.rank >= 1));
        assert!(prices.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_payload_values_are_in_range() {
        let provider = MockProductProvider::new(Duration::ZERO);
        let payload = provider.payload_for(&Asin::parse("B0C1XYZ987").unwrap());
        let price = payload.price.unwrap();
        let bsr = payload.bsr.unwrap();
        assert!((20.0..=120.0).contains(&price));
        assert!((500.0..20_500.0).contains(&bsr));
        assert_eq!(payload.est_sales, Some((500_000 / bsr as i64) as f64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_applies_latency() {
        let provider = MockProductProvider::new(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        provider
            .fetch_product(&Asin::parse("B000000001").unwrap())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
