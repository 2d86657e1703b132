//! Synthetic feature generation
//!
//! Stands in for real traffic: every cycle draws a fresh record whose fields
//! are sampled independently from the ranges the model saw during training.

use crate::models::FeatureRecord;
use rand::Rng;
use std::ops::RangeInclusive;

pub const STORE_RANGE: RangeInclusive<u32> = 1..=45;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 20.0..=80.0;
pub const FUEL_PRICE_RANGE: RangeInclusive<f64> = 2.5..=4.5;
pub const CPI_RANGE: RangeInclusive<f64> = 200.0..=220.0;
pub const UNEMPLOYMENT_RANGE: RangeInclusive<f64> = 5.0..=10.0;
pub const MONTH_RANGE: RangeInclusive<u32> = 1..=12;
pub const SALES_LAG_RANGE: RangeInclusive<f64> = 50_000.0..=200_000.0;

/// Calendar years covered by the training data
pub const YEARS: [i32; 3] = [2010, 2011, 2012];

/// Source of model input, one record per collection cycle
pub trait FeatureSource: Send + Sync {
    fn generate(&self) -> FeatureRecord;
}

/// Uniform random sampler over the training ranges
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticFeatureGenerator;

impl SyntheticFeatureGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureSource for SyntheticFeatureGenerator {
    fn generate(&self) -> FeatureRecord {
        let mut rng = rand::rng();

        let mut record = FeatureRecord {
            store: rng.random_range(STORE_RANGE),
            holiday_flag: rng.random_range(0..=1),
            temperature: rng.random_range(TEMPERATURE_RANGE),
            fuel_price: rng.random_range(FUEL_PRICE_RANGE),
            cpi: rng.random_range(CPI_RANGE),
            unemployment: rng.random_range(UNEMPLOYMENT_RANGE),
            month: rng.random_range(MONTH_RANGE),
            year: YEARS[rng.random_range(0..YEARS.len())],
            weekly_sales_lag1: rng.random_range(SALES_LAG_RANGE),
            weekly_sales_lag2: rng.random_range(SALES_LAG_RANGE),
            weekly_sales_lag4: rng.random_range(SALES_LAG_RANGE),
            temperature_fuel_interaction: 0.0,
        };
        record.recompute_interaction();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_fields_within_ranges() {
        let generator = SyntheticFeatureGenerator::new();
        for _ in 0..500 {
            let r = generator.generate();
            assert!(STORE_RANGE.contains(&r.store));
            assert!(r.holiday_flag <= 1);
            assert!(TEMPERATURE_RANGE.contains(&r.temperature));
            assert!(FUEL_PRICE_RANGE.contains(&r.fuel_price));
            assert!(CPI_RANGE.contains(&r.cpi));
            assert!(UNEMPLOYMENT_RANGE.contains(&r.unemployment));
            assert!(MONTH_RANGE.contains(&r.month));
            assert!(YEARS.contains(&r.year));
            assert!(SALES_LAG_RANGE.contains(&r.weekly_sales_lag1));
            assert!(SALES_LAG_RANGE.contains(&r.weekly_sales_lag2));
            assert!(SALES_LAG_RANGE.contains(&r.weekly_sales_lag4));
        }
    }

    #[test]
    fn test_interaction_matches_sampled_fields() {
        let generator = SyntheticFeatureGenerator::new();
        for _ in 0..100 {
            let r = generator.generate();
            assert_eq!(r.temperature_fuel_interaction, r.temperature * r.fuel_price);
        }
    }

    #[test]
    fn test_draws_are_independent() {
        let generator = SyntheticFeatureGenerator::new();
        let first = generator.generate();
        let differs = (0..20).any(|_| generator.generate() != first);
        assert!(differs, "generator returned the same record 20 times");
    }

    #[test]
    fn test_usable_as_trait_object() {
        let source: Box<dyn FeatureSource> = Box::new(SyntheticFeatureGenerator::new());
        let r = source.generate();
        assert!(STORE_RANGE.contains(&r.store));
    }
}
