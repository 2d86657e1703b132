//! Core data models for the exporter

use serde::Serialize;

/// Number of input features expected by the model
pub const NUM_FEATURES: usize = 12;

/// Column names in the order the model was trained on
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "Store",
    "Holiday_Flag",
    "Temperature",
    "Fuel_Price",
    "CPI",
    "Unemployment",
    "Month",
    "Year",
    "Weekly_Sales_Lag1",
    "Weekly_Sales_Lag2",
    "Weekly_Sales_Lag4",
    "Temperature_Fuel_Interaction",
];

/// One row of model input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeatureRecord {
    pub store: u32,
    #[serde(rename = "Holiday_Flag")]
    pub holiday_flag: u8,
    pub temperature: f64,
    #[serde(rename = "Fuel_Price")]
    pub fuel_price: f64,
    #[serde(rename = "CPI")]
    pub cpi: f64,
    pub unemployment: f64,
    pub month: u32,
    pub year: i32,
    #[serde(rename = "Weekly_Sales_Lag1")]
    pub weekly_sales_lag1: f64,
    #[serde(rename = "Weekly_Sales_Lag2")]
    pub weekly_sales_lag2: f64,
    #[serde(rename = "Weekly_Sales_Lag4")]
    pub weekly_sales_lag4: f64,
    #[serde(rename = "Temperature_Fuel_Interaction")]
    pub temperature_fuel_interaction: f64,
}

impl FeatureRecord {
    /// Overwrite the interaction term from the current temperature and fuel price.
    ///
    /// Must be the last mutation before the record is handed to a predictor.
    pub fn recompute_interaction(&mut self) {
        self.temperature_fuel_interaction = self.temperature * self.fuel_price;
    }

    /// Values in `FEATURE_NAMES` order
    pub fn values(&self) -> [f64; NUM_FEATURES] {
        [
            self.store as f64,
            self.holiday_flag as f64,
            self.temperature,
            self.fuel_price,
            self.cpi,
            self.unemployment,
            self.month as f64,
            self.year as f64,
            self.weekly_sales_lag1,
            self.weekly_sales_lag2,
            self.weekly_sales_lag4,
            self.temperature_fuel_interaction,
        ]
    }

    /// Named fields in model column order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }
}
