//! Valuation: watched stock model, fallback averaging and the weighted
//! fair-value formula.

mod averager;
mod types;
mod valuator;

pub use averager::{resolve, resolve_series};
pub use types::{
    serialize_sentinel, Stock, Thresholds, ValuationBand, ValuationUpdate, UNAVAILABLE_SENTINEL,
};
pub use valuator::{blended_pe, combined_roe, Valuator};
