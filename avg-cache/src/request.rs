// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::BTreeSet;
use std::fmt;

use sha2::{Digest, Sha256};

const KEY_HEX_LEN: usize = 32;

/// Everything that determines the content of an averaged stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub identifier: String,
    pub window: f64,
    pub shift: f64,
    /// Column the windows are laid over.
    pub time_field: String,
    /// Weight expression; `None` means a constant weight of 1.
    pub weight: Option<String>,
    pub cuts: BTreeSet<String>,
}

impl AggregationRequest {
    pub fn new(identifier: &str, window: f64, shift: f64) -> Self {
        Self {
            identifier: identifier.trim().to_string(),
            window,
            shift,
            time_field: "time".to_string(),
            weight: None,
            cuts: BTreeSet::new(),
        }
    }

    pub fn with_time_field(mut self, field: &str) -> Self {
        self.time_field = field.trim().to_string();
        self
    }

    pub fn with_weight(mut self, weight: Option<&str>) -> Self {
        self.weight = weight
            .map(str::trim)
            .filter(|w| !w.is_empty() && *w != "1")
            .map(str::to_string);
        self
    }

    pub fn with_cuts<S: AsRef<str>>(mut self, cuts: impl IntoIterator<Item = S>) -> Self {
        self.cuts = cuts
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self
    }

    pub fn weight_expr(&self) -> &str {
        self.weight.as_deref().unwrap_or("1")
    }

    /// Digest of the canonical request encoding; equal requests share a key.
    pub fn key(&self) -> CacheKey {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(self.identifier.as_bytes());
        field(&normalize_zero(self.window).to_bits().to_le_bytes());
        field(&normalize_zero(self.shift).to_bits().to_le_bytes());
        field(self.time_field.as_bytes());
        field(self.weight_expr().as_bytes());
        for cut in &self.cuts {
            field(cut.as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        CacheKey(digest[..KEY_HEX_LEN].to_string())
    }
}

fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("avg{}.parquet", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_requests_share_a_key() {
        let a = AggregationRequest::new("d.parquet:/raw", 3600.0, 1.0)
            .with_cuts(["p > 1", "T < 2"]);
        let b = AggregationRequest::new(" d.parquet:/raw ", 3600.0, 1.0)
            .with_weight(Some("1"))
            .with_cuts(["T < 2", " p > 1", "p > 1", ""]);
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str().len(), 32);
        assert!(a.key().file_name().starts_with("avg"));
    }

    #[test]
    fn any_field_changes_the_key() {
        let base = AggregationRequest::new("d.parquet:/raw", 3600.0, 1.0);
        let key = base.key();
        assert_ne!(key, AggregationRequest::new("e.parquet:/raw", 3600.0, 1.0).key());
        assert_ne!(key, AggregationRequest::new("d.parquet:/raw", 60.0, 1.0).key());
        assert_ne!(key, AggregationRequest::new("d.parquet:/raw", 3600.0, 0.5).key());
        assert_ne!(key, base.clone().with_time_field("t").key());
        assert_eq!(key, base.clone().with_time_field(" time ").key());
        assert_ne!(key, base.clone().with_weight(Some("p")).key());
        assert_ne!(key, base.with_cuts(["p > 1"]).key());
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = AggregationRequest::new("x", 1.0, 1.0).with_cuts(["ab", "c"]);
        let b = AggregationRequest::new("x", 1.0, 1.0).with_cuts(["a", "bc"]);
        assert_ne!(a.key(), b.key());
    }
}
