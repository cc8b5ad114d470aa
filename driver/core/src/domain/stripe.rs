// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stripe Pattern Parameters
//!
//! Storage classes may pin how BeeGFS stripes the files of a new volume
//! through `stripePattern/*` parameters. Only a closed set of keys is
//! understood; any other key carrying the prefix is a user mistake and fails
//! volume creation instead of being silently ignored.

use std::collections::HashMap;
use thiserror::Error;

pub const STRIPE_PATTERN_PREFIX: &str = "stripePattern/";
pub const STORAGE_POOL_ID_KEY: &str = "stripePattern/storagePoolID";
pub const CHUNK_SIZE_KEY: &str = "stripePattern/chunkSize";
pub const NUM_TARGETS_KEY: &str = "stripePattern/numTargets";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StripePatternError {
    #[error("CreateVolume parameter invalid: {0}")]
    UnknownParameter(String),
}

/// Striping settings applied to a freshly created volume directory
///
/// Values are passed through to `beegfs-ctl --setpattern` verbatim; BeeGFS
/// itself validates units such as `512k` or `1m`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripePatternConfig {
    pub storage_pool_id: Option<String>,
    pub chunk_size: Option<String>,
    pub num_targets: Option<String>,
}

impl StripePatternConfig {
    /// Extract the stripe pattern from CreateVolume parameters
    ///
    /// Keys without the `stripePattern/` prefix are ignored. Empty values are
    /// treated as unset. When several unknown keys are present the
    /// lexicographically smallest one is reported.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self, StripePatternError> {
        let mut keys: Vec<&String> = parameters
            .keys()
            .filter(|k| k.starts_with(STRIPE_PATTERN_PREFIX))
            .collect();
        keys.sort();

        let mut config = Self::default();
        for key in keys {
            let value = parameters
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned();

            match key.as_str() {
                STORAGE_POOL_ID_KEY => config.storage_pool_id = value,
                CHUNK_SIZE_KEY => config.chunk_size = value,
                NUM_TARGETS_KEY => config.num_targets = value,
                other => return Err(StripePatternError::UnknownParameter(other.to_string())),
            }
        }

        Ok(config)
    }

    /// True when no striping setting was requested
    pub fn is_empty(&self) -> bool {
        self.storage_pool_id.is_none() && self.chunk_size.is_none() && self.num_targets.is_none()
    }
}
