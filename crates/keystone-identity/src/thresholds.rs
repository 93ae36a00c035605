//! Required approval counts per purpose

use keystone_core::{IdentityError, IdentityResult, Purpose};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Approval count required before an execution of a given purpose dispatches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    default_required: u32,
    required: BTreeMap<Purpose, u32>,
}

impl ThresholdConfig {
    /// Create with a fallback count for purposes never configured
    ///
    /// A zero fallback is raised to 1.
    pub fn new(default_required: u32) -> Self {
        Self {
            default_required: default_required.max(1),
            required: BTreeMap::new(),
        }
    }

    /// Count used for purposes without an explicit entry
    pub fn default_required(&self) -> u32 {
        self.default_required
    }

    /// Required approvals for `purpose`
    pub fn get(&self, purpose: Purpose) -> u32 {
        self.required
            .get(&purpose)
            .copied()
            .unwrap_or(self.default_required)
    }

    /// Overwrite the requirement for `purpose`
    pub fn set(&mut self, purpose: Purpose, count: u32) -> IdentityResult<()> {
        if count == 0 {
            return Err(IdentityError::InvalidThreshold { purpose, count });
        }
        self.required.insert(purpose, count);
        Ok(())
    }

    /// Explicitly configured entries
    pub fn iter(&self) -> impl Iterator<Item = (Purpose, u32)> + '_ {
        self.required.iter().map(|(purpose, count)| (*purpose, *count))
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one() {
        let config = ThresholdConfig::default();
        assert_eq!(config.get(Purpose::MANAGEMENT), 1);
        assert_eq!(config.get(Purpose::EXECUTION), 1);
        assert_eq!(ThresholdConfig::new(0).default_required(), 1);
    }

    #[test]
    fn test_set_overrides_single_purpose() {
        let mut config = ThresholdConfig::default();
        config.set(Purpose::MANAGEMENT, 3).unwrap();
        assert_eq!(config.get(Purpose::MANAGEMENT), 3);
        assert_eq!(config.get(Purpose::EXECUTION), 1);
        assert_eq!(config.iter().collect::<Vec<_>>(), vec![(Purpose::MANAGEMENT, 3)]);
    }

    #[test]
    fn test_zero_rejected_and_unchanged() {
        let mut config = ThresholdConfig::default();
        config.set(Purpose::EXECUTION, 2).unwrap();
        assert_eq!(
            config.set(Purpose::EXECUTION, 0),
            Err(IdentityError::InvalidThreshold {
                purpose: Purpose::EXECUTION,
                count: 0
            })
        );
        assert_eq!(config.get(Purpose::EXECUTION), 2);
    }
}
