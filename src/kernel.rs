use serde::{Deserialize, Serialize};

use crate::error::{LocatorError, Result};
use crate::types::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelEntry {
    pub offset: Timestamp,
    pub weight: f64,
}

/// Temporal weighting window around the timestamp being located.
///
/// Offsets are unique and weights are finite and positive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(Timestamp, f64)>", into = "Vec<(Timestamp, f64)>")]
pub struct Kernel {
    entries: Vec<KernelEntry>,
}

impl Kernel {
    pub fn new(pairs: Vec<(Timestamp, f64)>) -> Result<Self> {
        if pairs.is_empty() {
            return Err(LocatorError::InvalidConfig("kernel has no entries".to_string()));
        }

        let mut entries: Vec<KernelEntry> = Vec::with_capacity(pairs.len());
        for (offset, weight) in pairs {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(LocatorError::InvalidConfig(format!(
                    "kernel weight {} at offset {} must be finite and positive",
                    weight, offset
                )));
            }
            if entries.iter().any(|e| e.offset == offset) {
                return Err(LocatorError::InvalidConfig(format!(
                    "kernel offset {} appears more than once",
                    offset
                )));
            }
            entries.push(KernelEntry { offset, weight });
        }
        Ok(Kernel { entries })
    }

    /// Single-instant kernel: only `t` itself contributes.
    pub fn instant() -> Self {
        Kernel {
            entries: vec![KernelEntry {
                offset: 0,
                weight: 1.0,
            }],
        }
    }

    pub fn entries(&self) -> &[KernelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Kernel {
    /// Two steps either side, weights halving away from the centre.
    fn default() -> Self {
        Kernel {
            entries: [(-2, 1.0), (-1, 2.0), (0, 4.0), (1, 2.0), (2, 1.0)]
                .iter()
                .map(|&(offset, weight)| KernelEntry { offset, weight })
                .collect(),
        }
    }
}

impl TryFrom<Vec<(Timestamp, f64)>> for Kernel {
    type Error = LocatorError;

    fn try_from(pairs: Vec<(Timestamp, f64)>) -> Result<Self> {
        Kernel::new(pairs)
    }
}

impl From<Kernel> for Vec<(Timestamp, f64)> {
    fn from(kernel: Kernel) -> Self {
        kernel.entries.iter().map(|e| (e.offset, e.weight)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kernel() {
        let kernel = Kernel::default();
        let pairs: Vec<(Timestamp, f64)> = kernel.into();
        assert_eq!(
            pairs,
            vec![(-2, 1.0), (-1, 2.0), (0, 4.0), (1, 2.0), (2, 1.0)]
        );
    }

    #[test]
    fn test_rejects_bad_kernels() {
        assert!(Kernel::new(vec![]).is_err());
        assert!(Kernel::new(vec![(0, 1.0), (0, 2.0)]).is_err());
        assert!(Kernel::new(vec![(0, 0.0)]).is_err());
        assert!(Kernel::new(vec![(0, f64::NAN)]).is_err());
        assert!(Kernel::new(vec![(-1, 1.0), (1, 1.0)]).is_ok());
    }

    #[test]
    fn test_deserialize_from_pairs() {
        let kernel: Kernel = serde_json::from_str("[[-1, 1.0], [0, 3.0]]").unwrap();
        assert_eq!(kernel.len(), 2);
        assert_eq!(kernel.entries()[1], KernelEntry { offset: 0, weight: 3.0 });

        let err = serde_json::from_str::<Kernel>("[[0, 1.0], [0, 1.0]]");
        assert!(err.is_err());
    }
}
