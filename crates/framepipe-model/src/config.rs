//! Stage configuration: invariant flags and scope.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::error::{PipelineError, Result};

/// Invariants a stage promises to keep, plus the batch positions it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    /// Column-name set of every table must be unchanged.
    pub is_fixed_columns: bool,
    /// Row-key set of every table must be unchanged.
    pub is_fixed_rows: bool,
    /// Limit processing to these positions; `None` means all tables.
    pub scope: Option<Scope>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            is_fixed_columns: true,
            is_fixed_rows: true,
            scope: None,
        }
    }
}

impl StageConfig {
    /// Both invariants enforced.
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Neither invariant enforced.
    pub fn unfixed() -> Self {
        Self {
            is_fixed_columns: false,
            is_fixed_rows: false,
            scope: None,
        }
    }

    #[must_use]
    pub fn with_fixed_columns(mut self, fixed: bool) -> Self {
        self.is_fixed_columns = fixed;
        self
    }

    #[must_use]
    pub fn with_fixed_rows(mut self, fixed: bool) -> Self {
        self.is_fixed_rows = fixed;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Positions to process for a batch of `len` tables, ascending.
    ///
    /// # Errors
    ///
    /// Fails when the scope names a position beyond the batch.
    pub fn resolve_scope(&self, len: usize) -> Result<Vec<usize>> {
        match &self.scope {
            None => Ok((0..len).collect()),
            Some(scope) => {
                if let Some(&index) = scope.positions.iter().find(|&&i| i >= len) {
                    return Err(PipelineError::TableOutOfRange { index, len });
                }
                Ok(scope.positions.iter().copied().collect())
            }
        }
    }
}

/// A set of batch positions a stage is limited to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    positions: BTreeSet<usize>,
}

impl Scope {
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }

    pub fn contains(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    /// Builds a scope from a dynamic value: an integer or a list of integers.
    ///
    /// # Errors
    ///
    /// Any other shape is an `InvalidArgument`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = || PipelineError::invalid_argument("indices must be int or list of ints");
        match value {
            Value::Number(n) => {
                let position = n.as_u64().ok_or_else(invalid)?;
                Ok(Self::from(position as usize))
            }
            Value::Array(items) => {
                let positions = items
                    .iter()
                    .map(|item| item.as_u64().map(|n| n as usize).ok_or_else(invalid))
                    .collect::<Result<BTreeSet<_>>>()?;
                Ok(Self { positions })
            }
            _ => Err(invalid()),
        }
    }
}

impl From<usize> for Scope {
    fn from(position: usize) -> Self {
        Self {
            positions: BTreeSet::from([position]),
        }
    }
}

impl From<Vec<usize>> for Scope {
    fn from(positions: Vec<usize>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }
}

impl From<&[usize]> for Scope {
    fn from(positions: &[usize]) -> Self {
        Self {
            positions: positions.iter().copied().collect(),
        }
    }
}

impl<const N: usize> From<[usize; N]> for Scope {
    fn from(positions: [usize; N]) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_is_fixed() {
        let config = StageConfig::default();
        assert!(config.is_fixed_columns);
        assert!(config.is_fixed_rows);
        assert_eq!(config.resolve_scope(3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn scope_resolves_sorted_unique_positions() {
        let config = StageConfig::default().with_scope(Scope::from(vec![2, 0, 2]));
        assert_eq!(config.resolve_scope(3).unwrap(), vec![0, 2]);
    }

    #[test]
    fn scope_beyond_batch_is_rejected() {
        let config = StageConfig::default().with_scope(Scope::from(4));
        assert!(matches!(
            config.resolve_scope(2),
            Err(PipelineError::TableOutOfRange { index: 4, len: 2 })
        ));
    }

    #[test]
    fn scope_from_value_accepts_int_and_list() {
        assert_eq!(Scope::from_value(&json!(1)).unwrap(), Scope::from(1));
        assert_eq!(Scope::from_value(&json!([0, 2])).unwrap(), Scope::from([0, 2]));
    }

    #[test]
    fn scope_from_value_rejects_other_shapes() {
        for value in [json!("0"), json!(1.5), json!(-1), json!({"i": 0}), json!([0, "1"])] {
            assert!(matches!(
                Scope::from_value(&value),
                Err(PipelineError::InvalidArgument(_))
            ));
        }
    }
}
