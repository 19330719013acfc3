//! Group mapping built from a reference frame and broadcast onto other frames.

use std::collections::HashMap;

use polars::prelude::{Column, DataFrame, DataType, Expr, IntoLazy, PolarsResult, col};

use framepipe_common::{GroupKey, row_keys};
use framepipe_model::{PipelineError, Result};

/// Aggregated statistics per composite group key.
pub(crate) struct GroupMapping {
    keys: Vec<String>,
    lookup: HashMap<GroupKey, usize>,
    stats: DataFrame,
}

impl GroupMapping {
    /// Groups `reference` by `keys` (stable group order) and evaluates `aggs`.
    ///
    /// Groups whose key contains a null are left out of the lookup.
    pub(crate) fn build(reference: &DataFrame, keys: &[String], aggs: Vec<Expr>) -> Result<Self> {
        let by: Vec<Expr> = keys.iter().map(|name| col(name.as_str())).collect();
        let stats = reference
            .clone()
            .lazy()
            .group_by_stable(by)
            .agg(aggs)
            .collect()?;

        let key_columns = key_columns(&stats, keys)?;
        let lookup = index_groups(keys, row_keys(&key_columns, stats.height())?)?;

        Ok(Self {
            keys: keys.to_vec(),
            lookup,
            stats,
        })
    }

    /// Number of distinct, non-null groups.
    pub(crate) fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Mapping row matched by each row of `data`, in `data`'s row order.
    pub(crate) fn match_rows(&self, data: &DataFrame) -> Result<Vec<Option<usize>>> {
        let key_columns = key_columns(data, &self.keys)?;
        let matches = row_keys(&key_columns, data.height())?
            .into_iter()
            .map(|key| key.and_then(|key| self.lookup.get(&key).copied()))
            .collect();
        Ok(matches)
    }

    /// Values of an aggregate column as `f64`, indexed by mapping row.
    pub(crate) fn f64_values(&self, stat: &str) -> Result<Vec<Option<f64>>> {
        let column = self.stats.column(stat)?.cast(&DataType::Float64)?;
        Ok(column.f64()?.into_iter().collect())
    }

    /// Values of an aggregate column as `i64`, indexed by mapping row.
    pub(crate) fn i64_values(&self, stat: &str) -> Result<Vec<Option<i64>>> {
        let column = self.stats.column(stat)?.cast(&DataType::Int64)?;
        Ok(column.i64()?.into_iter().collect())
    }
}

/// Maps each normalized group key to its mapping row, skipping `None` keys.
///
/// Normalization can fold groups polars keeps apart (a float column holding
/// both `-0.0` and `0.0`, say) into one key, which would make the broadcast
/// ambiguous.
fn index_groups(keys: &[String], rows: Vec<Option<GroupKey>>) -> Result<HashMap<GroupKey, usize>> {
    let mut lookup = HashMap::with_capacity(rows.len());
    for (row, key) in rows.into_iter().enumerate() {
        let Some(key) = key else {
            continue;
        };
        if lookup.contains_key(&key) {
            return Err(PipelineError::JoinCardinality {
                keys: keys.join(", "),
                key: key.to_string(),
            });
        }
        lookup.insert(key, row);
    }
    Ok(lookup)
}

/// Broadcasts per-group values onto rows through their matches.
pub(crate) fn broadcast<T: Copy>(matches: &[Option<usize>], values: &[Option<T>]) -> Vec<Option<T>> {
    matches
        .iter()
        .map(|row| row.and_then(|row| values.get(row).copied().flatten()))
        .collect()
}

fn key_columns<'a>(data: &'a DataFrame, keys: &[String]) -> PolarsResult<Vec<&'a Column>> {
    keys.iter().map(|name| data.column(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use framepipe_common::KeyPart;
    use polars::df;

    fn key(parts: &[i128]) -> Option<GroupKey> {
        Some(GroupKey(parts.iter().copied().map(KeyPart::Int).collect()))
    }

    #[test]
    fn group_rows_are_indexed_by_key() {
        let keys = ["a".to_string(), "b".to_string()];
        let lookup = index_groups(&keys, vec![key(&[1, 2]), None, key(&[2, 2])]).unwrap();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup[&GroupKey(vec![KeyPart::Int(2), KeyPart::Int(2)])], 2);
    }

    #[test]
    fn repeated_group_key_is_a_cardinality_error() {
        let keys = ["a".to_string(), "b".to_string()];
        let err = index_groups(&keys, vec![key(&[1, 2]), key(&[3, 4]), key(&[1, 2])]).unwrap_err();
        match err {
            PipelineError::JoinCardinality { keys, key } => {
                assert_eq!(keys, "a, b");
                assert_eq!(key, "(1, 2)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn matches_rows_across_integer_widths() {
        let reference = df!("k" => [1i64, 1, 2], "y" => [1.0, 3.0, 5.0]).unwrap();
        let mapping = GroupMapping::build(
            &reference,
            &["k".to_string()],
            vec![col("y").mean().alias("m")],
        )
        .unwrap();

        let other = df!("k" => [2i32, 3, 1]).unwrap();
        let matches = mapping.match_rows(&other).unwrap();
        let means = broadcast(&matches, &mapping.f64_values("m").unwrap());
        assert_eq!(means, vec![Some(5.0), None, Some(2.0)]);
    }

    #[test]
    fn null_keys_are_not_mapped() {
        let reference = df!("k" => [Some("a"), None], "y" => [1.0, 2.0]).unwrap();
        let mapping = GroupMapping::build(
            &reference,
            &["k".to_string()],
            vec![col("y").sum().alias("s")],
        )
        .unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.match_rows(&reference).unwrap(), vec![Some(0), None]);
    }
}
