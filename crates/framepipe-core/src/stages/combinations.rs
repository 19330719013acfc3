use std::str::FromStr;

use polars::prelude::{DataType, Expr, IntoLazy, col};

use framepipe_model::{PipelineError, Result, StageArgs, StageConfig, Table};

use crate::stage::{Stage, TableTransform};

/// How column pairs are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombType {
    /// `(a, b)` with `a` before `b`.
    Combinations,
    /// `(a, b)` with `a` not after `b`.
    #[default]
    CombinationsWithReplacement,
    /// Every ordered pair, including `(a, a)`.
    Product,
    /// Every ordered pair of distinct columns.
    Permutations,
}

impl CombType {
    fn pairs<'a>(self, cols: &'a [String]) -> Vec<(&'a str, &'a str)> {
        let mut pairs = Vec::new();
        for (i, a) in cols.iter().enumerate() {
            for (j, b) in cols.iter().enumerate() {
                let include = match self {
                    Self::Combinations => i < j,
                    Self::CombinationsWithReplacement => i <= j,
                    Self::Product => true,
                    Self::Permutations => i != j,
                };
                if include {
                    pairs.push((a.as_str(), b.as_str()));
                }
            }
        }
        pairs
    }
}

impl FromStr for CombType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "combinations" => Ok(Self::Combinations),
            "combinations_with_replacement" => Ok(Self::CombinationsWithReplacement),
            "product" => Ok(Self::Product),
            "permutations" => Ok(Self::Permutations),
            other => Err(PipelineError::invalid_argument(format!(
                "comb_type '{other}' should be one of combinations, \
                 combinations_with_replacement, product and permutations"
            ))),
        }
    }
}

/// Arithmetic features from pairs of columns, named `<op>_<a>_<b>`.
#[derive(Debug, Clone)]
pub struct Combinations {
    cols: Vec<String>,
    ops: Vec<char>,
    comb_type: CombType,
}

impl Combinations {
    pub const NAME: &'static str = "Combinations";

    /// # Errors
    ///
    /// Ops other than `+`, `-`, `*` and `/`.
    pub fn new<S: AsRef<str>>(cols: Vec<String>, ops: &[S], comb_type: CombType) -> Result<Self> {
        let ops = ops
            .iter()
            .map(|op| match op.as_ref() {
                "+" => Ok('+'),
                "-" => Ok('-'),
                "*" => Ok('*'),
                "/" => Ok('/'),
                other => Err(PipelineError::invalid_argument(format!(
                    "unsupported combination op '{other}'"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cols,
            ops,
            comb_type,
        })
    }

    pub fn from_args(args: &StageArgs) -> Result<Stage> {
        args.ensure_known(Self::NAME, &["cols", "ops", "comb_type"])?;
        let comb_type = match args.optional_str("comb_type")? {
            Some(name) => name.parse()?,
            None => CombType::default(),
        };
        let ops = args.required_str_list("ops")?;
        Ok(Self::new(args.required_str_list("cols")?, &ops, comb_type)?.into_stage())
    }

    pub fn into_stage(self) -> Stage {
        Stage::separated(Self::NAME, StageConfig::fixed().with_fixed_columns(false), self)
    }

    fn exprs(&self) -> Vec<Expr> {
        let mut exprs = Vec::new();
        for (a, b) in self.comb_type.pairs(&self.cols) {
            for &op in &self.ops {
                let (left, right) = (col(a), col(b));
                let expr = match op {
                    '+' => left + right,
                    '-' => left - right,
                    '*' => left * right,
                    _ => left.cast(DataType::Float64) / right.cast(DataType::Float64),
                };
                exprs.push(expr.alias(format!("{op}_{a}_{b}")));
            }
        }
        exprs
    }
}

impl TableTransform for Combinations {
    fn transform(&self, table: Table) -> Result<Table> {
        if let Some(missing) = self.cols.iter().find(|name| !table.has_column(name)) {
            return Err(PipelineError::column_not_found(missing.clone()));
        }
        let data = table
            .data()
            .clone()
            .lazy()
            .with_columns(self.exprs())
            .collect()?;
        table.with_data(data)
    }
}
