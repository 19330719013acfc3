//! Stock per-table and merged stages.

mod apply_column;
mod assign;
mod as_type;
mod category_codes;
mod combinations;
mod drop_columns;
mod drop_duplicates;
mod query;
mod rename;
mod select;

pub use apply_column::ApplyColumn;
pub use assign::Assign;
pub use as_type::AsType;
pub use category_codes::CategoryCodes;
pub use combinations::{CombType, Combinations};
pub use drop_columns::DropColumns;
pub use drop_duplicates::DropDuplicates;
pub use query::Query;
pub use rename::RenameColumns;
pub use select::Select;
