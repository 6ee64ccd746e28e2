//! The column write layer.
//!
//! A column is a fixed record in the heap plus a storage block describing
//! its current representation: the typed row array and, for categorical
//! columns, the level array.
//!
//! | data type | measure type    | rows              | levels |
//! |-----------|-----------------|-------------------|--------|
//! | integer   | any but id      | `i32` values      | yes    |
//! | integer   | id              | `i32` values      | no     |
//! | decimal   | continuous      | `f64`, NaN        | no     |
//! | text      | any but id      | `i32` level codes | yes    |
//! | text      | id              | string offsets    | no     |
//!
//! Missing cells are [`MISSING_INT`], NaN or the null offset.

mod convert;
mod level;
mod missing;
pub(crate) mod record;
mod types;
mod view;
mod writer;

pub use level::LevelData;
pub use missing::{LevelLiteral, MissingValueRule, Operand, Operator, should_treat_as_missing};
pub use types::{ColumnType, DataType, MISSING_INT, MeasureType, has_levels};
pub use view::Column;
pub use writer::ColumnW;
