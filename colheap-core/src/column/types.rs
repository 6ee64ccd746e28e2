//! Column typing enums.

use crate::error::{HeapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel stored in integer and categorical cells for "no value".
pub const MISSING_INT: i32 = i32::MIN;

/// Storage data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataType {
    /// Unset; only blank scratch storage carries it.
    #[default]
    None = 0,
    /// 32-bit integers.
    Integer = 1,
    /// 64-bit floating point.
    Decimal = 2,
    /// Text, either categorical codes or raw strings (ID measure).
    Text = 3,
}

/// Statistical role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum MeasureType {
    /// Unset.
    #[default]
    None = 0,
    /// Unordered categories.
    Nominal = 1,
    /// Ordered categories.
    Ordinal = 2,
    /// Continuous numbers.
    Continuous = 3,
    /// Identifiers: every cell stands alone.
    Id = 4,
}

/// What produced a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ColumnType {
    /// Unset.
    #[default]
    None = 0,
    /// Entered or imported data.
    Data = 1,
    /// Computed from a formula.
    Computed = 2,
    /// Recoded from another column.
    Recoded = 3,
    /// Row filter; its own levels count every row.
    Filter = 4,
    /// Written by an analysis.
    Output = 5,
}

macro_rules! impl_code {
    ($ty:ident, $kind:literal, [$($variant:ident),+ $(,)?]) => {
        impl $ty {
            /// Decode a stored code.
            pub fn from_code(code: u8) -> Result<Self> {
                $(
                    if code == Self::$variant as u8 {
                        return Ok(Self::$variant);
                    }
                )+
                Err(HeapError::InvalidTypeCode { kind: $kind, code })
            }

            /// The code stored in the heap.
            #[must_use]
            pub const fn code(self) -> u8 {
                self as u8
            }
        }
    };
}

impl_code!(DataType, "data type", [None, Integer, Decimal, Text]);
impl_code!(MeasureType, "measure type", [None, Nominal, Ordinal, Continuous, Id]);
impl_code!(ColumnType, "column type", [None, Data, Computed, Recoded, Filter, Output]);

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Nominal => "nominal",
            Self::Ordinal => "ordinal",
            Self::Continuous => "continuous",
            Self::Id => "id",
        };
        f.write_str(name)
    }
}

/// Element type of a column's row array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowRepr {
    /// `i32` codes or integers, `MISSING_INT` for missing.
    Int,
    /// `f64`, NaN for missing.
    Float,
    /// String offsets, null for missing.
    Str,
}

impl RowRepr {
    pub(crate) fn of(data_type: DataType, measure_type: MeasureType) -> Self {
        match (data_type, measure_type) {
            (DataType::Decimal, _) => Self::Float,
            (DataType::Text, MeasureType::Id) => Self::Str,
            _ => Self::Int,
        }
    }

    pub(crate) const fn elem_size(self) -> usize {
        match self {
            Self::Int => 4,
            Self::Float | Self::Str => 8,
        }
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Int => "integer cells",
            Self::Float => "decimal cells",
            Self::Str => "string cells",
        }
    }
}

/// Whether a column with this type pair keeps a level array.
#[must_use]
pub fn has_levels(data_type: DataType, measure_type: MeasureType) -> bool {
    matches!(data_type, DataType::Integer | DataType::Text) && measure_type != MeasureType::Id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for dt in [DataType::None, DataType::Integer, DataType::Decimal, DataType::Text] {
            assert_eq!(DataType::from_code(dt.code()).unwrap(), dt);
        }
        assert_eq!(MeasureType::from_code(4).unwrap(), MeasureType::Id);
        assert_eq!(ColumnType::from_code(4).unwrap(), ColumnType::Filter);
        assert_eq!(DataType::from_code(9).unwrap_err().code(), "E105");
    }

    #[test]
    fn row_representation() {
        assert_eq!(RowRepr::of(DataType::Decimal, MeasureType::Continuous), RowRepr::Float);
        assert_eq!(RowRepr::of(DataType::Text, MeasureType::Id), RowRepr::Str);
        assert_eq!(RowRepr::of(DataType::Text, MeasureType::Nominal), RowRepr::Int);
        assert_eq!(RowRepr::of(DataType::Integer, MeasureType::Id), RowRepr::Int);
    }

    #[test]
    fn level_bearing_types() {
        assert!(has_levels(DataType::Integer, MeasureType::Continuous));
        assert!(has_levels(DataType::Text, MeasureType::Ordinal));
        assert!(!has_levels(DataType::Text, MeasureType::Id));
        assert!(!has_levels(DataType::Integer, MeasureType::Id));
        assert!(!has_levels(DataType::Decimal, MeasureType::Continuous));
        assert!(!has_levels(DataType::None, MeasureType::None));
    }
}
