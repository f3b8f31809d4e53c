use std::fmt;

use serde::{Deserialize, Serialize};

/// How many rows a statement can produce when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowCount {
    Zero,
    One,
    ZeroOrOne,
    Many,
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowCount::Zero => write!(f, "zero"),
            RowCount::One => write!(f, "one"),
            RowCount::ZeroOrOne => write!(f, "zero-or-one"),
            RowCount::Many => write!(f, "many"),
        }
    }
}

/// A PostgreSQL type as seen by the driver probe: the type oid, the display
/// name reported by the driver and, for array types, the element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PgType {
    pub oid: u32,
    pub name: String,
    pub array_elem: Option<ArrayElemType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayElemType {
    pub oid: u32,
    pub nullable: bool,
}

impl PgType {
    pub fn scalar(oid: u32, name: impl Into<String>) -> Self {
        Self {
            oid,
            name: name.into(),
            array_elem: None,
        }
    }

    pub fn array(oid: u32, name: impl Into<String>, elem_oid: u32) -> Self {
        Self {
            oid,
            name: name.into(),
            // Element nullability starts pessimistic; the database cannot
            // constrain elements of an array column.
            array_elem: Some(ArrayElemType {
                oid: elem_oid,
                nullable: true,
            }),
        }
    }
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An output column of a described statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: PgType,
    pub nullable: bool,
}

/// An input parameter of a described statement. `params[0]` is `$1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub sql_type: PgType,
    pub nullable: bool,
}

/// The description of a prepared statement: what goes in, what comes out and
/// how many rows to expect. The driver probe produces a pessimistic instance
/// (everything nullable, row count `Many`); inference refines it in place of
/// the probed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementDescription {
    pub sql: String,
    pub columns: Vec<Column>,
    pub params: Vec<Param>,
    pub row_count: RowCount,
}

/// The analyzer's verdict on whether a value can be NULL. Arrays carry an
/// independent verdict for their elements, so the two cases stay separate
/// variants instead of an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNullability {
    Scalar { nullable: bool },
    Array { nullable: bool, elem_nullable: bool },
}

impl FieldNullability {
    pub const NULLABLE: Self = Self::Scalar { nullable: true };
    pub const NOT_NULL: Self = Self::Scalar { nullable: false };

    pub fn scalar(nullable: bool) -> Self {
        Self::Scalar { nullable }
    }

    /// The outer nullability, ignoring array elements.
    pub fn nullable(&self) -> bool {
        match self {
            Self::Scalar { nullable } | Self::Array { nullable, .. } => *nullable,
        }
    }

    /// Force the outer nullability to true. Element nullability is untouched.
    pub fn to_nullable(self) -> Self {
        match self {
            Self::Scalar { .. } => Self::Scalar { nullable: true },
            Self::Array { elem_nullable, .. } => Self::Array {
                nullable: true,
                elem_nullable,
            },
        }
    }

    /// Force the outer nullability to false. Element nullability is untouched.
    pub fn to_non_null(self) -> Self {
        match self {
            Self::Scalar { .. } => Self::Scalar { nullable: false },
            Self::Array { elem_nullable, .. } => Self::Array {
                nullable: false,
                elem_nullable,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FieldNullability;

    #[test]
    fn refining_an_array_keeps_element_nullability() {
        let array = FieldNullability::Array {
            nullable: true,
            elem_nullable: true,
        };
        assert_eq!(
            array.to_non_null(),
            FieldNullability::Array {
                nullable: false,
                elem_nullable: true,
            }
        );
        assert_eq!(array.to_non_null().to_nullable(), array);
    }

    #[test]
    fn outer_nullability_ignores_elements() {
        let array = FieldNullability::Array {
            nullable: false,
            elem_nullable: true,
        };
        assert!(!array.nullable());
        assert!(FieldNullability::NULLABLE.nullable());
    }
}
