//! Tag enumerations shared by the source tree, the mirror and the C header.
//!
//! Every enumeration is declared exactly once, here. A mirror node stores
//! `kind.ordinal()` and `include/sql_mirror.h` lists the same values in the same
//! order, so no tag ever goes through a hand-maintained translation table.

use serde::{Deserialize, Serialize};

macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $c_name:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value, in ordinal order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Name of the enumeration in the C header.
            pub const C_NAME: &'static str = stringify!($name);

            pub const fn ordinal(self) -> u32 {
                self as u32
            }

            pub fn from_ordinal(value: u32) -> Option<Self> {
                Self::ALL.get(value as usize).copied()
            }

            /// Name of the matching constant in the C header.
            pub const fn c_name(self) -> &'static str {
                match self {
                    $($name::$variant => $c_name),+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = crate::Error;

            fn try_from(value: u32) -> crate::Result<Self> {
                Self::from_ordinal(value).ok_or(crate::Error::InvalidTag { kind: stringify!($name), value })
            }
        }
    };
}

tag_enum! {
    /// Expression variant
    pub enum ExprType {
        LiteralFloat => "kExprLiteralFloat",
        LiteralString => "kExprLiteralString",
        LiteralInt => "kExprLiteralInt",
        #[default]
        LiteralNull => "kExprLiteralNull",
        Star => "kExprStar",
        Parameter => "kExprParameter",
        ColumnRef => "kExprColumnRef",
        FunctionRef => "kExprFunctionRef",
        Operator => "kExprOperator",
        Select => "kExprSelect",
        Hint => "kExprHint",
        Array => "kExprArray",
        ArrayIndex => "kExprArrayIndex",
        DatetimeField => "kExprDatetimeField",
    }
}

tag_enum! {
    /// Field named by EXTRACT and datetime-field expressions
    pub enum DatetimeField {
        #[default]
        None => "kDatetimeNone",
        Second => "kDatetimeSecond",
        Minute => "kDatetimeMinute",
        Hour => "kDatetimeHour",
        Day => "kDatetimeDay",
        Month => "kDatetimeMonth",
        Year => "kDatetimeYear",
    }
}

tag_enum! {
    /// Operator carried by an operator expression
    pub enum OperatorType {
        #[default]
        None => "kOpNone",
        // ternary
        Between => "kOpBetween",
        // n-ary
        Case => "kOpCase",
        CaseListElement => "kOpCaseListElement",
        // binary
        Plus => "kOpPlus",
        Minus => "kOpMinus",
        Asterisk => "kOpAsterisk",
        Slash => "kOpSlash",
        Percentage => "kOpPercentage",
        Caret => "kOpCaret",
        Equals => "kOpEquals",
        NotEquals => "kOpNotEquals",
        Less => "kOpLess",
        LessEq => "kOpLessEq",
        Greater => "kOpGreater",
        GreaterEq => "kOpGreaterEq",
        Like => "kOpLike",
        NotLike => "kOpNotLike",
        ILike => "kOpILike",
        And => "kOpAnd",
        Or => "kOpOr",
        In => "kOpIn",
        Concat => "kOpConcat",
        // unary
        Not => "kOpNot",
        UnaryMinus => "kOpUnaryMinus",
        IsNull => "kOpIsNull",
        Exists => "kOpExists",
    }
}

tag_enum! {
    /// Statement kind. More kinds are declared than carry a payload; every kind
    /// except `Select` is mirrored through its base fields only.
    pub enum StatementType {
        #[default]
        Error => "kStmtError",
        Select => "kStmtSelect",
        Import => "kStmtImport",
        Insert => "kStmtInsert",
        Update => "kStmtUpdate",
        Delete => "kStmtDelete",
        Create => "kStmtCreate",
        Drop => "kStmtDrop",
        Prepare => "kStmtPrepare",
        Execute => "kStmtExecute",
        Export => "kStmtExport",
        Rename => "kStmtRename",
        Alter => "kStmtAlter",
        Show => "kStmtShow",
        Transaction => "kStmtTransaction",
    }
}

tag_enum! {
    /// JOIN type
    pub enum JoinType {
        #[default]
        Inner => "kJoinInner",
        Full => "kJoinFull",
        Left => "kJoinLeft",
        Right => "kJoinRight",
        Cross => "kJoinCross",
        Natural => "kJoinNatural",
    }
}

tag_enum! {
    /// Table reference variant
    pub enum TableRefType {
        #[default]
        Name => "kTableName",
        Select => "kTableSelect",
        Join => "kTableJoin",
        CrossProduct => "kTableCrossProduct",
    }
}

tag_enum! {
    /// ORDER BY direction
    pub enum OrderType {
        #[default]
        Asc => "kOrderAsc",
        Desc => "kOrderDesc",
    }
}

tag_enum! {
    /// SET operation type
    pub enum SetType {
        #[default]
        Union => "kSetUnion",
        Intersect => "kSetIntersect",
        Except => "kSetExcept",
    }
}

/// Visits the `(C enumeration name, C constant names in ordinal order)` of every
/// tag enumeration.
pub fn c_enumerations() -> Vec<(&'static str, Vec<&'static str>)> {
    fn names<T: Copy>(all: &[T], c_name: fn(T) -> &'static str) -> Vec<&'static str> {
        all.iter().map(|v| c_name(*v)).collect()
    }

    vec![
        (ExprType::C_NAME, names(ExprType::ALL, ExprType::c_name)),
        (DatetimeField::C_NAME, names(DatetimeField::ALL, DatetimeField::c_name)),
        (OperatorType::C_NAME, names(OperatorType::ALL, OperatorType::c_name)),
        (StatementType::C_NAME, names(StatementType::ALL, StatementType::c_name)),
        (JoinType::C_NAME, names(JoinType::ALL, JoinType::c_name)),
        (TableRefType::C_NAME, names(TableRefType::ALL, TableRefType::c_name)),
        (OrderType::C_NAME, names(OrderType::ALL, OrderType::c_name)),
        (SetType::C_NAME, names(SetType::ALL, SetType::c_name)),
    ]
}
