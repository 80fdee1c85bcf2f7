//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CompileError;
use crate::schema::ParamType;

/// 条件操作符
///
/// 序列化形式与配置端一致（`>`, `>=`, `=` 等），同时兼容 `eq`/`gte` 这类别名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 数值比较
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,

    // 通用比较
    #[serde(rename = "=", alias = "eq", alias = "==")]
    Eq,
    #[serde(rename = "!=", alias = "neq")]
    Neq,

    // 包含检查
    #[serde(rename = "in")]
    In,
    #[serde(rename = "contains")]
    Contains,
}

impl Operator {
    /// 是否为大小比较操作符
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    /// 操作符是否适用于给定的参数类型
    ///
    /// - 大小比较仅限数值
    /// - contains 仅限字符串/枚举
    /// - 布尔只允许 = 和 !=
    pub fn supports(&self, param_type: ParamType) -> bool {
        match self {
            Self::Gt | Self::Gte | Self::Lt | Self::Lte => param_type.is_numeric(),
            Self::Contains => matches!(param_type, ParamType::String | ParamType::Enum),
            Self::In => param_type != ParamType::Boolean,
            Self::Eq | Self::Neq => true,
        }
    }
}

impl FromStr for Operator {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "gte" => Ok(Self::Gte),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "lte" => Ok(Self::Lte),
            "=" | "==" | "eq" => Ok(Self::Eq),
            "!=" | "neq" => Ok(Self::Neq),
            "in" => Ok(Self::In),
            "contains" => Ok(Self::Contains),
            other => Err(CompileError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::In => "in",
            Self::Contains => "contains",
        };
        write!(f, "{}", s)
    }
}
