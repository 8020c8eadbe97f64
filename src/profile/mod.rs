//! # 用户资料模块
//!
//! 身份提供商 user-info 端点返回的属性映射，以及获取它的 HTTP 客户端

mod client;
mod error;

pub use client::UserInfoClient;
pub use error::ProfileFetchError;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 单个属性值
///
/// 覆盖 JSON 可表达的全部取值，数字区分整数与浮点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// `null`
    Null,
    /// 布尔值
    Bool(bool),
    /// 整数
    Integer(i64),
    /// 超出 i64 范围的非负整数
    UInt(u64),
    /// 浮点数
    Float(f64),
    /// 字符串
    Text(String),
    /// 数组
    List(Vec<AttributeValue>),
    /// 嵌套对象
    Map(IndexMap<String, AttributeValue>),
}

impl AttributeValue {
    /// 字符串值
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            // `{:?}` 保留小数点，1.0 输出为 "1.0"
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Text(value) => f.write_str(value),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => write_entries(f, entries),
        }
    }
}

fn write_entries(f: &mut fmt::Formatter<'_>, entries: &IndexMap<String, AttributeValue>) -> fmt::Result {
    f.write_str("{")?;
    for (index, (key, value)) in entries.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}={value}")?;
    }
    f.write_str("}")
}

/// 身份提供商返回的用户资料
///
/// 每次请求重新获取并整体替换，不缓存、不做合并。属性按提供商返回的顺序保存，
/// 渲染格式为 `{key=value, ...}`，空资料渲染为 `{}`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile {
    attributes: IndexMap<String, AttributeValue>,
}

impl UserProfile {
    /// 空资料
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// 读取单个属性
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// 是否没有任何属性
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// 属性数量
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }
}

impl<K, V> FromIterator<(K, V)> for UserProfile
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_entries(f, &self.attributes)
    }
}
