//! 条件谓词语言与评估器
//!
//! 条件是一个带 `type` 判别符的封闭和类型，评估器对其做穷尽匹配；
//! 无法识别的 `type`/`operator` 落入显式的 `Unknown` 分支并恒为 false
//! （失败关闭：无法识别的规则永不触发，而不是意外放行）。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Operator — 比较操作符
// ---------------------------------------------------------------------------

/// 条件操作符
///
/// 缺省为 `equals`。`Unknown` 承接所有无法识别的操作符字符串，
/// 评估时恒为 false。反序列化经由字符串转换而非直接派生，
/// 使未知操作符降级为 `Unknown` 而不是整条条件解析失败。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Operator {
    #[default]
    Equals,
    Gt,
    Gte,
    Lt,
    Lte,
    Unknown,
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "equals" => Self::Equals,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            _ => Self::Unknown,
        }
    }
}

impl Operator {
    /// 数值比较，未知操作符恒为 false
    pub fn compare(&self, actual: i64, expected: i64) -> bool {
        match self {
            Self::Equals => actual == expected,
            Self::Gt => actual > expected,
            Self::Gte => actual >= expected,
            Self::Lt => actual < expected,
            Self::Lte => actual <= expected,
            Self::Unknown => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// CountField — 计数条件字段
// ---------------------------------------------------------------------------

/// 计数条件支持的历史计数字段
///
/// 每个字段对应存储层的一条计数查询；未知字段失败关闭，
/// 不会触发任何查询。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum CountField {
    TripsCreated,
    BookingsMade,
    ReviewsPosted,
    CheckIns,
    Unknown,
}

impl From<String> for CountField {
    fn from(s: String) -> Self {
        match s.as_str() {
            "trips_created" => Self::TripsCreated,
            "bookings_made" => Self::BookingsMade,
            "reviews_posted" => Self::ReviewsPosted,
            "check_ins" => Self::CheckIns,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for CountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TripsCreated => "trips_created",
            Self::BookingsMade => "bookings_made",
            Self::ReviewsPosted => "reviews_posted",
            Self::CheckIns => "check_ins",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Condition — 条件和类型
// ---------------------------------------------------------------------------

/// 条件谓词
///
/// 以 `type` 为内部判别符的封闭和类型。任何解析不进已知变体的 JSON
/// （未知 type、缺失必填字段、非对象值）都落到 `Unknown`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// 恒为真
    Always,
    /// 按城市匹配：上下文 `city_name` 与条件 `city_name` 大小写不敏感相等。
    /// 仅支持 equals，其他操作符恒为 false。
    Location {
        city_name: String,
        #[serde(default)]
        operator: Operator,
    },
    /// 按商家类别匹配：上下文 `business_type`（其次 `category`）与条件
    /// `business_category` 大小写不敏感相等。仅支持 equals。
    Category {
        business_category: String,
        #[serde(default)]
        operator: Operator,
    },
    /// 历史计数条件。无法在纯函数评估器内同步求值，
    /// 必须由上层路由到计数聚合器（见 counts 模块）。
    Count {
        field: CountField,
        #[serde(default)]
        operator: Operator,
        value: i64,
    },
    /// 未知条件类型，评估恒为 false
    #[serde(other)]
    Unknown,
}

impl Condition {
    /// 从原始 JSON 解析条件，失败关闭
    ///
    /// 解析失败（未知 type、缺字段、类型不符）一律得到 `Unknown`，
    /// 由评估器判为不满足，绝不向上抛错中断兄弟规则的评估。
    pub fn parse(value: &Value) -> Condition {
        if !value.is_object() {
            return Condition::Unknown;
        }
        serde_json::from_value(value.clone()).unwrap_or(Condition::Unknown)
    }

    /// 任务步骤专用解析：空对象 `{}` 视为"恒满足"
    ///
    /// 任务步骤不带额外条件时仅凭触发事件匹配即可完成，
    /// 这与缺失 `type` 的非空对象（恒为 false）是两种不同的情况。
    pub fn for_quest_step(value: &Value) -> Condition {
        if let Some(obj) = value.as_object()
            && obj.is_empty()
        {
            return Condition::Always;
        }
        Self::parse(value)
    }

    /// 是否为计数条件（需要异步路由到计数聚合器）
    pub fn is_count(&self) -> bool {
        matches!(self, Self::Count { .. })
    }
}

// ---------------------------------------------------------------------------
// EventContext — 评估上下文
// ---------------------------------------------------------------------------

/// 评估上下文 — 事件携带的上下文元数据
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    data: Value,
}

impl EventContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// 按键取字符串字段
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// 事件发生的城市
    pub fn city_name(&self) -> Option<&str> {
        self.get_str("city_name")
    }

    /// 商家类别：优先 `business_type`，其次 `category`，取第一个非空值
    pub fn business_category(&self) -> Option<&str> {
        self.get_str("business_type")
            .or_else(|| self.get_str("category"))
    }

    /// 获取底层数据
    pub fn data(&self) -> &Value {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// ConditionEvaluator — 纯函数评估器
// ---------------------------------------------------------------------------

/// 条件评估器
///
/// 纯同步函数：(条件, 上下文) -> bool，不做任何 I/O。
/// `Count` 变体在此恒为 false —— 计数条件必须先经计数聚合器解析，
/// 这是对误用的防护而非正常路径。
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(condition: &Condition, ctx: &EventContext) -> bool {
        match condition {
            Condition::Always => true,
            Condition::Location {
                city_name,
                operator,
            } => {
                // location 仅支持 equals
                if *operator != Operator::Equals {
                    return false;
                }
                match ctx.city_name() {
                    Some(actual) => Self::eq_ignore_case(actual, city_name),
                    None => false,
                }
            }
            Condition::Category {
                business_category,
                operator,
            } => {
                if *operator != Operator::Equals {
                    return false;
                }
                match ctx.business_category() {
                    Some(actual) => Self::eq_ignore_case(actual, business_category),
                    None => false,
                }
            }
            // 计数条件无法同步求值，防止误用
            Condition::Count { .. } => false,
            Condition::Unknown => false,
        }
    }

    /// 大小写不敏感的字符串相等
    ///
    /// 城市名可能含非 ASCII 字符（如 "Brașov"），用 Unicode 小写化比较
    fn eq_ignore_case(a: &str, b: &str) -> bool {
        a.to_lowercase() == b.to_lowercase()
    }
}
