//! Runtime values produced by logic evaluation

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Runtime value of a logic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value (missing/unknown)
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Arbitrary precision decimal
    Decimal(Decimal),
    /// String value
    String(String),
    /// Calendar date
    Date(NaiveDate),
    /// Date and time (timezone normalised away)
    DateTime(NaiveDateTime),
    /// Code from a code system
    Code(Code),
    /// Interval between two points
    Interval(Interval),
    /// Ordered list of values
    List(Vec<Value>),
    /// Tuple with named elements
    Tuple(IndexMap<String, Value>),
    /// Clinical resource (FHIR JSON)
    Resource(JsonValue),
}

/// Code value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Code {
    pub code: String,
    pub system: Option<String>,
    pub version: Option<String>,
    pub display: Option<String>,
}

impl Code {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: Some(system.into()),
            version: None,
            display: None,
        }
    }

    /// Whether two codes denote the same concept (system and code match)
    pub fn matches(&self, other: &Code) -> bool {
        self.code == other.code && self.system == other.system
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system {
            Some(system) => write!(f, "{}|{}", system, self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

/// Interval value
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub low: Option<Box<Value>>,
    pub low_closed: bool,
    pub high: Option<Box<Value>>,
    pub high_closed: bool,
}

impl Interval {
    /// Closed interval `[low, high]`
    pub fn closed(low: Value, high: Value) -> Self {
        Self {
            low: Some(Box::new(low)),
            low_closed: true,
            high: Some(Box::new(high)),
            high_closed: true,
        }
    }

    /// Point membership. `None` when the point is not comparable with the bounds.
    pub fn contains(&self, point: &Value) -> Option<bool> {
        if point.is_null() {
            return None;
        }
        if let Some(low) = &self.low {
            match point.compare(low)? {
                Ordering::Less => return Some(false),
                Ordering::Equal if !self.low_closed => return Some(false),
                _ => {}
            }
        }
        if let Some(high) = &self.high {
            match point.compare(high)? {
                Ordering::Greater => return Some(false),
                Ordering::Equal if !self.high_closed => return Some(false),
                _ => {}
            }
        }
        Some(true)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let low = self.low.as_deref().unwrap_or(&Value::Null);
        let high = self.high.as_deref().unwrap_or(&Value::Null);
        write!(
            f,
            "Interval{}{}, {}{}",
            if self.low_closed { '[' } else { '(' },
            low,
            high,
            if self.high_closed { ']' } else { ')' }
        )
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value signals population membership: `true`, a non-empty
    /// list, or a resource.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::List(items) => !items.is_empty(),
            Self::Resource(_) => true,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Structural type name of the value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Date(_) => "Date",
            Self::DateTime(_) => "DateTime",
            Self::Code(_) => "Code",
            Self::Interval(_) => "Interval",
            Self::List(_) => "List",
            Self::Tuple(_) => "Tuple",
            Self::Resource(_) => "Resource",
        }
    }

    /// `resourceType` of a resource value
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Self::Resource(json) => json.get("resourceType").and_then(JsonValue::as_str),
            _ => None,
        }
    }

    /// Logical id of a resource value
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            Self::Resource(json) => json.get("id").and_then(JsonValue::as_str),
            _ => None,
        }
    }

    /// Convert a JSON element into a runtime value.
    ///
    /// Objects carrying `resourceType` become resources, Coding-shaped objects
    /// become codes, all other objects become tuples.
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .map(Self::Decimal)
                    .unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => {
                if map.contains_key("resourceType") {
                    return Self::Resource(json.clone());
                }
                if let Some(code) = coding_from_json(json) {
                    return Self::Code(code);
                }
                Self::Tuple(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Self::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Navigate a single path segment.
    ///
    /// Returns `Null` when the element is absent.
    pub fn property(&self, path: &str) -> Value {
        match self {
            Self::Resource(json) => json.get(path).map(Self::from_json).unwrap_or(Self::Null),
            Self::Tuple(elements) => elements.get(path).cloned().unwrap_or(Self::Null),
            Self::Code(code) => match path {
                "code" => Self::String(code.code.clone()),
                "system" => code.system.clone().map(Self::String).unwrap_or(Self::Null),
                "display" => code.display.clone().map(Self::String).unwrap_or(Self::Null),
                "version" => code.version.clone().map(Self::String).unwrap_or(Self::Null),
                _ => Self::Null,
            },
            Self::List(items) => {
                let values: Vec<Value> = items
                    .iter()
                    .map(|item| item.property(path))
                    .flat_map(|v| match v {
                        Self::List(inner) => inner,
                        Self::Null => Vec::new(),
                        other => vec![other],
                    })
                    .collect();
                Self::List(values)
            }
            _ => Self::Null,
        }
    }

    /// Collect every code reachable from this value (Code, Coding lists,
    /// CodeableConcept tuples).
    pub fn codes(&self) -> Vec<Code> {
        match self {
            Self::Code(code) => vec![code.clone()],
            Self::List(items) => items.iter().flat_map(Self::codes).collect(),
            Self::Tuple(elements) => elements
                .get("coding")
                .map(Self::codes)
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Interpret the value as a point in time.
    pub fn as_date_time(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            Self::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            Self::String(s) => parse_date_time(s),
            // Period-shaped elements compare on their start
            Self::Tuple(elements) => elements.get("start").and_then(Self::as_date_time),
            _ => None,
        }
    }

    /// Ordering between comparable values; `None` when either side is null
    /// or the types are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Self::Decimal(a), Self::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => {
                match (parse_date_time(a), parse_date_time(b)) {
                    (Some(x), Some(y)) => Some(x.cmp(&y)),
                    _ => Some(a.cmp(b)),
                }
            }
            (Self::Null, _) | (_, Self::Null) => None,
            (a, b) => {
                let (x, y) = (a.as_date_time()?, b.as_date_time()?);
                Some(x.cmp(&y))
            }
        }
    }

    /// Equality with null propagation
    pub fn equals(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Code(a), Self::Code(b)) => Some(a.matches(b)),
            (Self::List(a), Self::List(b)) => {
                if a.len() != b.len() {
                    return Some(false);
                }
                let mut all = Some(true);
                for (x, y) in a.iter().zip(b) {
                    match x.equals(y) {
                        Some(false) => return Some(false),
                        None => all = None,
                        Some(true) => {}
                    }
                }
                all
            }
            (Self::Resource(a), Self::Resource(b)) => Some(a == b),
            (Self::Tuple(a), Self::Tuple(b)) => Some(a == b),
            (a, b) => match a.compare(b) {
                Some(ordering) => Some(ordering == Ordering::Equal),
                None => Some(a == b),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::String(s) => write!(f, "{}", s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
            Self::Code(c) => write!(f, "{}", c),
            Self::Interval(i) => write!(f, "{}", i),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Tuple(elements) => {
                write!(f, "Tuple {{ ")?;
                for (i, (name, value)) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, " }}")
            }
            Self::Resource(json) => write!(f, "{}", json),
        }
    }
}

fn coding_from_json(json: &JsonValue) -> Option<Code> {
    let map = json.as_object()?;
    let code = map.get("code")?.as_str()?;
    let coding_keys = ["code", "system", "version", "display", "userSelected"];
    if !map.keys().all(|k| coding_keys.contains(&k.as_str())) {
        return None;
    }
    let text = |key: &str| map.get(key).and_then(JsonValue::as_str).map(str::to_string);
    Some(Code {
        code: code.to_string(),
        system: text("system"),
        version: text("version"),
        display: text("display"),
    })
}

/// Parse a FHIR `date`, `dateTime` or `instant` string.
///
/// Partial dates resolve to their earliest instant; offsets are dropped after
/// conversion to UTC.
pub fn parse_date_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    if s.len() == 7 {
        if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    if s.len() == 4 {
        let year: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(year, 1, 1).map(|d| d.and_time(NaiveTime::MIN));
    }
    None
}
