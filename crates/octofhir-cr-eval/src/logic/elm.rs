//! Executable logic structures (HL7 ELM JSON subset)
//!
//! Only the elements the engine executes are modelled. Unknown keys such as
//! `localId`, `locator` or `annotation` are ignored on read; unknown
//! expression types fail deserialization.

use serde::{Deserialize, Serialize};

/// ELM document root: `{"library": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElmDocument {
    pub library: Library,
}

/// ELM Library
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub identifier: VersionedIdentifier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterDefs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_sets: Option<ValueSetDefs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<Statements>,
}

/// Versioned identifier for libraries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    #[serde(default)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterDefs {
    #[serde(rename = "def", default)]
    pub defs: Vec<ParameterDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueSetDefs {
    #[serde(rename = "def", default)]
    pub defs: Vec<ValueSetDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statements {
    #[serde(rename = "def", default)]
    pub defs: Vec<ExpressionDef>,
}

/// Parameter definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    pub name: String,
    /// Default value expression
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<Box<Expression>>,
}

/// Value set definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSetDef {
    pub name: String,
    /// Value set canonical url
    pub id: String,
}

/// Expression definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Box<Expression>>,
}

/// ELM expression node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    // === Literals ===
    Null(NullLiteral),
    Literal(Literal),
    List(ListExpression),
    Interval(IntervalExpression),

    // === References ===
    ExpressionRef(NamedRef),
    ParameterRef(NamedRef),
    ValueSetRef(NamedRef),
    AliasRef(NamedRef),
    Property(Property),

    // === Clinical ===
    Retrieve(Retrieve),
    Query(Query),
    InValueSet(InValueSetExpression),

    // === Lists ===
    Exists(UnaryExpression),
    SingletonFrom(UnaryExpression),
    Count(AggregateExpression),
    First(FirstLastExpression),
    Last(FirstLastExpression),

    // === Logical ===
    Not(UnaryExpression),
    And(NaryExpression),
    Or(NaryExpression),
    IsNull(UnaryExpression),

    // === Comparison ===
    Equal(BinaryExpression),
    NotEqual(BinaryExpression),
    Less(BinaryExpression),
    LessOrEqual(BinaryExpression),
    Greater(BinaryExpression),
    GreaterOrEqual(BinaryExpression),

    // === Arithmetic ===
    Add(BinaryExpression),
    Subtract(BinaryExpression),
    Multiply(BinaryExpression),
    Divide(BinaryExpression),

    // === Intervals ===
    Start(UnaryExpression),
    End(UnaryExpression),
    In(BinaryExpression),
}

impl Expression {
    /// ELM type name of the node
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null(_) => "Null",
            Self::Literal(_) => "Literal",
            Self::List(_) => "List",
            Self::Interval(_) => "Interval",
            Self::ExpressionRef(_) => "ExpressionRef",
            Self::ParameterRef(_) => "ParameterRef",
            Self::ValueSetRef(_) => "ValueSetRef",
            Self::AliasRef(_) => "AliasRef",
            Self::Property(_) => "Property",
            Self::Retrieve(_) => "Retrieve",
            Self::Query(_) => "Query",
            Self::InValueSet(_) => "InValueSet",
            Self::Exists(_) => "Exists",
            Self::SingletonFrom(_) => "SingletonFrom",
            Self::Count(_) => "Count",
            Self::First(_) => "First",
            Self::Last(_) => "Last",
            Self::Not(_) => "Not",
            Self::And(_) => "And",
            Self::Or(_) => "Or",
            Self::IsNull(_) => "IsNull",
            Self::Equal(_) => "Equal",
            Self::NotEqual(_) => "NotEqual",
            Self::Less(_) => "Less",
            Self::LessOrEqual(_) => "LessOrEqual",
            Self::Greater(_) => "Greater",
            Self::GreaterOrEqual(_) => "GreaterOrEqual",
            Self::Add(_) => "Add",
            Self::Subtract(_) => "Subtract",
            Self::Multiply(_) => "Multiply",
            Self::Divide(_) => "Divide",
            Self::Start(_) => "Start",
            Self::End(_) => "End",
            Self::In(_) => "In",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NullLiteral {}

/// Literal value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    /// Qualified type, e.g. `{urn:hl7-org:elm-types:r1}Integer`
    pub value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Literal {
    /// Unqualified type name
    pub fn type_name(&self) -> &str {
        self.value_type
            .rsplit_once('}')
            .map_or(self.value_type.as_str(), |(_, name)| name)
    }
}

/// Reference by name to a definition, parameter, value set or alias
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListExpression {
    #[serde(rename = "element", default)]
    pub elements: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalExpression {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Box<Expression>>,
    #[serde(default = "closed")]
    pub low_closed: bool,
    #[serde(default = "closed")]
    pub high_closed: bool,
}

fn closed() -> bool {
    true
}

/// Property access on a source expression or a query alias
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Clinical data retrieve
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieve {
    /// Qualified type, e.g. `{http://hl7.org/fhir}Condition`
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Box<Expression>>,
}

impl Retrieve {
    /// Unqualified resource type
    pub fn resource_type(&self) -> &str {
        self.data_type
            .rsplit_once('}')
            .map_or(self.data_type.as_str(), |(_, name)| name)
    }
}

/// Single-source query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub source: Vec<AliasedQuerySource>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Box<Expression>>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_clause: Option<ReturnClause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasedQuerySource {
    pub expression: Box<Expression>,
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnClause {
    pub expression: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InValueSetExpression {
    pub code: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valueset: Option<NamedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub operand: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaryExpression {
    pub operand: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateExpression {
    pub source: Box<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstLastExpression {
    pub source: Box<Expression>,
}
