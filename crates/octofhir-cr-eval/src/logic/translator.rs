//! Translation of ELM JSON into an executable library
//!
//! Translation parses the document and resolves every name it references, so
//! evaluation never meets a dangling reference or a reference cycle.

use super::elm::{ElmDocument, Expression, Literal};
use indexmap::{IndexMap, IndexSet};
use octofhir_cr_model::{LibraryIdentifier, Value, parse_date_time};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Translation failure
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TranslationError {
    pub message: String,
}

impl TranslationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Named expression definition ready for execution
#[derive(Debug, Clone)]
pub struct CompiledDefinition {
    pub name: String,
    /// Evaluation context (`Patient`, `Unfiltered`, ...)
    pub context: Option<String>,
    pub expression: Expression,
}

/// Executable form of a logic library.
///
/// Immutable once created; shared behind `Arc` by the library cache.
#[derive(Debug, Clone)]
pub struct CompiledLibrary {
    identifier: LibraryIdentifier,
    parameters: IndexMap<String, Option<Expression>>,
    value_sets: IndexMap<String, String>,
    definitions: IndexMap<String, CompiledDefinition>,
}

impl CompiledLibrary {
    pub fn identifier(&self) -> &LibraryIdentifier {
        &self.identifier
    }

    /// Definitions in declaration order
    pub fn definitions(&self) -> impl Iterator<Item = &CompiledDefinition> {
        self.definitions.values()
    }

    pub fn definition(&self, name: &str) -> Option<&CompiledDefinition> {
        self.definitions.get(name)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Default expression of a declared parameter
    pub fn parameter_default(&self, name: &str) -> Option<&Expression> {
        self.parameters.get(name).and_then(Option::as_ref)
    }

    /// Canonical url of a declared value set
    pub fn value_set_url(&self, name: &str) -> Option<&str> {
        self.value_sets.get(name).map(String::as_str)
    }
}

/// Translate ELM JSON source into a [`CompiledLibrary`]
pub fn translate(source: &str) -> Result<CompiledLibrary, TranslationError> {
    let document: ElmDocument = serde_json::from_str(source)
        .map_err(|e| TranslationError::new(format!("Invalid ELM document: {}", e)))?;
    let library = document.library;

    if library.identifier.id.trim().is_empty() {
        return Err(TranslationError::new("Library identifier is missing a name"));
    }
    let identifier = LibraryIdentifier::new(library.identifier.id, library.identifier.version);

    let mut parameters = IndexMap::new();
    for def in library.parameters.unwrap_or_default().defs {
        if parameters
            .insert(def.name.clone(), def.default_expr.map(|e| *e))
            .is_some()
        {
            return Err(TranslationError::new(format!(
                "Duplicate parameter definition: {}",
                def.name
            )));
        }
    }

    let mut value_sets = IndexMap::new();
    for def in library.value_sets.unwrap_or_default().defs {
        if value_sets.insert(def.name.clone(), def.id).is_some() {
            return Err(TranslationError::new(format!(
                "Duplicate value set definition: {}",
                def.name
            )));
        }
    }

    let mut definitions = IndexMap::new();
    for def in library.statements.unwrap_or_default().defs {
        let compiled = CompiledDefinition {
            name: def.name.clone(),
            context: def.context,
            expression: def
                .expression
                .map_or(Expression::Null(Default::default()), |e| *e),
        };
        if definitions.insert(def.name.clone(), compiled).is_some() {
            return Err(TranslationError::new(format!(
                "Duplicate expression definition: {}",
                def.name
            )));
        }
    }

    let names = Names {
        definitions: definitions.keys().map(String::as_str).collect(),
        parameters: parameters.keys().map(String::as_str).collect(),
        value_sets: value_sets.keys().map(String::as_str).collect(),
    };

    let mut dependencies: IndexMap<Node, Vec<Node>> = IndexMap::new();
    for def in definitions.values() {
        let mut scope = Scope::new(&names);
        scope
            .check(&def.expression)
            .map_err(|e| TranslationError::new(format!("{} (in '{}')", e.message, def.name)))?;
        dependencies.insert(Node::Definition(def.name.clone()), scope.references);
    }
    for (name, default) in &parameters {
        let mut scope = Scope::new(&names);
        if let Some(expr) = default {
            scope.check(expr).map_err(|e| {
                TranslationError::new(format!("{} (in parameter '{}')", e.message, name))
            })?;
        }
        dependencies.insert(Node::Parameter(name.clone()), scope.references);
    }
    check_cycles(&dependencies)?;

    log::debug!(
        "translated library {} ({} definitions)",
        identifier,
        definitions.len()
    );

    Ok(CompiledLibrary {
        identifier,
        parameters,
        value_sets,
        definitions,
    })
}

/// Runtime value of a literal
pub fn literal_value(literal: &Literal) -> Result<Value, String> {
    let Some(text) = literal.value.as_deref() else {
        return Ok(Value::Null);
    };
    let invalid = || format!("Invalid {} literal: {}", literal.type_name(), text);
    match literal.type_name() {
        "Boolean" => match text {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(invalid()),
        },
        "Integer" | "Long" => text.parse().map(Value::Integer).map_err(|_| invalid()),
        "Decimal" => Decimal::from_str(text)
            .map(Value::Decimal)
            .map_err(|_| invalid()),
        "String" => Ok(Value::String(text.to_string())),
        "Date" => chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| invalid()),
        "DateTime" => parse_date_time(text)
            .map(Value::DateTime)
            .ok_or_else(invalid),
        other => Err(format!("Unsupported literal type: {}", other)),
    }
}

/// Definition or parameter in the reference graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Definition(String),
    Parameter(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition(name) => write!(f, "'{}'", name),
            Self::Parameter(name) => write!(f, "parameter '{}'", name),
        }
    }
}

struct Names<'a> {
    definitions: IndexSet<&'a str>,
    parameters: IndexSet<&'a str>,
    value_sets: IndexSet<&'a str>,
}

/// Reference checker for one definition
struct Scope<'n, 'a> {
    names: &'n Names<'a>,
    aliases: Vec<String>,
    references: Vec<Node>,
}

impl<'n, 'a> Scope<'n, 'a> {
    fn new(names: &'n Names<'a>) -> Self {
        Self {
            names,
            aliases: Vec::new(),
            references: Vec::new(),
        }
    }

    fn check(&mut self, expr: &Expression) -> Result<(), TranslationError> {
        match expr {
            Expression::Null(_) => Ok(()),
            Expression::Literal(literal) => literal_value(literal).map(|_| ()).map_err(TranslationError::new),
            Expression::List(list) => list.elements.iter().try_for_each(|e| self.check(e)),
            Expression::Interval(interval) => {
                if let Some(low) = &interval.low {
                    self.check(low)?;
                }
                if let Some(high) = &interval.high {
                    self.check(high)?;
                }
                Ok(())
            }
            Expression::ExpressionRef(r) => {
                if r.library_name.is_some() {
                    return Err(TranslationError::new(format!(
                        "References into included libraries are not supported: {}",
                        r.name
                    )));
                }
                if !self.names.definitions.contains(r.name.as_str()) {
                    return Err(TranslationError::new(format!(
                        "Could not resolve expression reference '{}'",
                        r.name
                    )));
                }
                self.references.push(Node::Definition(r.name.clone()));
                Ok(())
            }
            Expression::ParameterRef(r) => {
                if self.names.parameters.contains(r.name.as_str()) {
                    self.references.push(Node::Parameter(r.name.clone()));
                    Ok(())
                } else {
                    Err(TranslationError::new(format!(
                        "Could not resolve parameter reference '{}'",
                        r.name
                    )))
                }
            }
            Expression::ValueSetRef(r) => self.check_value_set(&r.name),
            Expression::AliasRef(r) => self.check_alias(&r.name),
            Expression::Property(property) => {
                if let Some(scope) = &property.scope {
                    self.check_alias(scope)?;
                }
                match &property.source {
                    Some(source) => self.check(source),
                    None if property.scope.is_none() => Err(TranslationError::new(format!(
                        "Property '{}' has neither a source nor a scope",
                        property.path
                    ))),
                    None => Ok(()),
                }
            }
            Expression::Retrieve(retrieve) => match retrieve.codes.as_deref() {
                None => Ok(()),
                Some(Expression::ValueSetRef(r)) => self.check_value_set(&r.name),
                Some(other) => Err(TranslationError::new(format!(
                    "Retrieve codes must be a value set reference, found {}",
                    other.kind()
                ))),
            },
            Expression::Query(query) => {
                let [source] = query.source.as_slice() else {
                    return Err(TranslationError::new(
                        "Only single-source queries are supported",
                    ));
                };
                self.check(&source.expression)?;
                self.aliases.push(source.alias.clone());
                if let Some(where_clause) = &query.where_clause {
                    self.check(where_clause)?;
                }
                if let Some(return_clause) = &query.return_clause {
                    self.check(&return_clause.expression)?;
                }
                self.aliases.pop();
                Ok(())
            }
            Expression::InValueSet(in_value_set) => {
                self.check(&in_value_set.code)?;
                match &in_value_set.valueset {
                    Some(r) => self.check_value_set(&r.name),
                    None => Err(TranslationError::new("InValueSet requires a value set")),
                }
            }
            Expression::Exists(u)
            | Expression::SingletonFrom(u)
            | Expression::Not(u)
            | Expression::IsNull(u)
            | Expression::Start(u)
            | Expression::End(u) => self.check(&u.operand),
            Expression::Count(a) => self.check(&a.source),
            Expression::First(f) | Expression::Last(f) => self.check(&f.source),
            Expression::And(n) | Expression::Or(n) => {
                if n.operand.is_empty() {
                    return Err(TranslationError::new(format!(
                        "{} requires at least one operand",
                        expr.kind()
                    )));
                }
                n.operand.iter().try_for_each(|e| self.check(e))
            }
            Expression::Equal(b)
            | Expression::NotEqual(b)
            | Expression::Less(b)
            | Expression::LessOrEqual(b)
            | Expression::Greater(b)
            | Expression::GreaterOrEqual(b)
            | Expression::Add(b)
            | Expression::Subtract(b)
            | Expression::Multiply(b)
            | Expression::Divide(b)
            | Expression::In(b) => {
                if b.operand.len() != 2 {
                    return Err(TranslationError::new(format!(
                        "{} requires exactly two operands, found {}",
                        expr.kind(),
                        b.operand.len()
                    )));
                }
                b.operand.iter().try_for_each(|e| self.check(e))
            }
        }
    }

    fn check_value_set(&self, name: &str) -> Result<(), TranslationError> {
        if self.names.value_sets.contains(name) {
            Ok(())
        } else {
            Err(TranslationError::new(format!(
                "Could not resolve value set reference '{}'",
                name
            )))
        }
    }

    fn check_alias(&self, name: &str) -> Result<(), TranslationError> {
        if self.aliases.iter().any(|a| a == name) {
            Ok(())
        } else {
            Err(TranslationError::new(format!(
                "Could not resolve alias '{}'",
                name
            )))
        }
    }
}

fn check_cycles(dependencies: &IndexMap<Node, Vec<Node>>) -> Result<(), TranslationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        node: &'a Node,
        dependencies: &'a IndexMap<Node, Vec<Node>>,
        marks: &mut IndexMap<&'a Node, Mark>,
    ) -> Result<(), TranslationError> {
        match marks.get(node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                return Err(TranslationError::new(format!(
                    "Circular expression reference involving {}",
                    node
                )));
            }
            None => {}
        }
        marks.insert(node, Mark::Visiting);
        for dependency in dependencies.get(node).into_iter().flatten() {
            visit(dependency, dependencies, marks)?;
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    let mut marks = IndexMap::new();
    for node in dependencies.keys() {
        visit(node, dependencies, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library(statements: serde_json::Value) -> String {
        json!({
            "library": {
                "identifier": {"id": "Test", "version": "1.0.0"},
                "parameters": {"def": [{"name": "Measurement Period"}]},
                "valueSets": {"def": [{"name": "Diabetes", "id": "http://example.org/ValueSet/diabetes"}]},
                "statements": {"def": statements}
            }
        })
        .to_string()
    }

    #[test]
    fn test_translate_resolves_references() {
        let source = library(json!([
            {"name": "One", "context": "Patient", "expression": {"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}Integer", "value": "1"}},
            {"name": "Ref", "context": "Patient", "expression": {"type": "ExpressionRef", "name": "One"}},
            {"name": "Period", "context": "Patient", "expression": {"type": "ParameterRef", "name": "Measurement Period"}}
        ]));

        let compiled = translate(&source).unwrap();
        assert_eq!(compiled.identifier().to_string(), "Test|1.0.0");
        let names: Vec<_> = compiled.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Ref", "Period"]);
        assert!(compiled.has_parameter("Measurement Period"));
        assert_eq!(
            compiled.value_set_url("Diabetes"),
            Some("http://example.org/ValueSet/diabetes")
        );
    }

    #[test]
    fn test_translate_rejects_dangling_reference() {
        let source = library(json!([
            {"name": "Ref", "expression": {"type": "ExpressionRef", "name": "Missing"}}
        ]));
        let err = translate(&source).unwrap_err();
        assert!(err.message.contains("Missing"));
    }

    #[test]
    fn test_translate_rejects_cycles() {
        let source = library(json!([
            {"name": "A", "expression": {"type": "ExpressionRef", "name": "B"}},
            {"name": "B", "expression": {"type": "ExpressionRef", "name": "A"}}
        ]));
        let err = translate(&source).unwrap_err();
        assert!(err.message.contains("Circular"));
    }

    #[test]
    fn test_translate_rejects_parameter_default_cycle() {
        let through_definition = json!({
            "library": {
                "identifier": {"id": "Test"},
                "parameters": {"def": [{"name": "P", "default": {"type": "ExpressionRef", "name": "A"}}]},
                "statements": {"def": [
                    {"name": "A", "expression": {"type": "ParameterRef", "name": "P"}},
                    {"name": "B", "expression": {"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}Integer", "value": "1"}}
                ]}
            }
        });
        let err = translate(&through_definition.to_string()).unwrap_err();
        assert!(err.message.contains("Circular"));

        let self_reference = json!({
            "library": {
                "identifier": {"id": "Test"},
                "parameters": {"def": [{"name": "P", "default": {"type": "ParameterRef", "name": "P"}}]}
            }
        });
        let err = translate(&self_reference.to_string()).unwrap_err();
        assert!(err.message.contains("parameter 'P'"));
    }

    #[test]
    fn test_translate_accepts_parameter_and_definition_sharing_a_name() {
        let source = json!({
            "library": {
                "identifier": {"id": "Test"},
                "parameters": {"def": [{"name": "Threshold", "default": {"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}Integer", "value": "5"}}]},
                "statements": {"def": [
                    {"name": "Threshold", "expression": {"type": "ParameterRef", "name": "Threshold"}}
                ]}
            }
        });
        assert!(translate(&source.to_string()).is_ok());
    }

    #[test]
    fn test_translate_rejects_unknown_alias_and_bad_literal() {
        let alias = library(json!([
            {"name": "A", "expression": {"type": "AliasRef", "name": "X"}}
        ]));
        assert!(translate(&alias).is_err());

        let literal = library(json!([
            {"name": "A", "expression": {"type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}Integer", "value": "one"}}
        ]));
        assert!(translate(&literal).is_err());
    }

    #[test]
    fn test_translate_rejects_malformed_source() {
        assert!(translate("library Test version '1.0'").is_err());
        assert!(translate(r#"{"library": {"identifier": {"id": ""}}}"#).is_err());
    }

    #[test]
    fn test_translate_rejects_duplicate_definitions() {
        let source = library(json!([
            {"name": "A", "expression": {"type": "Null"}},
            {"name": "A", "expression": {"type": "Null"}}
        ]));
        let err = translate(&source).unwrap_err();
        assert!(err.message.contains("Duplicate"));
    }
}
