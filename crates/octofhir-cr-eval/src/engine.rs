//! Expression Evaluation Engine
//!
//! An [`ExpressionEngine`] evaluates the definitions of one compiled library
//! for one context. Definition results are memoised for the lifetime of the
//! engine, failures included, so a reference to a failed definition fails
//! with the same error.

use crate::context::{EvaluationContext, ParameterSet};
use crate::error::{EvalError, EvalResult};
use crate::logic::elm::{Expression, Query};
use crate::logic::{CompiledLibrary, literal_value};
use crate::operators::arithmetic::{ArithmeticOp, arithmetic};
use crate::operators::comparison::{ComparisonOp, compare, equal, not_equal};
use crate::operators::{interval, list, logical};
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use octofhir_cr_model::{DataSource, RetrieveRequest, TerminologyProvider, Value};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Values bound to query aliases
type Aliases = IndexMap<String, Value>;

/// Evaluates expressions of a library against a context
pub struct ExpressionEngine<'a> {
    library: &'a CompiledLibrary,
    context: &'a EvaluationContext,
    parameters: &'a ParameterSet,
    data: &'a dyn DataSource,
    terminology: &'a dyn TerminologyProvider,
    definitions: Mutex<HashMap<String, EvalResult<Value>>>,
    defaults: Mutex<HashMap<String, EvalResult<Value>>>,
}

impl<'a> ExpressionEngine<'a> {
    pub fn new(
        library: &'a CompiledLibrary,
        context: &'a EvaluationContext,
        parameters: &'a ParameterSet,
        data: &'a dyn DataSource,
        terminology: &'a dyn TerminologyProvider,
    ) -> Self {
        Self {
            library,
            context,
            parameters,
            data,
            terminology,
            definitions: Mutex::new(HashMap::new()),
            defaults: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate a named definition, reusing an earlier result
    pub async fn evaluate_definition(&self, name: &str) -> EvalResult<Value> {
        let cached = self.definitions.lock().get(name).cloned();
        if let Some(result) = cached {
            return result;
        }

        let definition = self
            .library
            .definition(name)
            .ok_or_else(|| EvalError::UndefinedExpression {
                name: name.to_string(),
            })?;
        let result = self.evaluate(&definition.expression, &Aliases::new()).await;
        self.definitions
            .lock()
            .insert(name.to_string(), result.clone());
        result
    }

    /// Value of a parameter: supplied value, else the library default, else null
    async fn parameter(&self, name: &str) -> EvalResult<Value> {
        if let Some(value) = self.parameters.get(name) {
            return Ok(value.clone());
        }
        let Some(default) = self.library.parameter_default(name) else {
            return Ok(Value::Null);
        };

        let cached = self.defaults.lock().get(name).cloned();
        if let Some(result) = cached {
            return result;
        }
        let result = self.evaluate(default, &Aliases::new()).await;
        self.defaults.lock().insert(name.to_string(), result.clone());
        result
    }

    /// Evaluate an expression
    pub fn evaluate<'s>(
        &'s self,
        expr: &'s Expression,
        aliases: &'s Aliases,
    ) -> BoxFuture<'s, EvalResult<Value>> {
        async move {
            match expr {
                // === Literals ===
                Expression::Null(_) => Ok(Value::Null),
                Expression::Literal(literal) => literal_value(literal).map_err(EvalError::internal),
                Expression::List(list) => {
                    let mut items = Vec::with_capacity(list.elements.len());
                    for element in &list.elements {
                        items.push(self.evaluate(element, aliases).await?);
                    }
                    Ok(Value::List(items))
                }
                Expression::Interval(i) => {
                    let low = match &i.low {
                        Some(low) => self.evaluate(low, aliases).await?,
                        None => Value::Null,
                    };
                    let high = match &i.high {
                        Some(high) => self.evaluate(high, aliases).await?,
                        None => Value::Null,
                    };
                    Ok(interval::interval(low, i.low_closed, high, i.high_closed))
                }

                // === References ===
                Expression::ExpressionRef(r) => self.evaluate_definition(&r.name).await,
                Expression::ParameterRef(r) => self.parameter(&r.name).await,
                Expression::ValueSetRef(r) => self.value_set_url(&r.name).map(Value::string),
                Expression::AliasRef(r) => {
                    aliases
                        .get(&r.name)
                        .cloned()
                        .ok_or_else(|| EvalError::UndefinedAlias {
                            name: r.name.clone(),
                        })
                }
                Expression::Property(property) => {
                    let source = match (&property.scope, &property.source) {
                        (Some(scope), _) => aliases.get(scope).cloned().ok_or_else(|| {
                            EvalError::UndefinedAlias {
                                name: scope.clone(),
                            }
                        })?,
                        (None, Some(source)) => self.evaluate(source, aliases).await?,
                        (None, None) => Value::Null,
                    };
                    Ok(navigate(source, &property.path))
                }

                // === Clinical ===
                Expression::Retrieve(retrieve) => {
                    let mut request = RetrieveRequest::new(retrieve.resource_type()).with_context(
                        self.context.context_type.clone(),
                        self.context.context_id.clone(),
                    );
                    if let Some(Expression::ValueSetRef(r)) = retrieve.codes.as_deref() {
                        let code_path = retrieve.code_property.as_deref().unwrap_or("code");
                        request = request.with_value_set(code_path, self.value_set_url(&r.name)?);
                    }
                    let records = self.data.retrieve(&request).await?;
                    Ok(Value::List(records.into_iter().map(Value::Resource).collect()))
                }
                Expression::Query(query) => self.query(query, aliases).await,
                Expression::InValueSet(e) => {
                    let value = self.evaluate(&e.code, aliases).await?;
                    let Some(r) = &e.valueset else {
                        return Err(EvalError::internal("InValueSet without a value set"));
                    };
                    let url = self.value_set_url(&r.name)?;
                    for code in value.codes() {
                        if self.terminology.in_value_set(&code, url).await? {
                            return Ok(Value::Boolean(true));
                        }
                    }
                    Ok(Value::Boolean(false))
                }

                // === Lists ===
                Expression::Exists(u) => Ok(list::exists(&self.evaluate(&u.operand, aliases).await?)),
                Expression::SingletonFrom(u) => {
                    list::singleton_from(self.evaluate(&u.operand, aliases).await?)
                }
                Expression::Count(a) => Ok(list::count(&self.evaluate(&a.source, aliases).await?)),
                Expression::First(f) => Ok(list::first(self.evaluate(&f.source, aliases).await?)),
                Expression::Last(f) => Ok(list::last(self.evaluate(&f.source, aliases).await?)),

                // === Logical ===
                Expression::Not(u) => logical::not(&self.evaluate(&u.operand, aliases).await?),
                Expression::And(n) => {
                    let mut acc = Some(true);
                    for operand in &n.operand {
                        let value = self.evaluate(operand, aliases).await?;
                        acc = logical::and_step(acc, logical::as_logical("And", &value)?);
                        if acc == Some(false) {
                            break;
                        }
                    }
                    Ok(acc.map_or(Value::Null, Value::Boolean))
                }
                Expression::Or(n) => {
                    let mut acc = Some(false);
                    for operand in &n.operand {
                        let value = self.evaluate(operand, aliases).await?;
                        acc = logical::or_step(acc, logical::as_logical("Or", &value)?);
                        if acc == Some(true) {
                            break;
                        }
                    }
                    Ok(acc.map_or(Value::Null, Value::Boolean))
                }
                Expression::IsNull(u) => Ok(Value::Boolean(
                    self.evaluate(&u.operand, aliases).await?.is_null(),
                )),

                // === Comparison ===
                Expression::Equal(b) => {
                    let (left, right) = self.binary_operands(&b.operand, aliases).await?;
                    Ok(equal(&left, &right))
                }
                Expression::NotEqual(b) => {
                    let (left, right) = self.binary_operands(&b.operand, aliases).await?;
                    Ok(not_equal(&left, &right))
                }
                Expression::Less(b) => self.compare(ComparisonOp::Less, &b.operand, aliases).await,
                Expression::LessOrEqual(b) => {
                    self.compare(ComparisonOp::LessOrEqual, &b.operand, aliases).await
                }
                Expression::Greater(b) => {
                    self.compare(ComparisonOp::Greater, &b.operand, aliases).await
                }
                Expression::GreaterOrEqual(b) => {
                    self.compare(ComparisonOp::GreaterOrEqual, &b.operand, aliases).await
                }

                // === Arithmetic ===
                Expression::Add(b) => self.arithmetic(ArithmeticOp::Add, &b.operand, aliases).await,
                Expression::Subtract(b) => {
                    self.arithmetic(ArithmeticOp::Subtract, &b.operand, aliases).await
                }
                Expression::Multiply(b) => {
                    self.arithmetic(ArithmeticOp::Multiply, &b.operand, aliases).await
                }
                Expression::Divide(b) => {
                    self.arithmetic(ArithmeticOp::Divide, &b.operand, aliases).await
                }

                // === Intervals ===
                Expression::Start(u) => interval::start(&self.evaluate(&u.operand, aliases).await?),
                Expression::End(u) => interval::end(&self.evaluate(&u.operand, aliases).await?),
                Expression::In(b) => {
                    let (point, container) = self.binary_operands(&b.operand, aliases).await?;
                    interval::contains(&point, &container)
                }
            }
        }
        .boxed()
    }

    /// Single-source query; a non-list source yields a single result
    async fn query(&self, query: &Query, aliases: &Aliases) -> EvalResult<Value> {
        let [source] = query.source.as_slice() else {
            return Err(EvalError::internal("multi-source query"));
        };
        let (items, singleton) = match self.evaluate(&source.expression, aliases).await? {
            Value::Null => return Ok(Value::Null),
            Value::List(items) => (items, false),
            other => (vec![other], true),
        };

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let mut scope = aliases.clone();
            scope.insert(source.alias.clone(), item.clone());

            if let Some(where_clause) = &query.where_clause {
                let keep = self.evaluate(where_clause, &scope).await?;
                if keep.as_bool() != Some(true) {
                    continue;
                }
            }
            let result = match &query.return_clause {
                Some(r) => self.evaluate(&r.expression, &scope).await?,
                None => item,
            };
            results.push(result);
        }

        if singleton {
            Ok(results.pop().unwrap_or(Value::Null))
        } else {
            Ok(Value::List(results))
        }
    }

    async fn binary_operands(
        &self,
        operands: &[Expression],
        aliases: &Aliases,
    ) -> EvalResult<(Value, Value)> {
        let [left, right] = operands else {
            return Err(EvalError::internal(format!(
                "expected two operands, found {}",
                operands.len()
            )));
        };
        let left = self.evaluate(left, aliases).await?;
        let right = self.evaluate(right, aliases).await?;
        Ok((left, right))
    }

    async fn compare(
        &self,
        op: ComparisonOp,
        operands: &[Expression],
        aliases: &Aliases,
    ) -> EvalResult<Value> {
        let (left, right) = self.binary_operands(operands, aliases).await?;
        compare(op, &left, &right)
    }

    async fn arithmetic(
        &self,
        op: ArithmeticOp,
        operands: &[Expression],
        aliases: &Aliases,
    ) -> EvalResult<Value> {
        let (left, right) = self.binary_operands(operands, aliases).await?;
        arithmetic(op, &left, &right)
    }

    fn value_set_url(&self, name: &str) -> EvalResult<&'a str> {
        self.library
            .value_set_url(name)
            .ok_or_else(|| EvalError::ValueSetNotFound {
                name: name.to_string(),
            })
    }
}

/// Follow a dotted property path. `value` on a primitive is the primitive
/// itself.
fn navigate(mut value: Value, path: &str) -> Value {
    for segment in path.split('.') {
        value = match value {
            Value::Resource(_) | Value::Tuple(_) | Value::Code(_) | Value::List(_) => {
                value.property(segment)
            }
            Value::Null => return Value::Null,
            primitive if segment == "value" => primitive,
            _ => Value::Null,
        };
    }
    value
}
