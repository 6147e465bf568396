//! The Array Calculator filter: resolve, parse, validate, evaluate, store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ast::Expr;
use super::convert::coerce_values;
use super::error::{CalcError, CalcWarning};
use super::eval::{bind, AngleUnit, Bindings};
use super::parser::parse;
use crate::data::model::{DataArray, DataArrayPath, ScalarType};
use crate::data::store::{DataContainerArray, StoreError};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Calculator parameters. Serializable so a run can be described in a JSON
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayCalculator {
    /// Matrix whose arrays the expression may reference. A non-empty array
    /// segment restricts the expression to that single array.
    pub input_scope: DataArrayPath,
    pub expression: String,
    /// Where the result array is created or replaced.
    pub output_path: DataArrayPath,
    #[serde(default)]
    pub angle_unit: AngleUnit,
    pub output_type: ScalarType,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcReport {
    pub output_path: DataArrayPath,
    pub num_tuples: usize,
    pub num_components: usize,
    pub warnings: Vec<CalcWarning>,
}

/// Status code plus messages, the shape reported to pipeline callers:
/// 0 on success (messages are warnings), negative on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStatus {
    pub code: i32,
    pub messages: Vec<String>,
}

impl FilterStatus {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl From<&Result<CalcReport, CalcError>> for FilterStatus {
    fn from(result: &Result<CalcReport, CalcError>) -> Self {
        match result {
            Ok(report) => FilterStatus {
                code: 0,
                messages: report.warnings.iter().map(|w| w.to_string()).collect(),
            },
            Err(e) => FilterStatus {
                code: e.code(),
                messages: vec![e.to_string()],
            },
        }
    }
}

/// Parsed expression and its resolved arrays, ready to bind.
struct Prepared {
    expr: Expr,
    bindings: Bindings,
    default_tuples: usize,
}

impl ArrayCalculator {
    pub fn new(
        input_scope: DataArrayPath,
        expression: impl Into<String>,
        output_path: DataArrayPath,
        angle_unit: AngleUnit,
        output_type: ScalarType,
    ) -> Self {
        ArrayCalculator {
            input_scope,
            expression: expression.into(),
            output_path,
            angle_unit,
            output_type,
        }
    }

    /// Names the expression may reference.
    fn visible_names(&self, store: &DataContainerArray) -> Result<BTreeSet<String>, CalcError> {
        if self.input_scope.has_array() {
            store.resolve(&self.input_scope)?;
            return Ok(BTreeSet::from([self.input_scope.array.clone()]));
        }
        Ok(store
            .list_array_names(&self.input_scope)?
            .into_iter()
            .collect())
    }

    /// Every check that precedes evaluation. Returns the output shape as
    /// `(tuples, components)` without touching the store.
    pub fn data_check(&self, store: &DataContainerArray) -> Result<(usize, usize), CalcError> {
        let prepared = self.prepare(store)?;
        let plan = bind(&prepared.expr, &prepared.bindings, prepared.default_tuples)?;
        Ok((plan.num_tuples(), plan.num_components()))
    }

    fn prepare(&self, store: &DataContainerArray) -> Result<Prepared, CalcError> {
        if self.expression.trim().is_empty() {
            return Err(CalcError::EmptyExpression);
        }
        let scope = self.input_scope.matrix_path();
        let default_tuples = store.attribute_matrix(&scope)?.num_tuples();
        store.check_array_parent(&self.output_path)?;

        let names = self.visible_names(store)?;
        let parsed = parse(&self.expression, &names)?;

        let mut bindings = Bindings::new(scope.clone());
        for name in &parsed.arrays {
            let path = scope.with_array(name.as_str());
            if !names.contains(name) {
                return Err(StoreError::NotFound(path).into());
            }
            bindings.insert(name.as_str(), store.resolve(&path)?);
        }
        Ok(Prepared {
            expr: parsed.expr,
            bindings,
            default_tuples,
        })
    }

    /// Run the calculator. On error the store is unchanged; on success it
    /// holds the new array at `output_path`.
    pub fn execute(&self, store: &mut DataContainerArray) -> Result<CalcReport, CalcError> {
        let prepared = self.prepare(store)?;
        let plan = bind(&prepared.expr, &prepared.bindings, prepared.default_tuples)?;
        let evaluation = plan.evaluate(self.angle_unit);
        let (data, coercion_warnings) = coerce_values(&evaluation.values, self.output_type);

        let mut warnings = evaluation.warnings;
        warnings.extend(coercion_warnings);
        warnings.sort_by_key(|w| w.index);

        let array = DataArray::new(self.output_path.array.clone(), evaluation.num_components, data);
        store.insert_array(&self.output_path, array)?;

        log::info!(
            "'{}' -> {} ({} tuples × {} components, {})",
            self.expression,
            self.output_path,
            evaluation.num_tuples,
            evaluation.num_components,
            self.output_type
        );
        if !warnings.is_empty() {
            log::warn!(
                "{} element(s) of {} were substituted, first: {}",
                warnings.len(),
                self.output_path,
                warnings[0]
            );
        }

        Ok(CalcReport {
            output_path: self.output_path.clone(),
            num_tuples: evaluation.num_tuples,
            num_components: evaluation.num_components,
            warnings,
        })
    }

    /// [`execute`](Self::execute) reported as a [`FilterStatus`].
    pub fn run(&self, store: &mut DataContainerArray) -> FilterStatus {
        let result = self.execute(store);
        if let Err(e) = &result {
            log::error!("array calculator failed: {e}");
        }
        FilterStatus::from(&result)
    }
}

/// Evaluate `expression` over the arrays in `input_scope` and store the
/// result at `output_path`. Returns 0 on success, a negative code otherwise.
pub fn array_calculator(
    store: &mut DataContainerArray,
    input_scope: DataArrayPath,
    expression: &str,
    output_path: DataArrayPath,
    angle_unit: AngleUnit,
    output_type: ScalarType,
) -> FilterStatus {
    ArrayCalculator::new(input_scope, expression, output_path, angle_unit, output_type).run(store)
}
