use crate::grove_engine::storage_core::string_table::StringId;
use crate::grove_engine::types::GraphError;
use crate::protocol::value::Value;

/// Comparison form of a [`PropertyPredicate`].
///
/// The two-operand forms bound a range; `Ge`/`Gt` pick the lower-bound
/// inclusivity and `Le`/`Lt` the upper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
	DontCare,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	GeLe,
	GeLt,
	GtLe,
	GtLt,
}

impl PredicateOp {
	pub fn is_range(self) -> bool {
		matches!(
			self,
			PredicateOp::GeLe | PredicateOp::GeLt | PredicateOp::GtLe | PredicateOp::GtLt
		)
	}
}

/// A predicate over one property key: `(key, op, operand1[, operand2])`.
#[derive(Debug, Clone)]
pub struct PropertyPredicate {
	pub key: StringId,
	pub op: PredicateOp,
	pub v1: Value,
	pub v2: Value,
}

impl PropertyPredicate {
	/// A key-only predicate: matches any object that has the key at all.
	pub fn dont_care(key: StringId) -> Self {
		PropertyPredicate {
			key,
			op: PredicateOp::DontCare,
			v1: Value::Empty,
			v2: Value::Empty,
		}
	}

	pub fn new(key: StringId, op: PredicateOp, v1: impl Into<Value>) -> Self {
		PropertyPredicate {
			key,
			op,
			v1: v1.into(),
			v2: Value::Empty,
		}
	}

	pub fn new_range(
		key: StringId,
		op: PredicateOp,
		v1: impl Into<Value>,
		v2: impl Into<Value>,
	) -> Self {
		PropertyPredicate {
			key,
			op,
			v1: v1.into(),
			v2: v2.into(),
		}
	}

	/// Evaluates the predicate against a concrete value.
	///
	/// A kind mismatch between the value and the operands is a non-match, not
	/// a failure; predicates filter, they do not validate.
	pub fn matches(&self, value: &Value) -> Result<bool, GraphError> {
		if self.op == PredicateOp::DontCare {
			return Ok(true);
		}
		if value.kind() != self.v1.kind() {
			return Ok(false);
		}
		Ok(match self.op {
			PredicateOp::DontCare => true,
			PredicateOp::Eq => value == &self.v1,
			PredicateOp::Ne => value != &self.v1,
			PredicateOp::Lt => value < &self.v1,
			PredicateOp::Le => value <= &self.v1,
			PredicateOp::Gt => value > &self.v1,
			PredicateOp::Ge => value >= &self.v1,
			PredicateOp::GeLe => value >= &self.v1 && value <= &self.v2,
			PredicateOp::GeLt => value >= &self.v1 && value < &self.v2,
			PredicateOp::GtLe => value > &self.v1 && value <= &self.v2,
			PredicateOp::GtLt => value > &self.v1 && value < &self.v2,
		})
	}
}
