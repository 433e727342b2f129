use crate::grove_engine::types::{GraphError, gerr};
use crate::protocol::date::Date;

pub mod cmp;

#[cfg(test)]
mod tests;

/// A property value attached to a node or an edge.
///
/// `String` and `Blob` payloads are stored inline in a property chunk when
/// they fit and spill into the variable arena otherwise; the other variants
/// are always inline.
#[derive(Clone, Debug, Default)]
pub enum Value {
	#[default]
	Empty,
	Boolean(bool),
	I64(i64),
	F64(f64),
	String(String),
	Date(Date),
	Blob(Vec<u8>),
}

/// On-media type tag for a [`Value`]. The numeric codes are part of the
/// persistent format and must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
	Empty = 0,
	Boolean = 1,
	I64 = 2,
	F64 = 3,
	String = 4,
	Date = 5,
	Blob = 6,
}

impl ValueKind {
	pub fn from_u8(code: u8) -> Option<ValueKind> {
		match code {
			0 => Some(ValueKind::Empty),
			1 => Some(ValueKind::Boolean),
			2 => Some(ValueKind::I64),
			3 => Some(ValueKind::F64),
			4 => Some(ValueKind::String),
			5 => Some(ValueKind::Date),
			6 => Some(ValueKind::Blob),
			_ => None,
		}
	}

	pub fn as_u8(self) -> u8 {
		self as u8
	}

	pub fn name(self) -> &'static str {
		match self {
			ValueKind::Empty => "Empty",
			ValueKind::Boolean => "Boolean",
			ValueKind::I64 => "Integer",
			ValueKind::F64 => "Float",
			ValueKind::String => "String",
			ValueKind::Date => "Time",
			ValueKind::Blob => "Blob",
		}
	}
}

impl Value {
	pub fn kind(&self) -> ValueKind {
		match self {
			Value::Empty => ValueKind::Empty,
			Value::Boolean(_) => ValueKind::Boolean,
			Value::I64(_) => ValueKind::I64,
			Value::F64(_) => ValueKind::F64,
			Value::String(_) => ValueKind::String,
			Value::Date(_) => ValueKind::Date,
			Value::Blob(_) => ValueKind::Blob,
		}
	}

	pub fn bool_value(&self) -> Result<bool, GraphError> {
		match self {
			Value::Boolean(v) => Ok(*v),
			_ => Err(gerr!(PropertyTypeInvalid, "expected Boolean, got {}", self.kind().name())),
		}
	}

	pub fn int_value(&self) -> Result<i64, GraphError> {
		match self {
			Value::I64(v) => Ok(*v),
			_ => Err(gerr!(PropertyTypeInvalid, "expected Integer, got {}", self.kind().name())),
		}
	}

	pub fn float_value(&self) -> Result<f64, GraphError> {
		match self {
			Value::F64(v) => Ok(*v),
			_ => Err(gerr!(PropertyTypeInvalid, "expected Float, got {}", self.kind().name())),
		}
	}

	pub fn string_value(&self) -> Result<&str, GraphError> {
		match self {
			Value::String(v) => Ok(v.as_str()),
			_ => Err(gerr!(PropertyTypeInvalid, "expected String, got {}", self.kind().name())),
		}
	}

	pub fn time_value(&self) -> Result<Date, GraphError> {
		match self {
			Value::Date(v) => Ok(*v),
			_ => Err(gerr!(PropertyTypeInvalid, "expected Time, got {}", self.kind().name())),
		}
	}

	pub fn blob_value(&self) -> Result<&[u8], GraphError> {
		match self {
			Value::Blob(v) => Ok(v.as_slice()),
			_ => Err(gerr!(PropertyTypeInvalid, "expected Blob, got {}", self.kind().name())),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::I64(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::I64(v as i64)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::F64(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<Date> for Value {
	fn from(v: Date) -> Self {
		Value::Date(v)
	}
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value::Blob(v)
	}
}
