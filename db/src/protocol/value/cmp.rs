use std::cmp::Ordering;

use super::Value;

/// Total order over values.
///
/// Values of the same kind compare by their natural order: strings
/// lexicographically, floats by `f64::total_cmp` so that every bit pattern
/// (NaN included) has a fixed place, times by `(utc_epoch_us, tz)`.
/// Values of different kinds order by their kind code; index trees never mix
/// kinds, so the cross-kind arm only matters for heterogeneous scans.
impl Ord for Value {
	fn cmp(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Value::Empty, Value::Empty) => Ordering::Equal,
			(Value::Boolean(s), Value::Boolean(o)) => s.cmp(o),
			(Value::I64(s), Value::I64(o)) => s.cmp(o),
			(Value::F64(s), Value::F64(o)) => s.total_cmp(o),
			(Value::String(s), Value::String(o)) => s.cmp(o),
			(Value::Date(s), Value::Date(o)) => s.cmp(o),
			(Value::Blob(s), Value::Blob(o)) => s.cmp(o),
			(s, o) => s.kind().as_u8().cmp(&o.kind().as_u8()),
		}
	}
}

impl PartialOrd for Value {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Value {}

impl PartialEq<bool> for Value {
	fn eq(&self, other: &bool) -> bool {
		matches!(self, Value::Boolean(v) if v == other)
	}
}

impl PartialEq<i64> for Value {
	fn eq(&self, other: &i64) -> bool {
		matches!(self, Value::I64(v) if v == other)
	}
}

impl PartialEq<f64> for Value {
	fn eq(&self, other: &f64) -> bool {
		matches!(self, Value::F64(v) if v.total_cmp(other) == Ordering::Equal)
	}
}

impl PartialEq<&str> for Value {
	fn eq(&self, other: &&str) -> bool {
		matches!(self, Value::String(v) if v == other)
	}
}

impl PartialOrd<i64> for Value {
	fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
		match self {
			Value::I64(v) => Some(v.cmp(other)),
			_ => None,
		}
	}
}

impl PartialOrd<f64> for Value {
	fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
		match self {
			Value::F64(v) => Some(v.total_cmp(other)),
			_ => None,
		}
	}
}
