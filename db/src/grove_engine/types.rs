use core::fmt;
use std::fmt::Display;

use thiserror::Error;

/// The closed set of failure kinds surfaced by the engine.
///
/// Error equality is defined over this kind alone; the file/line/errno
/// metadata carried by [`GraphError`] identifies where a condition was
/// detected but never participates in comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
	#[error("NotFound")]
	NotFound,
	#[error("AlreadyExists")]
	AlreadyExists,
	#[error("ReadOnly")]
	ReadOnly,
	#[error("NotImplemented")]
	NotImplemented,
	#[error("OutOfSpace")]
	OutOfSpace,
	#[error("TypeMismatch")]
	TypeMismatch,
	#[error("PropertyTypeInvalid")]
	PropertyTypeInvalid,
	#[error("PropertyNotFound")]
	PropertyNotFound,
	#[error("InvalidID")]
	InvalidId,
	#[error("VacantIterator")]
	VacantIterator,
	#[error("NullIterator")]
	NullIterator,
	#[error("IteratorInvalidated")]
	IteratorInvalidated,
	#[error("RangeError")]
	RangeError,
	#[error("IndexExists")]
	IndexExists,
	#[error("LoaderParseError")]
	LoaderParseError,
	#[error("VersionMismatch")]
	VersionMismatch,
	#[error("LayoutCorrupt")]
	LayoutCorrupt,
	#[error("IoError")]
	Io,
	#[error("NoCurrentTransaction")]
	NoCurrentTransaction,
}

/// A failure detected by the engine, tagged with the location that raised it.
#[derive(Debug, Clone)]
pub struct GraphError {
	pub kind: ErrorKind,
	pub file: &'static str,
	pub line: u32,
	pub errno: Option<i32>,
	pub msg: Option<String>,
}

impl GraphError {
	pub fn new(kind: ErrorKind, file: &'static str, line: u32) -> Self {
		GraphError {
			kind,
			file,
			line,
			errno: None,
			msg: None,
		}
	}

	pub fn with_message(mut self, msg: impl Into<String>) -> Self {
		self.msg = Some(msg.into());
		self
	}

	pub fn with_errno(mut self, errno: i32) -> Self {
		self.errno = Some(errno);
		self
	}
}

impl Display for GraphError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "[{}] {}:{}", self.kind, self.file, self.line)?;
		if let Some(errno) = self.errno {
			write!(f, " errno {errno}")?;
		}
		if let Some(msg) = &self.msg {
			write!(f, ": {msg}")?;
		}
		Ok(())
	}
}

impl PartialEq for GraphError {
	fn eq(&self, other: &Self) -> bool {
		self.kind == other.kind
	}
}

impl Eq for GraphError {}

impl std::error::Error for GraphError {}

impl From<std::io::Error> for GraphError {
	fn from(error: std::io::Error) -> Self {
		GraphError {
			kind: ErrorKind::Io,
			file: "",
			line: 0,
			errno: error.raw_os_error(),
			msg: Some(error.to_string()),
		}
	}
}

/// Raises a [`GraphError`] of the given kind at the current source location.
macro_rules! gerr {
	($kind:ident) => {
		$crate::grove_engine::types::GraphError::new(
			$crate::grove_engine::types::ErrorKind::$kind,
			file!(),
			line!(),
		)
	};
	($kind:ident, $($arg:tt)+) => {
		$crate::grove_engine::types::GraphError::new(
			$crate::grove_engine::types::ErrorKind::$kind,
			file!(),
			line!(),
		)
		.with_message(format!($($arg)+))
	};
}

pub(crate) use gerr;
