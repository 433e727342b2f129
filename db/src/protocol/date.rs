use core::fmt;
use std::fmt::Display;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::grove_engine::types::{GraphError, gerr};

/// A point in time stored canonically as microseconds since the Unix epoch
/// (UTC) plus the originating timezone as a signed count of quarter hours.
///
/// Keeping the offset means rendering reproduces the wall-clock string the
/// value was created from, while ordering and equality go by the UTC instant
/// first and the offset second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Date {
	epoch_us: i64,
	tz_quarter_hours: i8,
}

impl Date {
	pub fn from_utc_epoch_us(epoch_us: i64, tz_quarter_hours: i8) -> Self {
		Date {
			epoch_us,
			tz_quarter_hours,
		}
	}

	/// Builds a timestamp from broken-down wall-clock components in the given
	/// timezone. The offset must be a whole number of quarter hours.
	#[allow(clippy::too_many_arguments)]
	pub fn from_wall_clock(
		year: i32,
		month: u32,
		day: u32,
		hour: u32,
		min: u32,
		sec: u32,
		micros: u32,
		tz_offset_minutes: i32,
	) -> Result<Self, GraphError> {
		if tz_offset_minutes % 15 != 0 || !(-14 * 60..=14 * 60).contains(&tz_offset_minutes) {
			return Err(gerr!(RangeError, "timezone offset {tz_offset_minutes}min"));
		}
		let offset = FixedOffset::east_opt(tz_offset_minutes * 60)
			.ok_or_else(|| gerr!(RangeError, "timezone offset {tz_offset_minutes}min"))?;
		let local = chrono::NaiveDate::from_ymd_opt(year, month, day)
			.and_then(|d| d.and_hms_micro_opt(hour, min, sec, micros))
			.ok_or_else(|| {
				gerr!(RangeError, "invalid wall clock {year}-{month}-{day} {hour}:{min}:{sec}")
			})?;
		let instant = offset
			.from_local_datetime(&local)
			.single()
			.ok_or_else(|| gerr!(RangeError, "ambiguous wall clock"))?;
		Ok(Date {
			epoch_us: instant.timestamp_micros(),
			tz_quarter_hours: (tz_offset_minutes / 15) as i8,
		})
	}

	pub fn now() -> Self {
		Date {
			epoch_us: Utc::now().timestamp_micros(),
			tz_quarter_hours: 0,
		}
	}

	pub fn utc_epoch_us(&self) -> i64 {
		self.epoch_us
	}

	pub fn tz_quarter_hours(&self) -> i8 {
		self.tz_quarter_hours
	}

	pub fn tz_offset_minutes(&self) -> i32 {
		self.tz_quarter_hours as i32 * 15
	}

	fn as_local(&self) -> Option<DateTime<FixedOffset>> {
		let offset = FixedOffset::east_opt(self.tz_offset_minutes() * 60)?;
		let utc = Utc.timestamp_micros(self.epoch_us).single()?;
		Some(utc.with_timezone(&offset))
	}
}

impl Display for Date {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.as_local() {
			Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6f%:z")),
			None => write!(f, "@{}us{:+}q", self.epoch_us, self.tz_quarter_hours),
		}
	}
}
