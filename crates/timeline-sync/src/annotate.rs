use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use tl_view_host::{HostError, NodeId, ViewHost};

use tracing::trace;

use super::config::TimestampConfig;

const NAIVE_FORMATS: [&str; 4] = [
	"%a, %b %d %Y %H:%M:%S",
	"%a, %b %d %Y %I:%M:%S %p",
	"%Y-%m-%d %H:%M:%S",
	"%Y-%m-%dT%H:%M:%S",
];

/// Turns a timestamp's full date text into the short prefix shown next to it.
pub trait TimestampAnnotator: Send + Sync + 'static {
	fn date_prefix(&self, full_date: &str) -> Option<String>;
}

/// `MM/DD ` prefix, zero padded, with a trailing space.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatePrefixAnnotator;

impl DatePrefixAnnotator {
	fn parse_date(full_date: &str) -> Option<NaiveDate> {
		let full_date = full_date.trim();

		DateTime::parse_from_rfc3339(full_date)
			.or_else(|_| DateTime::parse_from_rfc2822(full_date))
			.map(|date_time| date_time.date_naive())
			.ok()
			.or_else(|| {
				NAIVE_FORMATS.iter().find_map(|format| {
					NaiveDateTime::parse_from_str(full_date, format)
						.map(|date_time| date_time.date())
						.ok()
				})
			})
			.or_else(|| NaiveDate::parse_from_str(full_date, "%Y-%m-%d").ok())
	}
}

impl TimestampAnnotator for DatePrefixAnnotator {
	fn date_prefix(&self, full_date: &str) -> Option<String> {
		Self::parse_date(full_date).map(|date| format!("{:02}/{:02} ", date.month(), date.day()))
	}
}

/// Sets the date prefix on every timestamp under `list`, nested ones included.
///
/// Returns how many timestamps were annotated; unreadable dates are skipped.
pub fn annotate_timestamps<H: ViewHost + ?Sized>(
	host: &H,
	list: NodeId,
	config: &TimestampConfig,
	annotator: &dyn TimestampAnnotator,
) -> Result<usize, HostError> {
	let mut annotated = 0;

	for timestamp in host.find_all_by_class(list, &config.class) {
		let Some(full_date) = host.attribute(timestamp, &config.source_attribute) else {
			continue;
		};

		let Some(prefix) = annotator.date_prefix(&full_date) else {
			trace!(%timestamp, %full_date, "Skipping unreadable timestamp;");
			continue;
		};

		host.set_attribute(timestamp, &config.prefix_attribute, &prefix)?;
		annotated += 1;
	}

	Ok(annotated)
}
