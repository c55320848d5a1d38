/*!
# StreamRip: Reporting
*/

use crate::{
	PostRun,
	StreamRipError,
	Track,
};
use dactyl::{
	NiceElapsed,
	traits::NiceInflection,
};
use fyi_msg::Msg;
use std::{
	path::{
		Path,
		PathBuf,
	},
	time::{
		Duration,
		Instant,
	},
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Skip Reason.
pub enum SkipReason {
	/// # The Output Already Exists.
	Exists,

	/// # The User Asked.
	User,
}



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Track Outcome.
pub enum RipOutcome {
	/// # Ripped (to this path).
	Ripped(PathBuf),

	/// # Skipped.
	Skipped(SkipReason),

	/// # Failed.
	Failed(StreamRipError),

	/// # Aborted Mid-Rip.
	Aborted,
}

impl RipOutcome {
	#[must_use]
	/// # Is Ripped?
	pub const fn is_ripped(&self) -> bool { matches!(self, Self::Ripped(_)) }

	#[must_use]
	/// # Is Skipped?
	pub const fn is_skipped(&self) -> bool { matches!(self, Self::Skipped(_)) }

	#[must_use]
	/// # Is Failed (or Aborted)?
	pub const fn is_failed(&self) -> bool { matches!(self, Self::Failed(_) | Self::Aborted) }
}



#[derive(Debug, Clone)]
/// # Rip Summary.
///
/// The outcome of each track that was attempted, in order. Tracks never
/// reached because of an abort are not included.
pub struct RipSummary {
	outcomes: Vec<(String, RipOutcome)>,
	elapsed: Duration,
	aborted: bool,
}

impl RipSummary {
	/// # New.
	pub(super) const fn new() -> Self {
		Self {
			outcomes: Vec::new(),
			elapsed: Duration::ZERO,
			aborted: false,
		}
	}

	/// # Push Outcome.
	pub(super) fn push(&mut self, id: &str, outcome: RipOutcome) {
		if matches!(outcome, RipOutcome::Aborted) { self.aborted = true; }
		self.outcomes.push((id.to_owned(), outcome));
	}

	/// # Finish.
	pub(super) fn finish(&mut self, start: Instant, aborted: bool) {
		self.elapsed = start.elapsed();
		if aborted { self.aborted = true; }
	}

	#[must_use]
	/// # Outcomes.
	pub fn outcomes(&self) -> &[(String, RipOutcome)] { &self.outcomes }

	#[must_use]
	/// # Elapsed Time.
	pub const fn elapsed(&self) -> Duration { self.elapsed }

	#[must_use]
	/// # Aborted?
	pub const fn aborted(&self) -> bool { self.aborted }

	#[must_use]
	/// # Ripped Count.
	pub fn ripped(&self) -> usize {
		self.outcomes.iter().filter(|(_, o)| o.is_ripped()).count()
	}

	#[must_use]
	/// # Skipped Count.
	pub fn skipped(&self) -> usize {
		self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
	}

	#[must_use]
	/// # Failed Count.
	///
	/// This includes a track interrupted by an abort.
	pub fn failed(&self) -> usize {
		self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
	}

	/// # Print.
	///
	/// Print the totals to STDERR, followed by the IDs of any tracks that
	/// failed. Single-track runs are not summarized.
	pub fn print(&self) {
		if self.outcomes.len() < 2 { return; }

		let secs = u32::try_from(self.elapsed.as_secs()).unwrap_or(u32::MAX);
		Msg::new(("Ripped", 199), format!(
			"{}, {} skipped, {} failed, in {}.",
			self.ripped().nice_inflect("track", "tracks"),
			self.skipped(),
			self.failed(),
			NiceElapsed::from(secs),
		))
			.with_newline(true)
			.eprint();

		for (id, outcome) in &self.outcomes {
			let msg = match outcome {
				RipOutcome::Failed(e) => Msg::warning(format!("{id}: {e}")),
				RipOutcome::Aborted => Msg::warning(format!("{id}: aborted mid-rip.")),
				_ => continue,
			};
			msg.with_newline(true).eprint();
		}
	}
}



#[derive(Debug, Default)]
/// # Rip Report.
///
/// This is the stock [`PostRun`] implementation. It remembers what worked and
/// what didn't, and optionally saves the IDs of failed tracks to a file so
/// they can be retried later.
pub struct RipReport {
	fail_log: Option<PathBuf>,
	success: Vec<(String, PathBuf)>,
	failure: Vec<(String, String)>,
}

impl PostRun for RipReport {
	fn record_success(&mut self, track: &Track, dst: &Path) {
		self.success.push((track.to_string(), dst.to_path_buf()));
	}

	fn record_failure(&mut self, track: &Track) {
		self.failure.push((track.to_string(), track.id().to_owned()));
	}

	fn finish(&mut self) {
		if let Err(e) = self.save_fail_log() {
			Msg::from(e).eprint();
		}
	}
}

impl RipReport {
	#[must_use]
	/// # New.
	///
	/// If `fail_log` is provided, the IDs of failed tracks will be written to
	/// it, one per line, when the run finishes. (If nothing fails, the file
	/// is removed instead.)
	pub fn new(fail_log: Option<PathBuf>) -> Self {
		Self { fail_log, ..Self::default() }
	}

	#[must_use]
	/// # Fail Log.
	pub fn fail_log(&self) -> Option<&Path> { self.fail_log.as_deref() }

	#[must_use]
	/// # Successes (label, path).
	pub fn successes(&self) -> &[(String, PathBuf)] { &self.success }

	#[must_use]
	/// # Failures (label, ID).
	pub fn failures(&self) -> &[(String, String)] { &self.failure }

	/// # Save Fail Log.
	fn save_fail_log(&self) -> Result<(), StreamRipError> {
		let Some(dst) = self.fail_log.as_deref() else { return Ok(()); };

		if self.failure.is_empty() {
			if dst.is_file() {
				std::fs::remove_file(dst)
					.map_err(|_| StreamRipError::Write(dst.to_string_lossy().into_owned()))?;
			}
			return Ok(());
		}

		let mut out = String::new();
		for (_, id) in &self.failure {
			out.push_str(id);
			out.push('\n');
		}
		write_atomic::write_file(dst, out.as_bytes())
			.map_err(|_| StreamRipError::Write(dst.to_string_lossy().into_owned()))
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_summary() {
		let mut summary = RipSummary::new();
		summary.push("a", RipOutcome::Ripped(PathBuf::from("a.mp3")));
		summary.push("b", RipOutcome::Skipped(SkipReason::Exists));
		summary.push("c", RipOutcome::Failed(StreamRipError::Stall(60)));
		assert!(! summary.aborted());
		summary.push("d", RipOutcome::Aborted);
		assert!(summary.aborted());

		assert_eq!(summary.ripped(), 1);
		assert_eq!(summary.skipped(), 1);
		assert_eq!(summary.failed(), 2);
		assert_eq!(summary.outcomes().len(), 4);

		// This just prints; make sure it doesn't explode.
		summary.finish(Instant::now(), false);
		assert!(summary.aborted());
		summary.print();
	}

	#[test]
	fn t_fail_log() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("failed.txt");

		let mut report = RipReport::new(Some(dst.clone()));
		report.record_success(&Track::new("id:1", 1000), Path::new("1.mp3"));
		report.record_failure(&Track::new("id:2", 1000));
		report.record_failure(&Track::new("id:3", 1000));
		report.finish();
		assert_eq!(
			std::fs::read_to_string(&dst).expect("Missing fail log."),
			"id:2\nid:3\n",
		);
		assert_eq!(report.successes().len(), 1);
		assert_eq!(report.failures().len(), 2);
		assert_eq!(report.fail_log(), Some(dst.as_path()));

		// A clean run removes the old log.
		let mut report = RipReport::new(Some(dst.clone()));
		report.record_success(&Track::new("id:1", 1000), Path::new("1.mp3"));
		report.finish();
		assert!(! dst.exists());
	}
}
