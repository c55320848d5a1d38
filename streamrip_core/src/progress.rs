/*!
# StreamRip: Progress
*/

use crate::RipPhase;
use std::{
	sync::atomic::{
		AtomicU32,
		AtomicU64,
		AtomicU8,
		Ordering::Relaxed,
	},
	time::{
		Duration,
		Instant,
	},
};



/// # ETA Tick Interval.
///
/// The orchestrator re-estimates rates and ETAs this often.
pub const PROGRESS_TICK: Duration = Duration::from_secs(2);

/// # EMA Smoothing Factor.
const EMA_ALPHA: f64 = 0.005;

/// # Minimum Meaningful Rate (audio ms per wall second).
const MIN_RATE: f64 = 0.000_000_01;

/// # ETA Debounce (seconds).
///
/// Displayed ETAs only change when the new estimate differs by at least this
/// much, and are always a multiple of it.
const ETA_STEP: f64 = 5.0;

/// # No ETA (atomic placeholder).
const NO_ETA: u32 = u32::MAX;



#[derive(Debug, Clone, Default)]
/// # Progress Estimator.
///
/// This turns frame deliveries into position, duration, and ETA figures for
/// the current track and, when more than one track is queued, the run as a
/// whole.
///
/// Positions and durations are in milliseconds; ETAs are in seconds.
///
/// The moving average rate is deliberately carried across tracks; only the
/// per-track sampling and ETA state is reset by [`ProgressEstimator::end_track`].
pub struct ProgressEstimator {
	song_position: f64,
	song_duration: u64,
	total_position: u64,
	total_duration: u64,
	show_total: bool,
	ema_rate: Option<f64>,
	song_eta: Option<u32>,
	total_eta: Option<u32>,
	last_sample: Option<(f64, Instant)>,
}

impl ProgressEstimator {
	#[must_use]
	/// # New.
	pub const fn new() -> Self {
		Self {
			song_position: 0.0,
			song_duration: 0,
			total_position: 0,
			total_duration: 0,
			show_total: false,
			ema_rate: None,
			song_eta: None,
			total_eta: None,
			last_sample: None,
		}
	}

	/// # Prepare Run.
	///
	/// Set the aggregate duration of everything that is expected to be
	/// ripped. Totals are only tracked when there's more than one track.
	pub fn prepare_run(&mut self, total_duration: u64, tracks: usize) {
		self.show_total = 1 < tracks;
		self.total_position = 0;
		self.total_duration = if self.show_total { total_duration } else { 0 };
		self.total_eta = None;
	}

	/// # Prepare Track.
	pub fn prepare_track(&mut self, duration: u32) {
		self.song_position = 0.0;
		self.song_duration = u64::from(duration);
		self.song_eta = None;
		self.last_sample = None;
	}

	/// # Push Frames.
	///
	/// Advance the song position by the duration of `frames` at `rate`.
	pub fn push(&mut self, frames: u32, rate: u32) {
		if frames != 0 && rate != 0 {
			self.song_position += f64::from(frames) * 1000.0 / f64::from(rate);
		}
	}

	/// # Tick.
	///
	/// Sample the position against the wall clock and update the smoothed
	/// rate and ETAs. This should be called every [`PROGRESS_TICK`] or so,
	/// and does nothing unless a track is actively ripping.
	pub fn tick(&mut self, ripping: bool, now: Instant) {
		if ! ripping { return; }

		if let Some((pos, when)) = self.last_sample {
			let elapsed = now.saturating_duration_since(when).as_secs_f64();
			if 0.0 < elapsed {
				let rate = (self.song_position - pos) / elapsed;
				if MIN_RATE < rate {
					let ema = match self.ema_rate {
						Some(avg) => EMA_ALPHA * rate + (1.0 - EMA_ALPHA) * avg,
						None => rate,
					};
					self.ema_rate = Some(ema);

					self.song_eta = eta(
						self.song_position,
						self.song_duration,
						ema,
						self.song_eta,
					);

					if self.show_total {
						self.total_eta = eta(
							self.total_position as f64 + self.song_position,
							self.total_duration,
							ema,
							self.total_eta,
						);
					}
				}
			}
		}

		self.last_sample = Some((self.song_position, now));
	}

	/// # Complete Song.
	///
	/// Jump the position to the end, for display purposes.
	pub fn complete_song(&mut self) {
		if (self.song_position as u64) < self.song_duration {
			self.song_position = self.song_duration as f64;
		}
	}

	/// # End Track.
	///
	/// Fold the track's duration into the running total and reset the
	/// per-track sampling and ETA state.
	pub fn end_track(&mut self) {
		self.total_position += self.song_duration;
		self.song_position = 0.0;
		self.song_duration = 0;
		self.last_sample = None;
		self.song_eta = None;
		self.total_eta = None;
	}

	#[must_use]
	/// # Smoothed Rate (audio ms per second).
	pub const fn rate(&self) -> Option<f64> { self.ema_rate }

	#[must_use]
	/// # Song ETA (seconds).
	pub const fn song_eta(&self) -> Option<u32> { self.song_eta }

	#[must_use]
	/// # Total ETA (seconds).
	pub const fn total_eta(&self) -> Option<u32> { self.total_eta }

	#[must_use]
	/// # Song Position (milliseconds).
	pub fn song_position(&self) -> u64 { self.song_position as u64 }

	#[must_use]
	/// # Total Position (milliseconds).
	pub fn total_position(&self) -> u64 {
		if self.show_total { self.total_position + self.song_position as u64 }
		else { 0 }
	}
}



/// # Calculate ETA.
///
/// Work out the remaining time in seconds, then debounce and round it
/// against the previously displayed value.
fn eta(pos: f64, duration: u64, rate: f64, old: Option<u32>) -> Option<u32> {
	if duration == 0 || rate <= 0.0 { return None; }
	let remaining = (duration as f64 - pos).max(0.0);
	Some(debounce(old, remaining / rate))
}

/// # Debounce ETA.
///
/// Keep the old value unless the new one differs by at least five seconds,
/// in which case round the new value to the nearest multiple of five.
fn debounce(old: Option<u32>, new: f64) -> u32 {
	if let Some(old) = old {
		if (new - f64::from(old)).abs() < ETA_STEP { return old; }
	}

	let rounded = (new / ETA_STEP).round() * ETA_STEP;
	if rounded <= 0.0 { 0 }
	else if f64::from(NO_ETA - 1) <= rounded { NO_ETA - 1 }
	else { rounded as u32 }
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Progress Snapshot.
///
/// A read-only copy of the numbers a display would want.
pub struct ProgressSnapshot {
	/// # Song Position (ms).
	pub song_position: u64,

	/// # Song Duration (ms).
	pub song_duration: u64,

	/// # Song ETA (s).
	pub song_eta: Option<u32>,

	/// # Total Position (ms).
	pub total_position: u64,

	/// # Total Duration (ms).
	///
	/// This is zero unless more than one track is queued.
	pub total_duration: u64,

	/// # Total ETA (s).
	pub total_eta: Option<u32>,

	/// # Track Index (zero-based).
	pub track_index: u32,

	/// # Track Count.
	pub track_count: u32,

	/// # Phase.
	pub phase: RipPhase,
}

#[derive(Debug)]
/// # Progress Board.
///
/// A lock-free place for the orchestrator to publish progress and for
/// anybody else to read it. Individual fields are consistent, but a
/// snapshot taken mid-publish may mix old and new values.
pub struct ProgressBoard {
	song_position: AtomicU64,
	song_duration: AtomicU64,
	song_eta: AtomicU32,
	total_position: AtomicU64,
	total_duration: AtomicU64,
	total_eta: AtomicU32,
	track_index: AtomicU32,
	track_count: AtomicU32,
	phase: AtomicU8,
}

impl Default for ProgressBoard {
	#[inline]
	fn default() -> Self { Self::new() }
}

impl ProgressBoard {
	#[must_use]
	/// # New.
	pub const fn new() -> Self {
		Self {
			song_position: AtomicU64::new(0),
			song_duration: AtomicU64::new(0),
			song_eta: AtomicU32::new(NO_ETA),
			total_position: AtomicU64::new(0),
			total_duration: AtomicU64::new(0),
			total_eta: AtomicU32::new(NO_ETA),
			track_index: AtomicU32::new(0),
			track_count: AtomicU32::new(0),
			phase: AtomicU8::new(0),
		}
	}

	/// # Publish.
	pub fn publish(&self, est: &ProgressEstimator) {
		self.song_position.store(est.song_position(), Relaxed);
		self.song_duration.store(est.song_duration, Relaxed);
		self.song_eta.store(est.song_eta.unwrap_or(NO_ETA), Relaxed);
		self.total_position.store(est.total_position(), Relaxed);
		self.total_duration.store(est.total_duration, Relaxed);
		self.total_eta.store(est.total_eta.unwrap_or(NO_ETA), Relaxed);
	}

	/// # Set Phase.
	pub fn set_phase(&self, phase: RipPhase) { self.phase.store(phase as u8, Relaxed); }

	/// # Set Track.
	pub fn set_track(&self, idx: usize, count: usize) {
		self.track_index.store(u32::try_from(idx).unwrap_or(u32::MAX), Relaxed);
		self.track_count.store(u32::try_from(count).unwrap_or(u32::MAX), Relaxed);
	}

	#[must_use]
	/// # Phase.
	pub fn phase(&self) -> RipPhase { RipPhase::from_u8(self.phase.load(Relaxed)) }

	#[must_use]
	/// # Snapshot.
	pub fn snapshot(&self) -> ProgressSnapshot {
		let eta = |v: u32| if v == NO_ETA { None } else { Some(v) };
		ProgressSnapshot {
			song_position: self.song_position.load(Relaxed),
			song_duration: self.song_duration.load(Relaxed),
			song_eta: eta(self.song_eta.load(Relaxed)),
			total_position: self.total_position.load(Relaxed),
			total_duration: self.total_duration.load(Relaxed),
			total_eta: eta(self.total_eta.load(Relaxed)),
			track_index: self.track_index.load(Relaxed),
			track_count: self.track_count.load(Relaxed),
			phase: self.phase(),
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_debounce() {
		// The displayed value changes once, and is always a multiple of five.
		let mut shown = None;
		let mut changes = 0;
		for raw in [122.0, 124.0, 121.0, 130.0] {
			let next = debounce(shown, raw);
			assert_eq!(next % 5, 0, "ETA {next} is not a multiple of five.");
			if shown.is_some() && shown != Some(next) { changes += 1; }
			shown.replace(next);
		}
		assert_eq!(shown, Some(130));
		assert_eq!(changes, 1);

		// Rounding.
		assert_eq!(debounce(None, 2.4), 0);
		assert_eq!(debounce(None, 2.6), 5);
		assert_eq!(debounce(None, 122.7), 125);
		assert_eq!(debounce(None, -3.0), 0);
	}

	#[test]
	fn t_push() {
		let mut est = ProgressEstimator::new();
		est.prepare_track(10_000);
		est.push(44_100, 44_100);
		assert_eq!(est.song_position(), 1000);

		// Zero rates are ignored rather than dividing by zero.
		est.push(44_100, 0);
		assert_eq!(est.song_position(), 1000);

		est.complete_song();
		assert_eq!(est.song_position(), 10_000);
	}

	#[test]
	fn t_tick() {
		let mut est = ProgressEstimator::new();
		est.prepare_run(40_000, 2);
		est.prepare_track(20_000);
		let start = Instant::now();

		// The first tick only records a sample.
		est.tick(true, start);
		assert!(est.rate().is_none());

		// Two seconds of audio in one second of wall time.
		est.push(88_200, 44_100);
		est.tick(true, start + Duration::from_secs(1));
		assert_eq!(est.rate(), Some(2000.0));
		assert_eq!(est.song_eta(), Some(10)); // 18s left at 2x.
		assert_eq!(est.total_eta(), Some(20)); // 38s left at 2x.

		// Nothing happens while idle.
		est.push(88_200, 44_100);
		est.tick(false, start + Duration::from_secs(2));
		assert_eq!(est.song_eta(), Some(10));

		// The rate survives the end of the track, but the ETAs do not.
		est.end_track();
		assert!(est.song_eta().is_none());
		assert!(est.total_eta().is_none());
		assert_eq!(est.rate(), Some(2000.0));
		assert_eq!(est.total_position(), 20_000);
	}

	#[test]
	fn t_no_duration() {
		let mut est = ProgressEstimator::new();
		est.prepare_run(0, 1);
		est.prepare_track(0);
		let start = Instant::now();
		est.tick(true, start);
		est.push(44_100, 44_100);
		est.tick(true, start + Duration::from_secs(1));
		assert!(est.rate().is_some());
		assert!(est.song_eta().is_none());
		assert!(est.total_eta().is_none());
		assert_eq!(est.total_position(), 0);
	}

	#[test]
	fn t_board() {
		let board = ProgressBoard::new();
		assert_eq!(board.snapshot().song_eta, None);

		let mut est = ProgressEstimator::new();
		est.prepare_run(60_000, 3);
		est.prepare_track(20_000);
		est.push(44_100, 44_100);
		board.publish(&est);
		board.set_track(1, 3);
		board.set_phase(RipPhase::Draining);

		let snap = board.snapshot();
		assert_eq!(snap.song_position, 1000);
		assert_eq!(snap.song_duration, 20_000);
		assert_eq!(snap.total_position, 1000);
		assert_eq!(snap.total_duration, 60_000);
		assert_eq!(snap.track_index, 1);
		assert_eq!(snap.track_count, 3);
		assert_eq!(snap.phase, RipPhase::Draining);
	}
}
