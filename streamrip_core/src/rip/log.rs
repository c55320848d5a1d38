/*!
# StreamRip: Log
*/

use crate::{
	RipPhase,
	StreamRipError,
	Track,
};
use dactyl::NiceElapsed;
use std::{
	io::Write,
	time::Instant,
};
use utc2k::FmtUtc2k;



/// # Super Basic Log.
///
/// This holds the log-worthy details from an individual track, printing them
/// out en masse when the track is done.
///
/// Doing it this way, versus printing each line in realtime, keeps each
/// track's lines together even if other output is happening.
pub(super) struct RipLog {
	track: Option<(usize, String, String, Instant)>,
	events: Vec<(FmtUtc2k, RipLogEvent)>,
}

impl Drop for RipLog {
	/// # Final Print Maybe.
	fn drop(&mut self) { self.flush(); }
}

impl RipLog {
	/// # New Instance.
	pub(super) const fn new() -> Self {
		Self {
			track: None,
			events: Vec::new(),
		}
	}

	/// # New Track!
	pub(super) fn track(&mut self, idx: usize, track: &Track) {
		self.flush();
		self.events.truncate(0);
		self.track.replace((idx, track.id().to_owned(), track.album().to_owned(), Instant::now()));
	}

	/// # Add Event.
	///
	/// This is a no-op unless a track has been started.
	pub(super) fn add(&mut self, event: RipLogEvent) {
		if self.track.is_some() {
			self.events.push((FmtUtc2k::now(), event));
		}
	}

	/// # Flush.
	pub(super) fn flush(&mut self) {
		let Some((idx, id, album, start)) = self.track.take() else { return; };
		let writer = std::io::stdout();
		let mut handle = writer.lock();
		let _res = writeln!(&mut handle, "##\n## Track #{:02}: {id}", idx + 1);
		if ! album.is_empty() {
			let _res = writeln!(&mut handle, "## Album: {album}");
		}
		let _res = writeln!(&mut handle, "## Elapsed: {}\n##", NiceElapsed::from(start));

		for (time, event) in self.events.drain(..) {
			let _res = writeln!(&mut handle, "[{time}] {event}");
		}

		let _res = handle.flush();
	}
}



#[derive(Debug)]
/// # Log Event.
pub(super) enum RipLogEvent {
	/// # Phase Change.
	Phase(RipPhase),

	/// # Stale Chunks Discarded.
	Discarded(usize),

	/// # Chunks Dropped (queue full).
	Dropped(u64),

	/// # Empty Poll.
	Stall(u16),

	/// # Encoder Exit Code.
	ExitCode(i32),

	/// # Bytes Written.
	Written(u64),

	/// # Error.
	Error(StreamRipError),
}

impl std::fmt::Display for RipLogEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Phase(p) => write!(f, "PHASE     {}", p.as_str()),
			Self::Discarded(n) => write!(f, "DISCARDED {n} stale chunk(s)"),
			Self::Dropped(n) => write!(f, "DROPPED   {n} chunk(s)"),
			Self::Stall(n) => write!(f, "STALL     {n} empty poll(s)"),
			Self::ExitCode(n) => write!(f, "EXIT      {n}"),
			Self::Written(n) => write!(f, "WRITTEN   {n} byte(s)"),
			Self::Error(e) => write!(f, "ERROR     {e}"),
		}
	}
}
