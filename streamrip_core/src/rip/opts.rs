/*!
# StreamRip: Ripping Options
*/

use crate::{
	EncoderProfile,
	PartialCheck,
	PUMP_POLL,
};
use std::{
	num::NonZeroUsize,
	time::Duration,
};



/// # FLAG: Overwrite Existing.
const FLAG_OVERWRITE: u8 = 0b0000_0001;

/// # FLAG: Verbose Log.
const FLAG_VERBOSE: u8 =   0b0000_0010;

/// # FLAG: Default.
const FLAG_DEFAULT: u8 = 0;

/// # Default Drain Poll.
pub const DRAIN_POLL: Duration = Duration::from_secs(1);

/// # Stall Limit.
///
/// A track fails once this many consecutive drain polls come up empty
/// without the session signaling the end of the track.
pub const STALL_LIMIT: u16 = 60;

/// # Maximum Stall Limit.
const STALL_MAX: u16 = 3600;

/// # Minimum Poll.
const POLL_MIN: Duration = Duration::from_millis(1);

/// # Maximum Poll.
const POLL_MAX: Duration = Duration::from_secs(10);



#[derive(Debug, Clone, Copy)]
/// # Rip Options.
///
/// This struct holds the rip-related options like the output format, what to
/// do about existing files, and how patient to be with a quiet stream.
///
/// Options are set using builder-style methods, like:
///
/// ```
/// use streamrip_core::{
///     EncoderProfile,
///     OutputFormat,
///     RipOptions,
/// };
///
/// let opts = RipOptions::default()
///     .with_profile(EncoderProfile::new(OutputFormat::Flac))
///     .with_overwrite(true);
///
/// assert!(opts.overwrite());
/// assert_eq!(opts.profile().format(), OutputFormat::Flac);
/// ```
pub struct RipOptions {
	profile: EncoderProfile,
	partial: PartialCheck,
	flags: u8,
	poll: Duration,
	pump_poll: Duration,
	stall: u16,
	queue: Option<NonZeroUsize>,
}

impl Default for RipOptions {
	fn default() -> Self {
		Self {
			profile: EncoderProfile::default(),
			partial: PartialCheck::default(),
			flags: FLAG_DEFAULT,
			poll: DRAIN_POLL,
			pump_poll: PUMP_POLL,
			stall: STALL_LIMIT,
			queue: None,
		}
	}
}

macro_rules! with_flag {
	($fn:ident, $flag:ident, $($doc:literal),+ $(,)?) => (
		#[must_use]
		$(
			#[doc = $doc]
		)+
		pub const fn $fn(self, v: bool) -> Self {
			let flags =
				if v { self.flags | $flag }
				else { self.flags & ! $flag };

			Self {
				flags,
				..self
			}
		}
	)
}

/// ## Setters.
impl RipOptions {
	with_flag!(
		with_overwrite,
		FLAG_OVERWRITE,
		"# Overwrite Existing Files.",
		"",
		"When `true`, tracks are re-ripped even if their output files already",
		"exist. When `false`, existing files are left alone unless they look",
		"like partial rips.",
		"",
		"The default is `false`.",
	);

	#[must_use]
	/// # Partial Check.
	///
	/// Set the policy used to decide whether an existing output file is an
	/// interrupted rip that should be redone.
	///
	/// The default is [`PartialCheck::Weak`].
	pub const fn with_partial_check(self, partial: PartialCheck) -> Self {
		Self {
			partial,
			..self
		}
	}

	#[must_use]
	/// # Drain Poll.
	///
	/// How long to wait for audio before checking the skip/abort/stall
	/// state. Values are capped to `1ms..=10s`, with a default of one second.
	pub const fn with_poll(self, poll: Duration) -> Self {
		let poll = clamp_poll(poll);
		Self {
			poll,
			..self
		}
	}

	#[must_use]
	/// # Encoder Profile.
	pub const fn with_profile(self, profile: EncoderProfile) -> Self {
		Self {
			profile,
			..self
		}
	}

	#[must_use]
	/// # Event Pump Poll.
	///
	/// The longest the event pump will go between processing rounds. Values
	/// are capped to `1ms..=10s`, with a default of 100ms.
	pub const fn with_pump_poll(self, pump_poll: Duration) -> Self {
		let pump_poll = clamp_poll(pump_poll);
		Self {
			pump_poll,
			..self
		}
	}

	#[must_use]
	/// # Queue Capacity.
	///
	/// Limit the number of undrained chunks. When the limit is reached,
	/// further deliveries are refused (and counted) until there's room.
	///
	/// By default the queue is unbounded.
	pub const fn with_queue_capacity(self, queue: Option<NonZeroUsize>) -> Self {
		Self {
			queue,
			..self
		}
	}

	#[must_use]
	/// # Stall Limit.
	///
	/// The number of consecutive empty drain polls to tolerate before giving
	/// up on a track. Values are capped to `1..=3600`, with a default of `60`.
	pub const fn with_stall_limit(self, mut stall: u16) -> Self {
		if stall == 0 { stall = 1; }
		else if STALL_MAX < stall { stall = STALL_MAX; }
		Self {
			stall,
			..self
		}
	}

	with_flag!(
		with_verbose,
		FLAG_VERBOSE,
		"# Verbose Log.",
		"",
		"When `true`, a timestamped event log for each track is printed to",
		"STDOUT.",
		"",
		"The default is `false`.",
	);
}



macro_rules! get_flag {
	($fn:ident, $flag:ident, $title:literal) => (
		#[must_use]
		#[doc = concat!("# ", $title, "?")]
		pub const fn $fn(&self) -> bool { $flag == self.flags & $flag }
	);
}

/// # Getters.
impl RipOptions {
	get_flag!(overwrite, FLAG_OVERWRITE, "Overwrite Existing");
	get_flag!(verbose, FLAG_VERBOSE, "Verbose Log");

	#[must_use]
	/// # Partial Check.
	pub const fn partial_check(&self) -> PartialCheck { self.partial }

	#[must_use]
	/// # Drain Poll.
	pub const fn poll(&self) -> Duration { self.poll }

	#[must_use]
	/// # Encoder Profile.
	pub const fn profile(&self) -> EncoderProfile { self.profile }

	#[must_use]
	/// # Event Pump Poll.
	pub const fn pump_poll(&self) -> Duration { self.pump_poll }

	#[must_use]
	/// # Queue Capacity.
	pub const fn queue_capacity(&self) -> Option<NonZeroUsize> { self.queue }

	#[must_use]
	/// # Stall Limit.
	pub const fn stall_limit(&self) -> u16 { self.stall }
}



/// # Clamp Poll.
const fn clamp_poll(poll: Duration) -> Duration {
	if poll.as_nanos() < POLL_MIN.as_nanos() { POLL_MIN }
	else if POLL_MAX.as_nanos() < poll.as_nanos() { POLL_MAX }
	else { poll }
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::OutputFormat;

	#[test]
	fn t_rip_flags() {
		// Make sure our flags are unique.
		let mut all = vec![
			FLAG_OVERWRITE,
			FLAG_VERBOSE,
		];
		all.sort_unstable();
		all.dedup();
		assert_eq!(all.len(), 2);

		let opts = RipOptions::default();
		assert!(! opts.overwrite());
		assert!(! opts.verbose());

		let opts = opts.with_overwrite(true).with_verbose(true);
		assert!(opts.overwrite());
		assert!(opts.verbose());

		let opts = opts.with_overwrite(false);
		assert!(! opts.overwrite());
		assert!(opts.verbose());
	}

	#[test]
	fn t_rip_options_stall() {
		assert_eq!(RipOptions::default().stall_limit(), STALL_LIMIT);
		for v in [1, 30, 90] {
			let opts = RipOptions::default().with_stall_limit(v);
			assert_eq!(opts.stall_limit(), v);
		}

		// Min.
		let opts = RipOptions::default().with_stall_limit(0);
		assert_eq!(opts.stall_limit(), 1);

		// Max.
		let opts = RipOptions::default().with_stall_limit(u16::MAX);
		assert_eq!(opts.stall_limit(), STALL_MAX);
	}

	#[test]
	fn t_rip_options_poll() {
		assert_eq!(RipOptions::default().poll(), DRAIN_POLL);
		assert_eq!(RipOptions::default().pump_poll(), PUMP_POLL);

		let opts = RipOptions::default().with_poll(Duration::from_millis(20));
		assert_eq!(opts.poll(), Duration::from_millis(20));

		let opts = RipOptions::default()
			.with_poll(Duration::ZERO)
			.with_pump_poll(Duration::from_secs(60));
		assert_eq!(opts.poll(), POLL_MIN);
		assert_eq!(opts.pump_poll(), POLL_MAX);
	}

	#[test]
	fn t_rip_options_misc() {
		let opts = RipOptions::default()
			.with_profile(EncoderProfile::new(OutputFormat::Wav))
			.with_partial_check(PartialCheck::Strict)
			.with_queue_capacity(NonZeroUsize::new(8));
		assert_eq!(opts.profile().format(), OutputFormat::Wav);
		assert_eq!(opts.partial_check(), PartialCheck::Strict);
		assert_eq!(opts.queue_capacity(), NonZeroUsize::new(8));
	}
}
