/*!
# StreamRip: Signals
*/

use crate::{
	FrameChunk,
	FrameQueue,
	PumpNotifier,
};
use std::sync::{
	Arc,
	Mutex,
	atomic::{
		AtomicBool,
		AtomicU8,
		Ordering::{
			Acquire,
			Release,
		},
	},
};



#[derive(Debug, Clone, Default)]
/// # Rip Signals.
///
/// These are the level-triggered flags shared between the session's callback
/// thread(s), the UI, and the orchestrator. Setting or clearing a flag that is
/// already in that state is a no-op.
///
/// Clones share the same underlying flags.
pub struct RipSignals(Arc<SignalFlags>);

#[derive(Debug, Default)]
/// # The Flags.
struct SignalFlags {
	ripping: AtomicBool,
	end_of_track: AtomicBool,
	skip: AtomicBool,
	abort: AtomicBool,
	finished: AtomicBool,
}

macro_rules! flag {
	($get:ident, $set:ident, $clear:ident, $field:ident, $title:literal) => (
		#[must_use]
		#[doc = concat!("# ", $title, "?")]
		pub fn $get(&self) -> bool { self.0.$field.load(Acquire) }

		#[doc = concat!("# Set ", $title, ".")]
		pub fn $set(&self) { self.0.$field.store(true, Release); }

		#[doc = concat!("# Clear ", $title, ".")]
		pub fn $clear(&self) { self.0.$field.store(false, Release); }
	);
}

impl RipSignals {
	flag!(ripping, set_ripping, clear_ripping, ripping, "Ripping");
	flag!(end_of_track, set_end_of_track, clear_end_of_track, end_of_track, "End of Track");
	flag!(skip, set_skip, clear_skip, skip, "Skip");
	flag!(abort, set_abort, clear_abort, abort, "Abort");
	flag!(finished, set_finished, clear_finished, finished, "Finished");

	/// # Request Skip.
	///
	/// Skips only make sense while a track is actually streaming; requests
	/// made at any other time are ignored so they can't bleed into the next
	/// track.
	pub fn request_skip(&self) {
		if self.ripping() { self.set_skip(); }
	}

	#[inline]
	/// # Request Abort.
	pub fn request_abort(&self) { self.set_abort(); }
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Connection State.
pub enum ConnectionState {
	#[default]
	/// # Logged Out.
	LoggedOut,

	/// # Logged In.
	LoggedIn,

	/// # Disconnected (temporarily).
	Disconnected,

	/// # Offline.
	Offline,
}

impl ConnectionState {
	/// # From U8.
	const fn from_u8(src: u8) -> Self {
		match src {
			1 => Self::LoggedIn,
			2 => Self::Disconnected,
			3 => Self::Offline,
			_ => Self::LoggedOut,
		}
	}

	/// # As U8.
	const fn as_u8(self) -> u8 {
		match self {
			Self::LoggedOut => 0,
			Self::LoggedIn => 1,
			Self::Disconnected => 2,
			Self::Offline => 3,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::LoggedOut => "logged out",
			Self::LoggedIn => "logged in",
			Self::Disconnected => "disconnected",
			Self::Offline => "offline",
		}
	}
}



#[derive(Debug, Clone)]
/// # Session Sink.
///
/// This is what a [`Session`](crate::Session) uses to talk back to the
/// ripper. Every method is safe to call from any thread and returns promptly;
/// none of them block, allocate beyond copying the payload, or print.
pub struct SessionSink {
	queue: FrameQueue,
	signals: RipSignals,
	notify: PumpNotifier,
	connection: Arc<AtomicU8>,
	error: Arc<Mutex<Option<String>>>,
}

impl SessionSink {
	/// # New.
	pub(crate) fn new(queue: FrameQueue, signals: RipSignals, notify: PumpNotifier) -> Self {
		Self {
			queue,
			signals,
			notify,
			connection: Arc::new(AtomicU8::new(ConnectionState::LoggedOut.as_u8())),
			error: Arc::new(Mutex::new(None)),
		}
	}

	#[must_use]
	/// # Music Delivery.
	///
	/// Copy the decoded audio into the frame queue and return the number of
	/// frames accepted. That is either all of them or, if a bounded queue is
	/// full, zero, in which case the session is free to redeliver them later.
	pub fn music_delivery(&self, sample_rate: u32, frames: u32, payload: &[u8]) -> u32 {
		if frames == 0 || payload.is_empty() { return 0; }
		let chunk = FrameChunk::new(sample_rate, frames, payload.to_vec());
		if self.queue.try_enqueue(chunk) { frames }
		else { 0 }
	}

	#[inline]
	/// # End of Track.
	pub fn end_of_track(&self) { self.signals.set_end_of_track(); }

	#[inline]
	/// # Play Token Lost.
	///
	/// The account started playing somewhere else; there's no point going on.
	pub fn play_token_lost(&self) { self.signals.request_abort(); }

	/// # Connection State Changed.
	pub fn connection_state_changed(&self, state: ConnectionState) {
		self.connection.store(state.as_u8(), Release);
	}

	#[inline]
	/// # Notify Main Thread.
	///
	/// Wake the event pump so it can process the session's events.
	pub fn notify_main_thread(&self) { self.notify.notify(); }

	/// # Stream Error.
	///
	/// Report a session-side failure for the track currently streaming. The
	/// orchestrator will give up on that track (and only that track).
	pub fn stream_error<S>(&self, msg: S)
	where S: Into<String> {
		if let Ok(mut guard) = self.error.lock() {
			guard.replace(msg.into());
		}
	}

	#[must_use]
	/// # Connection State.
	pub fn connection(&self) -> ConnectionState {
		ConnectionState::from_u8(self.connection.load(Acquire))
	}

	/// # Take Stream Error.
	pub(crate) fn take_stream_error(&self) -> Option<String> {
		self.error.lock().ok().and_then(|mut guard| guard.take())
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use std::time::Duration;

	#[test]
	fn t_flags() {
		let signals = RipSignals::default();
		let clone = signals.clone();
		assert!(! signals.abort());

		// Idempotent.
		clone.set_abort();
		clone.set_abort();
		assert!(signals.abort());
		signals.clear_abort();
		signals.clear_abort();
		assert!(! clone.abort());

		// Skips are ignored unless something is ripping.
		signals.request_skip();
		assert!(! signals.skip());
		signals.set_ripping();
		signals.request_skip();
		assert!(signals.skip());
	}

	#[test]
	fn t_sink() {
		let queue = FrameQueue::new(None);
		let signals = RipSignals::default();
		let pump = crate::EventPump::new(Duration::from_millis(100));
		let sink = SessionSink::new(queue.clone(), signals.clone(), pump.notifier());

		assert_eq!(sink.music_delivery(44_100, 1, &[1, 2, 3, 4]), 1);
		assert_eq!(sink.music_delivery(44_100, 0, &[]), 0);
		let chunk = queue.dequeue(Duration::from_millis(10)).expect("Missing chunk.");
		assert_eq!(chunk.payload(), &[1, 2, 3, 4]);

		sink.end_of_track();
		assert!(signals.end_of_track());
		sink.play_token_lost();
		assert!(signals.abort());

		assert_eq!(sink.connection(), ConnectionState::LoggedOut);
		sink.connection_state_changed(ConnectionState::LoggedIn);
		assert_eq!(sink.connection(), ConnectionState::LoggedIn);

		sink.stream_error("Network hiccup.");
		assert_eq!(sink.take_stream_error().as_deref(), Some("Network hiccup."));
		assert!(sink.take_stream_error().is_none());
	}
}
