/*!
# StreamRip: Event Pump
*/

use crate::{
	RipSignals,
	Session,
};
use crossbeam_channel::{
	Receiver,
	RecvTimeoutError,
	Sender,
};
use std::{
	sync::{
		Arc,
		atomic::{
			AtomicBool,
			Ordering::{
				Acquire,
				Release,
			},
		},
	},
	thread::JoinHandle,
	time::Duration,
};



/// # Default Poll Interval.
///
/// The pump never sleeps longer than this between checks, regardless of what
/// the session asks for.
pub const PUMP_POLL: Duration = Duration::from_millis(100);



#[derive(Debug, Clone)]
/// # Pump Notifier.
///
/// A cheap, non-blocking way to wake the event pump early.
pub struct PumpNotifier(Sender<()>);

impl PumpNotifier {
	#[inline]
	/// # Notify.
	pub fn notify(&self) { let _res = self.0.try_send(()); }
}



#[derive(Debug)]
/// # Event Pump.
///
/// A background thread that keeps the session's internal event queue
/// drained so logins, playback transitions, and network I/O keep moving even
/// while the orchestrator is busy (or blocked on an encoder).
///
/// The pump does not touch audio data itself, though the session may well
/// invoke its delivery callbacks from within `process_events`.
pub struct EventPump {
	poll: Duration,
	run: Arc<AtomicBool>,
	tx: Sender<()>,
	rx: Receiver<()>,
	handle: Option<JoinHandle<()>>,
}

impl EventPump {
	#[must_use]
	/// # New.
	///
	/// Create a (stopped) pump that will wait at most `poll` between
	/// processing rounds.
	pub fn new(poll: Duration) -> Self {
		let (tx, rx) = crossbeam_channel::unbounded();
		Self {
			poll,
			run: Arc::new(AtomicBool::new(false)),
			tx,
			rx,
			handle: None,
		}
	}

	#[must_use]
	/// # Notifier.
	pub fn notifier(&self) -> PumpNotifier { PumpNotifier(self.tx.clone()) }

	#[must_use]
	/// # Is Running?
	pub fn is_running(&self) -> bool {
		self.handle.as_ref().is_some_and(|h| ! h.is_finished())
	}

	/// # Start.
	///
	/// Spawn the pump thread. It will keep going until [`EventPump::stop`] is
	/// called or the run is marked finished.
	///
	/// Calling this on a pump that is already running has no effect.
	///
	/// ## Errors
	///
	/// This will return an error if the thread cannot be spawned.
	pub fn start<S: Session>(&mut self, session: Arc<S>, signals: RipSignals)
	-> std::io::Result<()> {
		if self.handle.is_some() { return Ok(()); }

		self.run.store(true, Release);
		let run = Arc::clone(&self.run);
		let rx = self.rx.clone();
		let poll = self.poll;
		let handle = std::thread::Builder::new()
			.name("streamrip-events".to_owned())
			.spawn(move || pump(&*session, &rx, &run, &signals, poll))?;

		self.handle.replace(handle);
		Ok(())
	}

	/// # Stop.
	///
	/// Ask the thread to exit. This returns immediately; use
	/// [`EventPump::join`] to wait for it.
	pub fn stop(&self) {
		self.run.store(false, Release);
		let _res = self.tx.try_send(());
	}

	/// # Join.
	///
	/// Wait for the thread to exit. (It should be stopped first.)
	pub fn join(&mut self) {
		if let Some(handle) = self.handle.take() {
			let _res = handle.join();
		}
	}
}

impl Drop for EventPump {
	fn drop(&mut self) {
		self.stop();
		self.join();
	}
}



/// # Pump Loop.
///
/// Process events, then wait for either a notification or the session's
/// requested timeout (capped by `poll`), whichever comes first. Timeouts
/// count down; once the countdown is spent (or a notification arrives),
/// events are processed again and the session gives us a new countdown.
fn pump<S: Session>(
	session: &S,
	rx: &Receiver<()>,
	run: &AtomicBool,
	signals: &RipSignals,
	poll: Duration,
) {
	let mut countdown = session.process_events();

	while run.load(Acquire) && ! signals.finished() {
		let timeout = countdown.min(poll);
		match rx.recv_timeout(timeout) {
			Ok(()) => { countdown = Duration::ZERO; },
			Err(RecvTimeoutError::Timeout) => {
				countdown = countdown.saturating_sub(timeout);
			},
			Err(RecvTimeoutError::Disconnected) => break,
		}

		// Check again before poking the session; stop() wakes us up too.
		if ! run.load(Acquire) { break; }
		if countdown.is_zero() { countdown = session.process_events(); }
	}
}
