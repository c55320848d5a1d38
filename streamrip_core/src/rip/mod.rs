/*!
# StreamRip: Ripping
*/

mod log;
pub(super) mod opts;
pub(super) mod report;



use crate::{
	EncoderProcess,
	EncoderProfile,
	EventPump,
	FrameQueue,
	NoTags,
	OutputPaths,
	PostRun,
	PROGRESS_TICK,
	ProgressBoard,
	ProgressEstimator,
	ProgressSnapshot,
	RipJournal,
	RipOptions,
	RipReport,
	RipSignals,
	Session,
	SessionSink,
	StreamRipError,
	Tagger,
	Track,
};
use crossbeam_channel::{
	Receiver,
	Sender,
};
use fyi_ansi::dim;
use fyi_msg::Msg;
use log::{
	RipLog,
	RipLogEvent,
};
use report::{
	RipOutcome,
	RipSummary,
	SkipReason,
};
use std::{
	fmt,
	path::{
		Path,
		PathBuf,
	},
	sync::Arc,
	thread::JoinHandle,
	time::Instant,
};



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
#[repr(u8)]
/// # Rip Phase.
///
/// Each track moves through these in order, ending in one of the outcome
/// phases (`Success`, `Skipped`, `Failed`, `Aborted`). The run as a whole
/// ends with `Done`.
pub enum RipPhase {
	#[default]
	/// # Not Started.
	Idle = 0,

	/// # Loading the Next Track.
	ResolvingNextTrack = 1,

	/// # Checking Availability.
	AvailabilityCheck = 2,

	/// # Checking for Existing Output.
	SkipIfExists = 3,

	/// # Starting Playback.
	Streaming = 4,

	/// # Consuming Audio.
	Draining = 5,

	/// # Closing the Encoder.
	Finalizing = 6,

	/// # Tagging.
	Tagging = 7,

	/// # Ripped.
	Success = 8,

	/// # Skipped.
	Skipped = 9,

	/// # Failed.
	Failed = 10,

	/// # Aborted.
	Aborted = 11,

	/// # All Done.
	Done = 12,
}

impl RipPhase {
	#[must_use]
	/// # From U8.
	///
	/// Unknown values are treated as `Idle`.
	pub const fn from_u8(src: u8) -> Self {
		match src {
			1 => Self::ResolvingNextTrack,
			2 => Self::AvailabilityCheck,
			3 => Self::SkipIfExists,
			4 => Self::Streaming,
			5 => Self::Draining,
			6 => Self::Finalizing,
			7 => Self::Tagging,
			8 => Self::Success,
			9 => Self::Skipped,
			10 => Self::Failed,
			11 => Self::Aborted,
			12 => Self::Done,
			_ => Self::Idle,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::ResolvingNextTrack => "resolving",
			Self::AvailabilityCheck => "checking availability",
			Self::SkipIfExists => "checking output",
			Self::Streaming => "starting",
			Self::Draining => "ripping",
			Self::Finalizing => "finalizing",
			Self::Tagging => "tagging",
			Self::Success => "ripped",
			Self::Skipped => "skipped",
			Self::Failed => "failed",
			Self::Aborted => "aborted",
			Self::Done => "done",
		}
	}

	#[must_use]
	/// # Is Streaming?
	///
	/// Returns `true` while audio is being consumed.
	pub const fn is_streaming(self) -> bool {
		matches!(self, Self::Streaming | Self::Draining)
	}
}



/// # Rip Manager.
///
/// This holds the session, options, and collaborators, and runs the tracks
/// one at a time on a dedicated thread.
///
/// ## Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use streamrip_core::{
///     FlatPaths,
///     RipOptions,
///     Ripper,
///     WavSession,
/// };
///
/// let session = Arc::new(WavSession::default());
/// let opts = RipOptions::default();
/// let paths = FlatPaths::new("/tmp/rips", opts.profile().format().extension());
/// let handle = Ripper::new(session, opts, paths)
///     .start(["/tmp/song.wav"])
///     .unwrap();
/// let summary = handle.join().unwrap();
/// assert_eq!(summary.failed(), 0);
/// ```
pub struct Ripper<S: Session> {
	session: Arc<S>,
	opts: RipOptions,
	paths: Box<dyn OutputPaths>,
	tagger: Box<dyn Tagger>,
	post: Box<dyn PostRun>,
	journal: Option<RipJournal>,
}

impl<S: Session> fmt::Debug for Ripper<S> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Ripper")
			.field("opts", &self.opts)
			.field("journal", &self.journal.as_ref().map(RipJournal::src))
			.finish_non_exhaustive()
	}
}

impl<S: Session> Ripper<S> {
	#[must_use]
	/// # New.
	///
	/// Tags are left alone and results are recorded by a quiet
	/// [`RipReport`] unless other collaborators are provided.
	pub fn new<P>(session: Arc<S>, opts: RipOptions, paths: P) -> Self
	where P: OutputPaths + 'static {
		Self {
			session,
			opts,
			paths: Box::new(paths),
			tagger: Box::new(NoTags),
			post: Box::new(RipReport::default()),
			journal: None,
		}
	}

	#[must_use]
	/// # With Journal.
	///
	/// Record rip starts and completions so interrupted rips can be noticed
	/// and redone later.
	pub fn with_journal(self, journal: RipJournal) -> Self {
		Self { journal: Some(journal), ..self }
	}

	#[must_use]
	/// # With Post-Run Bookkeeping.
	pub fn with_post_run<P>(self, post: P) -> Self
	where P: PostRun + 'static {
		Self { post: Box::new(post), ..self }
	}

	#[must_use]
	/// # With Tagger.
	pub fn with_tagger<T>(self, tagger: T) -> Self
	where T: Tagger + 'static {
		Self { tagger: Box::new(tagger), ..self }
	}

	/// # Start!
	///
	/// Rip the tracks with the given IDs, in order, on a new thread. Use the
	/// returned handle to watch, steer, or wait for it.
	///
	/// ## Errors
	///
	/// This will return an error if the thread cannot be spawned.
	pub fn start<I, T>(self, tracks: I) -> std::io::Result<RipHandle>
	where I: IntoIterator<Item=T>, T: Into<String> {
		let ids: Vec<String> = tracks.into_iter().map(Into::into).collect();
		let signals = RipSignals::default();
		let board = Arc::new(ProgressBoard::new());
		let (tx, rx) = crossbeam_channel::unbounded();

		let share = RipShare::new(
			signals.clone(),
			Arc::clone(&board),
			tx,
			FrameQueue::new(self.opts.queue_capacity()),
		);
		let handle = std::thread::Builder::new()
			.name("streamrip-rip".to_owned())
			.spawn(move || self.run(&ids, share))?;

		Ok(RipHandle {
			signals,
			board,
			notices: rx,
			handle: Some(handle),
		})
	}
}

impl<S: Session> Ripper<S> {
	/// # Run.
	///
	/// Make sure the encoder exists, start the event pump, rip everything,
	/// and tear it all down again.
	fn run(mut self, ids: &[String], mut share: RipShare) -> Result<RipSummary, StreamRipError> {
		let start = Instant::now();
		if ids.is_empty() {
			share.signals.set_finished();
			return Err(StreamRipError::Noop);
		}
		if let Err(e) = self.opts.profile().validate() {
			share.signals.set_finished();
			return Err(e);
		}

		let mut pump = EventPump::new(self.opts.pump_poll());
		let sink = SessionSink::new(share.queue.clone(), share.signals.clone(), pump.notifier());
		self.session.attach(sink.clone());
		share.sink.replace(sink);
		if pump.start(Arc::clone(&self.session), share.signals.clone()).is_err() {
			share.signals.set_finished();
			return Err(StreamRipError::Session("unable to start the event pump".to_owned()));
		}

		let mut summary = RipSummary::new();
		let res = self.rip_all(ids, &mut share, &mut summary);

		// Teardown.
		share.phase(RipPhase::Done);
		share.log.flush();
		share.signals.set_finished();
		pump.stop();
		pump.join();
		self.save_journal(&share);
		self.post.finish();

		summary.finish(start, share.signals.abort());
		res.map(|()| summary)
	}

	/// # Rip All.
	fn rip_all(&mut self, ids: &[String], share: &mut RipShare, summary: &mut RipSummary)
	-> Result<(), StreamRipError> {
		let loaded = self.prepass(ids, share);
		let total = ids.len();

		for (idx, (id, loaded)) in ids.iter().zip(loaded).enumerate() {
			if share.signals.abort() { break; }

			share.board.set_track(idx, total);
			share.phase(RipPhase::ResolvingNextTrack);
			let track = match loaded {
				Ok(track) => track,
				Err(e) => {
					share.notice(Msg::error(format!("{id}: {e}")).with_newline(true));
					self.post.record_failure(&Track::new(id.as_str(), 0).with_available(false));
					summary.push(id, RipOutcome::Failed(e));
					continue;
				},
			};

			if self.opts.verbose() { share.log.track(idx, &track); }
			let outcome = self.rip_one(idx, total, &track, share)?;
			match &outcome {
				RipOutcome::Ripped(dst) => self.post.record_success(&track, dst),
				RipOutcome::Skipped(SkipReason::Exists) => {},
				RipOutcome::Skipped(SkipReason::User) |
				RipOutcome::Failed(_) |
				RipOutcome::Aborted => self.post.record_failure(&track),
			}

			share.est.end_track();
			share.board.publish(&share.est);

			let stop = matches!(outcome, RipOutcome::Aborted);
			summary.push(id, outcome);
			if stop { break; }
		}

		Ok(())
	}

	/// # Pre-Pass.
	///
	/// Load each track up front so the aggregate duration is known. Tracks
	/// that are unavailable or will be skipped don't count toward the total.
	fn prepass(&self, ids: &[String], share: &mut RipShare)
	-> Vec<Result<Track, StreamRipError>> {
		share.phase(RipPhase::ResolvingNextTrack);
		let mut out = Vec::with_capacity(ids.len());
		let mut duration = 0_u64;
		let mut count = 0_usize;
		for (idx, id) in ids.iter().enumerate() {
			if share.signals.abort() { break; }
			let res = self.session.load(id);
			if let Ok(track) = &res {
				if track.is_available() {
					let dst = self.paths.resolve_output_path(track, idx);
					if ! self.should_skip(&dst, track) {
						duration += u64::from(track.duration());
						count += 1;
					}
				}
			}
			out.push(res);
		}

		share.est.prepare_run(duration, count);
		share.board.publish(&share.est);
		out
	}

	/// # Rip One Track.
	///
	/// Take a single track from availability check through tagging. Track
	/// problems are returned as outcomes; only bugs escape as errors.
	fn rip_one(&mut self, idx: usize, total: usize, track: &Track, share: &mut RipShare)
	-> Result<RipOutcome, StreamRipError> {
		share.phase(RipPhase::AvailabilityCheck);
		if ! track.is_available() {
			let e = StreamRipError::Unavailable(track.id().to_owned());
			share.notice(Msg::warning(format!("{track}: {e}")).with_newline(true));
			share.phase(RipPhase::Failed);
			return Ok(RipOutcome::Failed(e));
		}

		let dst = self.paths.resolve_output_path(track, idx);
		share.phase(RipPhase::SkipIfExists);
		if self.should_skip(&dst, track) {
			share.notice(Msg::new(("Skipped", 11), format!(
				concat!("{} ", dim!("(already ripped)")),
				track,
			)).with_newline(true));
			share.phase(RipPhase::Skipped);
			return Ok(RipOutcome::Skipped(SkipReason::Exists));
		}

		share.notice(Msg::new(("Ripping", 199), format!(
			concat!("[{}/{}] {}\n         ", dim!("{}")),
			idx + 1,
			total,
			track,
			dst.to_string_lossy(),
		)).with_newline(true));

		match self.stream(track, &dst, share) {
			Ok(TrackEnd::Finished) => {},
			Ok(TrackEnd::Skipped) => {
				self.cancel(&dst, share);
				share.signals.clear_skip();
				share.notice(Msg::new(("Skipped", 11), format!(
					concat!("{} ", dim!("(by request)")),
					track,
				)).with_newline(true));
				share.phase(RipPhase::Skipped);
				return Ok(RipOutcome::Skipped(SkipReason::User));
			},
			Err(StreamRipError::Killed) => {
				self.cancel(&dst, share);
				share.phase(RipPhase::Aborted);
				return Ok(RipOutcome::Aborted);
			},
			Err(e @ StreamRipError::Bug(_)) => {
				self.cancel(&dst, share);
				return Err(e);
			},
			Err(e) => {
				self.cancel(&dst, share);
				share.notice(Msg::warning(format!("{track}: {e}")).with_newline(true));
				share.log.add(RipLogEvent::Error(e.clone()));
				share.phase(RipPhase::Failed);
				return Ok(RipOutcome::Failed(e));
			},
		}

		// Close the encoder.
		share.phase(RipPhase::Finalizing);
		let job = share.job.take().ok_or(StreamRipError::Bug("rip job went missing"))?;
		match job.finish() {
			Ok((code, written)) => {
				share.log.add(RipLogEvent::Written(written));
				share.log.add(RipLogEvent::ExitCode(code));
				if code != 0 {
					share.notice(Msg::warning(format!(
						"The encoder exited with code {code}; keeping the rip anyway.",
					)).with_newline(true));
				}
			},
			Err(e) => {
				self.cancel(&dst, share);
				share.notice(Msg::warning(format!("{track}: {e}")).with_newline(true));
				share.log.add(RipLogEvent::Error(e.clone()));
				share.phase(RipPhase::Failed);
				return Ok(RipOutcome::Failed(e));
			},
		}
		share.est.complete_song();
		share.board.publish(&share.est);

		// Tag it.
		share.phase(RipPhase::Tagging);
		if let Err(e) = self.tagger.apply_metadata(&dst, track) {
			share.notice(Msg::warning(e.to_string()).with_newline(true));
			share.log.add(RipLogEvent::Error(e));
		}

		if let Some(journal) = self.journal.as_mut() { journal.complete(&dst, track); }
		self.save_journal(share);

		share.notice(Msg::success(format!("Ripped {track}.")).with_newline(true));
		share.phase(RipPhase::Success);
		Ok(RipOutcome::Ripped(dst))
	}

	/// # Stream.
	///
	/// Open the output, start playback, and drain the queue into it until the
	/// track ends, the user intervenes, or the stream stalls out.
	fn stream(&mut self, track: &Track, dst: &Path, share: &mut RipShare)
	-> Result<TrackEnd, StreamRipError> {
		// Start clean.
		share.signals.clear_skip();
		share.signals.clear_end_of_track();
		let stale = share.queue.discard_pending();
		if stale != 0 { share.log.add(RipLogEvent::Discarded(stale)); }
		let _res = share.queue.take_dropped();
		if let Some(sink) = share.sink.as_ref() { let _res = sink.take_stream_error(); }
		share.est.prepare_track(track.duration());
		share.board.publish(&share.est);

		// Open the job.
		share.phase(RipPhase::Streaming);
		if share.job.is_some() {
			return Err(StreamRipError::Bug("a rip job is already open"));
		}
		if let Some(parent) = dst.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|_| StreamRipError::Write(parent.to_string_lossy().into_owned()))?;
		}
		share.job.replace(RipJob::open(dst, &self.opts.profile(), &share.signals)?);
		if let Some(journal) = self.journal.as_mut() { journal.begin(dst, track); }
		self.save_journal(share);

		self.session.prepare(track)?;
		self.session.play()?;

		// Drain.
		share.phase(RipPhase::Draining);
		let poll = self.opts.poll();
		let limit = self.opts.stall_limit();
		let mut stall = 0_u16;
		let mut last_tick = Instant::now();
		share.est.tick(true, last_tick);

		loop {
			if share.signals.abort() { return Err(StreamRipError::Killed); }
			if share.signals.skip() { return Ok(TrackEnd::Skipped); }
			if let Some(e) = share.sink.as_ref().and_then(SessionSink::take_stream_error) {
				return Err(StreamRipError::Session(e));
			}
			if share.signals.end_of_track() && share.queue.is_empty() { break; }

			if let Some(chunk) = share.queue.dequeue(poll) {
				stall = 0;
				share.job.as_mut()
					.ok_or(StreamRipError::Bug("rip job went missing"))?
					.write(&chunk)?;
				share.est.push(chunk.frames(), chunk.sample_rate());
			}
			else if ! share.signals.end_of_track() {
				stall = stall.saturating_add(1);
				if stall == 1 || stall % 10 == 0 { share.log.add(RipLogEvent::Stall(stall)); }
				if limit < stall {
					let secs = poll.saturating_mul(u32::from(stall)).as_secs();
					return Err(StreamRipError::Stall(u32::try_from(secs).unwrap_or(u32::MAX)));
				}
			}

			let dropped = share.queue.take_dropped();
			if dropped != 0 { share.log.add(RipLogEvent::Dropped(dropped)); }

			let now = Instant::now();
			if PROGRESS_TICK <= now.saturating_duration_since(last_tick) {
				share.est.tick(share.signals.ripping(), now);
				last_tick = now;
			}
			share.board.publish(&share.est);
		}

		self.session.stop();
		Ok(TrackEnd::Finished)
	}

	/// # Cancel.
	///
	/// Stop playback and throw away the current job, if any, along with its
	/// output file.
	fn cancel(&mut self, dst: &Path, share: &mut RipShare) {
		self.session.stop();
		if let Some(job) = share.job.take() { job.discard(); }
		if let Some(journal) = self.journal.as_mut() { journal.forget(dst); }
		self.save_journal(share);
	}

	/// # Save Journal.
	///
	/// A journal that can't be written doesn't stop the rip, but the user
	/// should hear about it.
	fn save_journal(&self, share: &RipShare) {
		if let Some(journal) = self.journal.as_ref() {
			if let Err(e) = journal.save() {
				share.notice(Msg::from(e).with_newline(true));
			}
		}
	}

	/// # Should Skip?
	///
	/// Existing files are skipped unless overwriting is enabled or they look
	/// like partial rips.
	fn should_skip(&self, dst: &Path, track: &Track) -> bool {
		! self.opts.overwrite() &&
		dst.exists() &&
		! self.paths.path_appears_partial(dst, track) &&
		! self.journal.as_ref().is_some_and(|j|
			j.appears_partial(dst, track, self.opts.partial_check())
		)
	}
}



#[derive(Debug)]
/// # Rip Handle.
///
/// This is returned by [`Ripper::start`] and can be used to steer the run,
/// peek at its progress, or wait for it to finish.
///
/// Dropping the handle without joining aborts the run.
pub struct RipHandle {
	signals: RipSignals,
	board: Arc<ProgressBoard>,
	notices: Receiver<Msg>,
	handle: Option<JoinHandle<Result<RipSummary, StreamRipError>>>,
}

impl Drop for RipHandle {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			self.signals.request_abort();
			let _res = handle.join();
		}
	}
}

impl RipHandle {
	/// # Join.
	///
	/// Wait for the run to finish and return its summary.
	///
	/// ## Errors
	///
	/// This will return an error if there was nothing to rip, the encoder is
	/// not installed, the event pump could not be started, or something
	/// unexpected went wrong with the rip thread.
	pub fn join(mut self) -> Result<RipSummary, StreamRipError> {
		let handle = self.handle.take().ok_or(StreamRipError::Bug("rip thread already joined"))?;
		handle.join().map_err(|_| StreamRipError::Bug("the rip thread panicked"))?
	}

	#[must_use]
	/// # Is Finished?
	pub fn is_finished(&self) -> bool {
		self.handle.as_ref().map_or(true, JoinHandle::is_finished)
	}

	#[must_use]
	/// # Notices.
	///
	/// Return any status messages generated since the last call, in order.
	pub fn notices(&self) -> Vec<Msg> { self.notices.try_iter().collect() }

	#[must_use]
	/// # Phase.
	pub fn phase(&self) -> RipPhase { self.board.phase() }

	#[must_use]
	/// # Progress.
	pub fn progress(&self) -> ProgressSnapshot { self.board.snapshot() }

	#[inline]
	/// # Request Abort.
	///
	/// Stop the current track (removing its partial output) and skip
	/// everything after it.
	pub fn request_abort(&self) { self.signals.request_abort(); }

	#[inline]
	/// # Request Skip.
	///
	/// Give up on the current track, removing its partial output, and move on
	/// to the next one. This has no effect if nothing is actively ripping.
	pub fn request_skip(&self) { self.signals.request_skip(); }

	#[must_use]
	/// # Signals.
	///
	/// Return a copy of the run's signals, e.g. for a CTRL+C handler.
	pub fn signals(&self) -> RipSignals { self.signals.clone() }
}



/// # Shared Run State.
///
/// Everything the rip thread needs to keep track of between calls.
struct RipShare {
	signals: RipSignals,
	board: Arc<ProgressBoard>,
	notices: Sender<Msg>,
	queue: FrameQueue,
	sink: Option<SessionSink>,
	est: ProgressEstimator,
	log: RipLog,
	job: Option<RipJob>,
}

impl RipShare {
	/// # New.
	fn new(
		signals: RipSignals,
		board: Arc<ProgressBoard>,
		notices: Sender<Msg>,
		queue: FrameQueue,
	) -> Self {
		Self {
			signals,
			board,
			notices,
			queue,
			sink: None,
			est: ProgressEstimator::new(),
			log: RipLog::new(),
			job: None,
		}
	}

	/// # Notice.
	fn notice(&self, msg: Msg) { let _res = self.notices.send(msg); }

	/// # Set Phase.
	fn phase(&mut self, phase: RipPhase) {
		self.board.set_phase(phase);
		self.log.add(RipLogEvent::Phase(phase));
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # How Draining Ended.
enum TrackEnd {
	/// # End of Track.
	Finished,

	/// # User Skip.
	Skipped,
}



/// # Rip Job.
///
/// The output side of a single track. The `ripping` signal is raised for as
/// long as one of these is open; dropping an unfinished job aborts the
/// encoder and deletes the partial file.
struct RipJob {
	dst: PathBuf,
	encoder: EncoderProcess,
	signals: RipSignals,
	closed: bool,
}

impl Drop for RipJob {
	fn drop(&mut self) {
		if ! self.closed {
			self.signals.clear_ripping();
			self.encoder.abort();
			let _res = std::fs::remove_file(&self.dst);
		}
	}
}

impl RipJob {
	/// # Open.
	///
	/// Remove whatever might already be at `dst` and start the encoder.
	fn open(dst: &Path, profile: &EncoderProfile, signals: &RipSignals)
	-> Result<Self, StreamRipError> {
		if dst.exists() {
			std::fs::remove_file(dst)
				.map_err(|_| StreamRipError::Write(dst.to_string_lossy().into_owned()))?;
		}

		let encoder = EncoderProcess::start(dst, profile)?;
		signals.set_ripping();
		Ok(Self {
			dst: dst.to_path_buf(),
			encoder,
			signals: signals.clone(),
			closed: false,
		})
	}

	/// # Write.
	fn write(&mut self, chunk: &crate::FrameChunk) -> Result<(), StreamRipError> {
		self.encoder.write(chunk)
	}

	/// # Finish.
	///
	/// Close the encoder, returning its exit code and the number of bytes
	/// fed to it. If this fails, the output is discarded.
	fn finish(mut self) -> Result<(i32, u64), StreamRipError> {
		self.signals.clear_ripping();
		let code = self.encoder.finish()?;
		self.closed = true;
		Ok((code, self.encoder.written()))
	}

	/// # Discard.
	fn discard(self) { drop(self); }
}
