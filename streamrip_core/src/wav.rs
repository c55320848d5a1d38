/*!
# StreamRip: WAV Session
*/

use crate::{
	CHANNELS,
	ConnectionState,
	SAMPLE_RATE,
	Session,
	SessionSink,
	StreamRipError,
	Track,
};
use hound::{
	SampleFormat,
	WavReader,
};
use std::{
	path::{
		Path,
		PathBuf,
	},
	sync::{
		Arc,
		Mutex,
		atomic::{
			AtomicBool,
			Ordering::SeqCst,
		},
	},
	thread::JoinHandle,
	time::Duration,
};



/// # Frames Per Delivery.
const CHUNK_FRAMES: u32 = 2048;

/// # Samples Per Delivery.
const CHUNK_SAMPLES: usize = 2048 * 2;

/// # Event Interval.
const EVENT_INTERVAL: Duration = Duration::from_secs(1);

/// # Redelivery Wait.
const RETRY_WAIT: Duration = Duration::from_millis(5);



#[derive(Debug, Default)]
/// # WAV Session.
///
/// A [`Session`] that "streams" local WAV files, treating each file path as
/// a track ID. Only 16-bit stereo files at 44.1kHz are playable; anything
/// else loads as unavailable.
///
/// Audio is delivered from a dedicated thread as fast as the ripper will
/// take it.
pub struct WavSession {
	sink: Mutex<Option<SessionSink>>,
	current: Mutex<Option<PathBuf>>,
	player: Mutex<Option<JoinHandle<()>>>,
	halt: Arc<AtomicBool>,
}

impl Drop for WavSession {
	fn drop(&mut self) { self.stop(); }
}

impl Session for WavSession {
	fn attach(&self, sink: SessionSink) {
		sink.connection_state_changed(ConnectionState::LoggedIn);
		if let Ok(mut guard) = self.sink.lock() { guard.replace(sink); }
	}

	fn process_events(&self) -> Duration { EVENT_INTERVAL }

	fn load(&self, id: &str) -> Result<Track, StreamRipError> {
		let src = Path::new(id);
		let reader = WavReader::open(src)
			.map_err(|_| StreamRipError::Unavailable(id.to_owned()))?;
		let spec = reader.spec();
		let available =
			spec.channels == CHANNELS &&
			spec.sample_rate == SAMPLE_RATE &&
			spec.bits_per_sample == 16 &&
			spec.sample_format == SampleFormat::Int;

		// Frames to milliseconds.
		let duration = u64::from(reader.duration()) * 1000 / u64::from(spec.sample_rate.max(1));
		let name = src.file_stem()
			.map_or_else(|| id.to_owned(), |s| s.to_string_lossy().into_owned());

		Ok(
			Track::new(id, u32::try_from(duration).unwrap_or(u32::MAX))
				.with_name(name)
				.with_available(available)
		)
	}

	fn prepare(&self, track: &Track) -> Result<(), StreamRipError> {
		self.stop();
		let src = PathBuf::from(track.id());
		if ! src.is_file() {
			return Err(StreamRipError::Unavailable(track.id().to_owned()));
		}
		let mut guard = self.current.lock()
			.map_err(|_| StreamRipError::Bug("session lock poisoned"))?;
		guard.replace(src);
		Ok(())
	}

	fn play(&self) -> Result<(), StreamRipError> {
		let src = self.current.lock()
			.map_err(|_| StreamRipError::Bug("session lock poisoned"))?
			.clone()
			.ok_or_else(|| StreamRipError::Session("no track has been prepared".to_owned()))?;
		let sink = self.sink.lock()
			.map_err(|_| StreamRipError::Bug("session lock poisoned"))?
			.clone()
			.ok_or_else(|| StreamRipError::Session("the session is not attached".to_owned()))?;
		let reader = WavReader::open(&src)
			.map_err(|_| StreamRipError::Read(src.to_string_lossy().into_owned()))?;

		self.stop();
		self.halt.store(false, SeqCst);
		let halt = Arc::clone(&self.halt);
		let handle = std::thread::Builder::new()
			.name("streamrip-wav".to_owned())
			.spawn(move || deliver(reader, &sink, &halt))
			.map_err(|_| StreamRipError::Session("unable to start playback".to_owned()))?;

		let mut guard = self.player.lock()
			.map_err(|_| StreamRipError::Bug("session lock poisoned"))?;
		guard.replace(handle);
		Ok(())
	}

	fn stop(&self) {
		self.halt.store(true, SeqCst);
		let handle = self.player.lock().ok().and_then(|mut guard| guard.take());
		if let Some(handle) = handle { let _res = handle.join(); }
	}
}



/// # Deliver.
///
/// Feed the whole file to the sink, chunk by chunk, then signal the end of
/// the track. Refused chunks are retried until accepted or halted.
fn deliver<R: std::io::Read>(mut reader: WavReader<R>, sink: &SessionSink, halt: &AtomicBool) {
	let mut buf: Vec<u8> = Vec::with_capacity(CHUNK_SAMPLES * 2);
	let mut samples = reader.samples::<i16>();

	loop {
		buf.truncate(0);
		for _ in 0..CHUNK_SAMPLES {
			match samples.next() {
				Some(Ok(s)) => buf.extend_from_slice(&s.to_le_bytes()),
				Some(Err(e)) => {
					sink.stream_error(format!("unable to read audio: {e}"));
					return;
				},
				None => break,
			}
		}
		if buf.is_empty() { break; }

		let frames = u32::try_from(buf.len() / 4).unwrap_or(CHUNK_FRAMES);
		while sink.music_delivery(SAMPLE_RATE, frames, &buf) == 0 {
			if halt.load(SeqCst) { return; }
			std::thread::sleep(RETRY_WAIT);
		}
		if halt.load(SeqCst) { return; }
	}

	sink.end_of_track();
	sink.notify_main_thread();
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		EventPump,
		FrameQueue,
		RipSignals,
	};

	/// # Write a Test File.
	fn write_wav(dst: &Path, channels: u16, frames: u32) {
		let spec = hound::WavSpec {
			channels,
			sample_rate: SAMPLE_RATE,
			bits_per_sample: 16,
			sample_format: SampleFormat::Int,
		};
		let mut writer = hound::WavWriter::create(dst, spec).expect("Create failed.");
		for i in 0..frames * u32::from(channels) {
			writer.write_sample((i % 1000) as i16).expect("Write failed.");
		}
		writer.finalize().expect("Finalize failed.");
	}

	#[test]
	fn t_load() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let good = dir.path().join("Good Song.wav");
		let mono = dir.path().join("mono.wav");
		write_wav(&good, 2, 44_100);
		write_wav(&mono, 1, 100);

		let session = WavSession::default();
		let track = session.load(&good.to_string_lossy()).expect("Load failed.");
		assert!(track.is_available());
		assert_eq!(track.duration(), 1000);
		assert_eq!(track.name(), "Good Song");

		let track = session.load(&mono.to_string_lossy()).expect("Load failed.");
		assert!(! track.is_available());

		assert!(matches!(
			session.load(&dir.path().join("nope.wav").to_string_lossy()),
			Err(StreamRipError::Unavailable(_)),
		));
	}

	#[test]
	fn t_play() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let src = dir.path().join("song.wav");
		write_wav(&src, 2, 5000);

		let queue = FrameQueue::new(None);
		let signals = RipSignals::default();
		let pump = EventPump::new(Duration::from_millis(10));
		let sink = SessionSink::new(queue.clone(), signals.clone(), pump.notifier());

		let session = WavSession::default();
		session.attach(sink.clone());
		assert_eq!(sink.connection(), ConnectionState::LoggedIn);

		let track = session.load(&src.to_string_lossy()).expect("Load failed.");
		session.prepare(&track).expect("Prepare failed.");
		session.play().expect("Play failed.");

		let mut frames = 0;
		let mut bytes = Vec::new();
		while let Some(chunk) = queue.dequeue(Duration::from_secs(2)) {
			assert_eq!(chunk.sample_rate(), SAMPLE_RATE);
			frames += chunk.frames();
			bytes.extend_from_slice(chunk.payload());
			if signals.end_of_track() && queue.is_empty() { break; }
		}
		session.stop();

		assert!(signals.end_of_track());
		assert_eq!(frames, 5000);
		assert_eq!(bytes.len(), 5000 * 4);
		assert_eq!(&bytes[..4], &[0, 0, 1, 0]);
	}
}
