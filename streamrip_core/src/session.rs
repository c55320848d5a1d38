/*!
# StreamRip: Session and Collaborators
*/

use crate::{
	SessionSink,
	StreamRipError,
};
use std::{
	fmt,
	path::{
		Path,
		PathBuf,
	},
	time::Duration,
};



/// # Maximum Path Component Length (bytes).
const MAX_COMPONENT: usize = 255;



/// # Streaming Session.
///
/// This is the opaque thing on the other end of the wire: it resolves tracks,
/// plays them, and pushes decoded audio back through the [`SessionSink`] it
/// was attached to.
///
/// Implementations are expected to deliver audio from their own thread(s),
/// and may also invoke sink callbacks from within
/// [`Session::process_events`], which runs on the event pump thread.
pub trait Session: Send + Sync + 'static {
	/// # Attach.
	///
	/// Register the sink that will receive this session's callbacks. This is
	/// called once, before anything else.
	fn attach(&self, sink: SessionSink);

	/// # Process Events.
	///
	/// Run the session's internal event processing and return how long it
	/// would like to wait before being called again.
	fn process_events(&self) -> Duration;

	/// # Load Track.
	///
	/// Resolve a track ID into its metadata, including whether or not it can
	/// actually be played.
	///
	/// ## Errors
	///
	/// Implementations should return an error if the track cannot be
	/// resolved at all.
	fn load(&self, id: &str) -> Result<Track, StreamRipError>;

	/// # Prepare Playback.
	///
	/// Load the track into the player.
	///
	/// ## Errors
	///
	/// Implementations should return an error if the track cannot be loaded.
	fn prepare(&self, track: &Track) -> Result<(), StreamRipError>;

	/// # Play.
	///
	/// Start streaming the prepared track.
	///
	/// ## Errors
	///
	/// Implementations should return an error if playback cannot start.
	fn play(&self) -> Result<(), StreamRipError>;

	/// # Stop.
	///
	/// Stop playback. This must be safe to call at any time, including when
	/// nothing is playing.
	fn stop(&self);
}

/// # Tagger.
///
/// Writes metadata into a freshly ripped file.
pub trait Tagger: Send {
	/// # Apply Metadata.
	///
	/// ## Errors
	///
	/// Failures are logged by the ripper but do not invalidate the rip.
	fn apply_metadata(&self, dst: &Path, track: &Track) -> Result<(), StreamRipError>;
}

/// # Output Paths.
///
/// Decides where each track ends up.
pub trait OutputPaths: Send {
	/// # Resolve Output Path.
	///
	/// Note `idx` is the zero-based position of the track within the run.
	fn resolve_output_path(&self, track: &Track, idx: usize) -> PathBuf;

	/// # Path Appears Partial?
	///
	/// Return `true` if an existing file at `dst` looks like an interrupted
	/// rip of `track` that should be redone.
	fn path_appears_partial(&self, _dst: &Path, _track: &Track) -> bool { false }
}

/// # Post-Run Bookkeeping.
pub trait PostRun: Send {
	/// # Record Success.
	fn record_success(&mut self, track: &Track, dst: &Path);

	/// # Record Failure.
	fn record_failure(&mut self, track: &Track);

	/// # Finish.
	///
	/// Called once, after the last track.
	fn finish(&mut self) {}
}



#[derive(Debug, Clone, Default, Eq, PartialEq)]
/// # Track.
///
/// Basic track metadata, as resolved by the session.
pub struct Track {
	id: String,
	name: String,
	artists: Vec<String>,
	album: String,
	number: u16,
	disc: u16,
	duration: u32,
	available: bool,
}

impl fmt::Display for Track {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.artists.first(), self.name.is_empty()) {
			(Some(a), false) => write!(f, "{a} - {}", self.name),
			(None, false) => f.write_str(&self.name),
			_ => f.write_str(&self.id),
		}
	}
}

/// ## Setters.
impl Track {
	#[must_use]
	/// # New.
	///
	/// Create a new, available track with the given ID and duration (in
	/// milliseconds).
	pub fn new<S>(id: S, duration: u32) -> Self
	where S: Into<String> {
		Self {
			id: id.into(),
			duration,
			available: true,
			..Self::default()
		}
	}

	#[must_use]
	/// # With Album.
	pub fn with_album<S>(self, album: S) -> Self
	where S: Into<String> {
		Self { album: album.into(), ..self }
	}

	#[must_use]
	/// # With Artist.
	///
	/// Artists are kept in the order added; the first is the primary.
	pub fn with_artist<S>(mut self, artist: S) -> Self
	where S: Into<String> {
		self.artists.push(artist.into());
		self
	}

	#[must_use]
	/// # With Availability.
	pub fn with_available(self, available: bool) -> Self {
		Self { available, ..self }
	}

	#[must_use]
	/// # With Disc Number.
	pub fn with_disc(self, disc: u16) -> Self { Self { disc, ..self } }

	#[must_use]
	/// # With Name.
	pub fn with_name<S>(self, name: S) -> Self
	where S: Into<String> {
		Self { name: name.into(), ..self }
	}

	#[must_use]
	/// # With Track Number.
	pub fn with_number(self, number: u16) -> Self { Self { number, ..self } }
}

/// ## Getters.
impl Track {
	#[must_use]
	/// # Album.
	pub fn album(&self) -> &str { &self.album }

	#[must_use]
	/// # Artists.
	pub fn artists(&self) -> &[String] { &self.artists }

	#[must_use]
	/// # Disc Number.
	pub const fn disc(&self) -> u16 { self.disc }

	#[must_use]
	/// # Duration (Milliseconds).
	pub const fn duration(&self) -> u32 { self.duration }

	#[must_use]
	/// # ID.
	pub fn id(&self) -> &str { &self.id }

	#[must_use]
	/// # Available?
	pub const fn is_available(&self) -> bool { self.available }

	#[must_use]
	/// # Name.
	pub fn name(&self) -> &str { &self.name }

	#[must_use]
	/// # Track Number.
	pub const fn number(&self) -> u16 { self.number }
}



#[derive(Debug, Clone, Copy, Default)]
/// # No Tags.
///
/// A [`Tagger`] that leaves files exactly as the encoder wrote them.
pub struct NoTags;

impl Tagger for NoTags {
	#[inline]
	fn apply_metadata(&self, _dst: &Path, _track: &Track) -> Result<(), StreamRipError> {
		Ok(())
	}
}



#[derive(Debug, Clone)]
/// # Flat Paths.
///
/// Put everything in one directory, named like `01 - Artist - Name.ext`.
///
/// The number is the track's own, if the session knows it, otherwise its
/// position in the run. Tracks from a second (or later) disc get a disc
/// prefix too, like `2-01 - Artist - Name.ext`.
pub struct FlatPaths {
	dir: PathBuf,
	ext: &'static str,
}

impl FlatPaths {
	#[must_use]
	/// # New.
	pub fn new<P>(dir: P, ext: &'static str) -> Self
	where P: Into<PathBuf> {
		Self { dir: dir.into(), ext }
	}
}

impl OutputPaths for FlatPaths {
	fn resolve_output_path(&self, track: &Track, idx: usize) -> PathBuf {
		let num = match track.number() {
			0 => idx + 1,
			n => usize::from(n),
		};
		let stem =
			if 1 < track.disc() { format!("{}-{num:02} - {track}", track.disc()) }
			else { format!("{num:02} - {track}") };
		let stem = sanitize_component(&stem, MAX_COMPONENT - self.ext.len() - 1);
		self.dir.join(format!("{stem}.{}", self.ext))
	}
}



/// # Sanitize Path Component.
///
/// Replace characters that are illegal (or just annoying) in file names, and
/// truncate the result to at most `max` bytes without splitting a character.
fn sanitize_component(src: &str, max: usize) -> String {
	let mut out: String = src.chars()
		.map(|c| match c {
			'/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
			c if c.is_control() => '_',
			c => c,
		})
		.collect();

	if max < out.len() {
		let mut end = max;
		while ! out.is_char_boundary(end) { end -= 1; }
		out.truncate(end);
	}

	let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.');
	if trimmed.is_empty() { "_".to_owned() }
	else { trimmed.to_owned() }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_track_display() {
		let track = Track::new("id:1", 1000);
		assert_eq!(track.to_string(), "id:1");

		let track = track.with_name("Hello");
		assert_eq!(track.to_string(), "Hello");

		let track = track.with_artist("World").with_artist("Guest");
		assert_eq!(track.to_string(), "World - Hello");
		assert_eq!(track.artists().len(), 2);
		assert!(track.is_available());
		assert!(! track.with_available(false).is_available());
	}

	#[test]
	fn t_flat_paths() {
		let paths = FlatPaths::new("/tmp/rips", "mp3");
		let track = Track::new("id:1", 1000)
			.with_name("What/Ever?")
			.with_artist("AC:DC");
		assert_eq!(
			paths.resolve_output_path(&track, 2),
			PathBuf::from("/tmp/rips/03 - AC_DC - What_Ever_.mp3"),
		);
		assert!(! paths.path_appears_partial(Path::new("/tmp/rips/x.mp3"), &track));

		// Catalog numbering wins.
		let track = track.with_number(7);
		assert_eq!(
			paths.resolve_output_path(&track, 2),
			PathBuf::from("/tmp/rips/07 - AC_DC - What_Ever_.mp3"),
		);
		let track = track.with_disc(2).with_album("Live");
		assert_eq!(
			paths.resolve_output_path(&track, 2),
			PathBuf::from("/tmp/rips/2-07 - AC_DC - What_Ever_.mp3"),
		);
		assert_eq!(track.album(), "Live");
	}

	#[test]
	fn t_sanitize() {
		assert_eq!(sanitize_component("  ..  ", 255), "_");
		assert_eq!(sanitize_component("a\tb", 255), "a_b");

		// Truncation must respect character boundaries.
		let long = "é".repeat(200);
		let out = sanitize_component(&long, 255);
		assert!(out.len() <= 255);
		assert!(out.chars().all(|c| c == 'é'));
	}
}
