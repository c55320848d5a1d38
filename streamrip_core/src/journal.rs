/*!
# StreamRip: Rip Journal
*/

use crate::{
	StreamRipError,
	Track,
	utility::{
		zstd_decode,
		zstd_encode,
	},
};
use serde::{
	Deserialize,
	Serialize,
};
use std::{
	collections::BTreeMap,
	fmt,
	path::{
		Path,
		PathBuf,
	},
};
use utc2k::Utc2k;



/// # Journal Directory.
///
/// This is created inside the output directory.
pub const JOURNAL_BASE: &str = "_streamrip";

/// # Journal File Name.
const JOURNAL_FILE: &str = "journal";

/// # Magic Header.
const MAGIC: [u8; 8] = *b"SRip0001";

/// # Header Length (magic + CRC32).
const HEADER_LEN: usize = MAGIC.len() + 4;



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Partial Check.
///
/// How suspicious to be of files that already exist.
pub enum PartialCheck {
	/// # Trust Everything.
	None,

	#[default]
	/// # Distrust Known Problems.
	///
	/// A file is partial if the journal says it was never finished, or if its
	/// size no longer matches what was recorded. Files the journal knows
	/// nothing about are trusted.
	Weak,

	/// # Trust Nothing Unverified.
	///
	/// A file is partial unless the journal has a matching, completed entry
	/// for it.
	Strict,
}

impl fmt::Display for PartialCheck {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl PartialCheck {
	#[must_use]
	/// # Parse.
	pub fn parse(src: &str) -> Option<Self> {
		match src.trim().to_ascii_lowercase().as_str() {
			"none" => Some(Self::None),
			"weak" => Some(Self::Weak),
			"strict" => Some(Self::Strict),
			_ => None,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Weak => "weak",
			Self::Strict => "strict",
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
/// # Entry State.
enum JournalState {
	/// # Started, Not Finished.
	Pending,

	/// # Finished.
	Complete {
		size: u64,
		duration: u32,
	},
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
/// # Journal Entry.
struct JournalEntry {
	id: String,
	state: JournalState,
	when: u32,
}



#[derive(Debug, Clone)]
/// # Rip Journal.
///
/// This keeps track of which output files were started and which were
/// actually finished, so later runs can tell an interrupted rip from a good
/// one.
///
/// The journal lives at `DIR/_streamrip/journal`. It is a small binary file:
/// an eight-byte magic header, a CRC32 of the payload, and the
/// zstd-compressed, bincode-serialized entries.
pub struct RipJournal {
	src: PathBuf,
	entries: BTreeMap<String, JournalEntry>,
}

impl RipJournal {
	/// # Open.
	///
	/// Load the journal for the output directory `dir`, or start a new one if
	/// none exists.
	///
	/// ## Errors
	///
	/// This will return an error if an existing journal cannot be read or is
	/// corrupt.
	pub fn open<P>(dir: P) -> Result<Self, StreamRipError>
	where P: AsRef<Path> {
		let src = dir.as_ref().join(JOURNAL_BASE).join(JOURNAL_FILE);
		let entries =
			if src.is_file() {
				let raw = std::fs::read(&src).map_err(|_| journal_err(&src))?;
				decode(&raw).ok_or_else(|| journal_err(&src))?
			}
			else { BTreeMap::new() };

		Ok(Self { src, entries })
	}

	#[must_use]
	/// # Source Path.
	pub fn src(&self) -> &Path { &self.src }

	#[must_use]
	/// # Length.
	pub fn len(&self) -> usize { self.entries.len() }

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	/// # Begin.
	///
	/// Note that a rip of `track` into `dst` has started.
	pub fn begin(&mut self, dst: &Path, track: &Track) {
		self.entries.insert(key(dst), JournalEntry {
			id: track.id().to_owned(),
			state: JournalState::Pending,
			when: utc2k::unixtime(),
		});
	}

	/// # Complete.
	///
	/// Note that a rip of `track` into `dst` has finished, recording the
	/// file's current size.
	pub fn complete(&mut self, dst: &Path, track: &Track) {
		let size = std::fs::metadata(dst).map_or(0, |m| m.len());
		self.entries.insert(key(dst), JournalEntry {
			id: track.id().to_owned(),
			state: JournalState::Complete { size, duration: track.duration() },
			when: utc2k::unixtime(),
		});
	}

	/// # Forget.
	pub fn forget(&mut self, dst: &Path) { self.entries.remove(&key(dst)); }

	#[must_use]
	/// # Appears Partial?
	///
	/// Judge whether the existing file at `dst` looks like an incomplete rip
	/// of `track`, per the `check` policy.
	pub fn appears_partial(&self, dst: &Path, track: &Track, check: PartialCheck) -> bool {
		let entry = self.entries.get(&key(dst))
			.filter(|e| e.id == track.id());

		match (check, entry.map(|e| e.state)) {
			(PartialCheck::None, _) | (PartialCheck::Weak, None) => false,
			(PartialCheck::Weak, Some(JournalState::Complete { size, .. })) =>
				size_mismatch(dst, size),
			(PartialCheck::Strict, Some(JournalState::Complete { size, duration })) =>
				duration != track.duration() || size_mismatch(dst, size),
			(_, Some(JournalState::Pending)) | (PartialCheck::Strict, None) => true,
		}
	}

	#[must_use]
	/// # Last Updated.
	///
	/// Return the time the entry for `dst` was last written, if any.
	pub fn updated(&self, dst: &Path) -> Option<Utc2k> {
		self.entries.get(&key(dst)).map(|e| Utc2k::from(e.when))
	}

	/// # Save.
	///
	/// Write the journal to disk, replacing any previous copy.
	///
	/// ## Errors
	///
	/// This will return an error if the journal cannot be serialized or
	/// written.
	pub fn save(&self) -> Result<(), StreamRipError> {
		let data = encode(&self.entries).ok_or_else(|| journal_err(&self.src))?;
		if let Some(parent) = self.src.parent() {
			std::fs::create_dir_all(parent).map_err(|_| journal_err(&self.src))?;
		}
		write_atomic::write_file(&self.src, &data)
			.map_err(|_| journal_err(&self.src))
	}
}



/// # Entry Key.
fn key(dst: &Path) -> String { dst.to_string_lossy().into_owned() }

/// # Size Mismatch?
fn size_mismatch(dst: &Path, size: u64) -> bool {
	std::fs::metadata(dst).map_or(true, |m| m.len() != size)
}

/// # Journal Error.
fn journal_err(src: &Path) -> StreamRipError {
	StreamRipError::Journal(src.to_string_lossy().into_owned())
}

/// # Decode.
fn decode(raw: &[u8]) -> Option<BTreeMap<String, JournalEntry>> {
	if raw.len() <= HEADER_LEN || raw[..MAGIC.len()] != MAGIC { return None; }
	let hash = u32::from_le_bytes(raw[MAGIC.len()..HEADER_LEN].try_into().ok()?);
	let body = &raw[HEADER_LEN..];
	if hash != crc32fast::hash(body) { return None; }

	let body = zstd_decode(body)?;
	bincode::deserialize(&body).ok()
}

/// # Encode.
fn encode(entries: &BTreeMap<String, JournalEntry>) -> Option<Vec<u8>> {
	let body = bincode::serialize(entries).ok()?;
	let body = zstd_encode(&body)?;

	let mut out = Vec::with_capacity(HEADER_LEN + body.len());
	out.extend_from_slice(MAGIC.as_slice());
	out.extend_from_slice(crc32fast::hash(&body).to_le_bytes().as_slice());
	out.extend_from_slice(&body);
	Some(out)
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_partial_check() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("01 - Song.mp3");
		let other = dir.path().join("02 - Other.mp3");
		let track = Track::new("id:1", 5000);
		std::fs::write(&dst, [0_u8; 64]).expect("Write failed.");
		std::fs::write(&other, [0_u8; 64]).expect("Write failed.");

		let mut journal = RipJournal::open(dir.path()).expect("Open failed.");
		assert!(journal.is_empty());

		// Unknown files.
		assert!(! journal.appears_partial(&dst, &track, PartialCheck::None));
		assert!(! journal.appears_partial(&dst, &track, PartialCheck::Weak));
		assert!(journal.appears_partial(&dst, &track, PartialCheck::Strict));

		// Started but not finished.
		journal.begin(&dst, &track);
		assert!(! journal.appears_partial(&dst, &track, PartialCheck::None));
		assert!(journal.appears_partial(&dst, &track, PartialCheck::Weak));
		assert!(journal.appears_partial(&dst, &track, PartialCheck::Strict));

		// Finished.
		journal.complete(&dst, &track);
		assert!(! journal.appears_partial(&dst, &track, PartialCheck::Weak));
		assert!(! journal.appears_partial(&dst, &track, PartialCheck::Strict));

		// A different track at the same path doesn't count.
		let track2 = Track::new("id:2", 5000);
		assert!(! journal.appears_partial(&dst, &track2, PartialCheck::Weak));
		assert!(journal.appears_partial(&dst, &track2, PartialCheck::Strict));

		// Truncated after the fact.
		std::fs::write(&dst, [0_u8; 32]).expect("Write failed.");
		assert!(journal.appears_partial(&dst, &track, PartialCheck::Weak));

		assert_eq!(PartialCheck::parse(" Strict"), Some(PartialCheck::Strict));
		assert_eq!(PartialCheck::parse("maybe"), None);

		journal.forget(&dst);
		assert!(journal.is_empty());
	}

	#[test]
	fn t_save() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("01 - Song.wav");
		std::fs::write(&dst, [1_u8; 128]).expect("Write failed.");
		let track = Track::new("id:1", 5000);

		let mut journal = RipJournal::open(dir.path()).expect("Open failed.");
		journal.begin(&dst, &track);
		journal.complete(&dst, &track);
		journal.save().expect("Save failed.");
		assert!(journal.src().is_file());

		let journal2 = RipJournal::open(dir.path()).expect("Reopen failed.");
		assert_eq!(journal2.len(), 1);
		assert!(! journal2.appears_partial(&dst, &track, PartialCheck::Strict));
		assert!(journal2.updated(&dst).is_some());

		// Strict mode also checks the duration.
		let longer = Track::new("id:1", 6000);
		assert!(journal2.appears_partial(&dst, &longer, PartialCheck::Strict));
		assert!(! journal2.appears_partial(&dst, &longer, PartialCheck::Weak));

		// Corruption is noticed.
		let mut raw = std::fs::read(journal.src()).expect("Read failed.");
		let last = raw.len() - 1;
		raw[last] ^= 0xFF;
		std::fs::write(journal.src(), raw).expect("Write failed.");
		assert!(matches!(RipJournal::open(dir.path()), Err(StreamRipError::Journal(_))));
	}
}
