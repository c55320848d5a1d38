/*!
# StreamRip: Errors
*/

use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[cfg(feature = "bin")]
/// # Help Text.
const HELP: &str = concat!(r#"
StreamRip v"#, env!("CARGO_PKG_VERSION"), r#"
Rip streamed tracks to local audio files, one encoder at a time.

USAGE:
    streamrip [OPTIONS] <TRACK(S)>…

TRACKS:
    Each track is the path to a 16-bit, stereo, 44.1kHz WAV file, which is
    streamed through the ripper one chunk at a time, exactly like a remote
    session would deliver it.

OUTPUT:
    -d, --directory <DIR>
                      Save the ripped tracks to this directory.
                      [default: the current working directory]
    -f, --format <FMT>
                      The output format, one of: wav, pcm, flac, alac, ogg,
                      opus, aac, m4a, or mp3. Compressed formats require the
                      matching encoder program (flac, avconv, oggenc, opusenc,
                      faac, fdkaac, lame) to be installed. [default: mp3]
    -b, --bitrate <KBPS>
                      Encode at a constant bitrate of <KBPS>.
                      [default: variable bitrate]
        --vbr <LEVEL> Encode at a variable bitrate/quality of <LEVEL>. The
                      meaning varies by encoder. [default: encoder-specific]
        --comp <NUM>  The compression level for FLAC and Opus. [default: 10,
                      or 8 for FLAC]
        --stereo-mode <MODE>
                      The LAME stereo mode: j, s, f, d, or m.

RESUMING:
        --overwrite   Re-rip tracks even if their output files already exist.
        --partial-check <MODE>
                      How to judge whether an existing file is an incomplete
                      rip that should be redone: none, weak, or strict.
                      [default: weak]
        --fail-log <FILE>
                      Write the IDs of any tracks that could not be ripped to
                      <FILE>, one per line, so they can be retried with -i.

INPUT:
    -i, --input <FILE>
                      Read track IDs from <FILE>, one per line. Blank lines
                      and lines starting with # are ignored.

MISCELLANEOUS:
    -h, --help        Print help information to STDOUT and exit.
    -v, --verbose     Print a timestamped per-track event log to STDOUT, like:
                      streamrip -v … > rip.log
    -V, --version     Print version information to STDOUT and exit.

WHILE RIPPING:
    Press ENTER to skip the current track, or CTRL+C to stop the run early.
    Either way, the partially ripped file is removed.
"#);



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum StreamRipError {
	/// # Bug!
	Bug(&'static str),

	/// # Encoder exited before we finished writing to it.
	EncoderPipe(String),

	/// # Encoder could not be started.
	EncoderSpawn(&'static str),

	/// # The journal could not be read or saved.
	Journal(String),

	/// # User Abort.
	Killed,

	/// # Missing Encoder (binary, package).
	MissingEncoder(&'static str, &'static str),

	/// # Noop.
	Noop,

	/// # Unable to read a source.
	Read(String),

	/// # Remote session error.
	Session(String),

	/// # Stream stalled (seconds).
	Stall(u32),

	/// # Tagging failed.
	Tag(String),

	/// # Unavailable Track.
	Unavailable(String),

	/// # Unsupported audio format.
	UnsupportedFormat(String),

	/// # Writing to disk.
	Write(String),

	#[cfg(feature = "bin")]
	/// # Invalid CLI arg.
	CliArg(String),

	#[cfg(feature = "bin")]
	/// # CLI Parsing failure.
	CliParse(&'static str),

	#[cfg(feature = "bin")]
	/// # Print Help (Not an Error).
	PrintHelp,

	#[cfg(feature = "bin")]
	/// # Print Version (Not an Error).
	PrintVersion,
}

impl Error for StreamRipError {}

impl From<StreamRipError> for Msg {
	#[inline]
	fn from(src: StreamRipError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for StreamRipError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::EncoderPipe(s) => write!(f, "The encoder stopped accepting data for {s}."),
			Self::EncoderSpawn(s) => write!(f, "Unable to start the {s} encoder."),
			Self::Journal(s) => write!(f, "Unable to read or save the rip journal {s}."),
			Self::Killed => f.write_str("User abort."),
			Self::MissingEncoder(bin, pkg) => write!(
				f,
				"Missing dependency '{bin}'; please install {pkg} and add it to your PATH.",
			),
			Self::Noop => f.write_str("There's nothing to do!"),
			Self::Read(s) => write!(f, "Unable to read {s}."),
			Self::Session(s) => write!(f, "Session error: {s}"),
			Self::Stall(n) => write!(f, "The stream stalled; no audio arrived for {n} seconds."),
			Self::Tag(s) => write!(f, "Unable to tag {s}."),
			Self::Unavailable(s) => write!(f, "Track {s} is not available."),
			Self::UnsupportedFormat(s) => write!(f, "Unsupported audio format ({s})."),
			Self::Write(s) => write!(f, "Unable to write to {s}."),

			#[cfg(feature = "bin")]
			Self::CliArg(s) => write!(f, "Invalid CLI option: {s}"),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),

			#[cfg(feature = "bin")]
			Self::PrintHelp => f.write_str(HELP),

			#[cfg(feature = "bin")]
			Self::PrintVersion => f.write_str(concat!("StreamRip v", env!("CARGO_PKG_VERSION"))),
		}
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_display() {
		assert_eq!(
			StreamRipError::Stall(60).to_string(),
			"The stream stalled; no audio arrived for 60 seconds.",
		);
		assert_eq!(
			StreamRipError::MissingEncoder("lame", "lame").to_string(),
			"Missing dependency 'lame'; please install lame and add it to your PATH.",
		);
	}
}
