/*!
# StreamRip: Encoders
*/

use crate::{
	FrameChunk,
	StreamRipError,
	utility::find_executable,
};
use hound::{
	SampleFormat,
	WavSpec,
	WavWriter,
};
use std::{
	ffi::OsString,
	fmt,
	fs::File,
	io::{
		BufWriter,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
	process::{
		Child,
		ChildStdin,
		Command,
		Stdio,
	},
	str::FromStr,
	time::{
		Duration,
		Instant,
	},
};



/// # Sample Rate.
///
/// Every encoder is configured for 16-bit stereo at this rate.
pub const SAMPLE_RATE: u32 = 44_100;

/// # Channels.
pub const CHANNELS: u16 = 2;

/// # Bytes Per Frame.
const FRAME_SIZE: usize = 4;

/// # Abort Grace Period.
const ABORT_GRACE: Duration = Duration::from_secs(2);

/// # Wave Spec.
const WAVE_SPEC: WavSpec = WavSpec {
	channels: CHANNELS,
	sample_rate: SAMPLE_RATE,
	bits_per_sample: 16,
	sample_format: SampleFormat::Int,
};

/// # FLAC Encoder.
const ENC_FLAC: Encoder = Encoder { bin: "flac", package: "flac", args: args_flac };

/// # ALAC Encoder.
const ENC_ALAC: Encoder = Encoder { bin: "avconv", package: "libav-tools", args: args_alac };

/// # Vorbis Encoder.
const ENC_OGG: Encoder = Encoder { bin: "oggenc", package: "vorbis-tools", args: args_ogg };

/// # Opus Encoder.
const ENC_OPUS: Encoder = Encoder { bin: "opusenc", package: "opus-tools", args: args_opus };

/// # AAC Encoder.
const ENC_AAC: Encoder = Encoder { bin: "faac", package: "faac", args: args_aac };

/// # AAC (M4A) Encoder.
const ENC_M4A: Encoder = Encoder { bin: "fdkaac", package: "fdk-aac-encoder", args: args_m4a };

/// # MP3 Encoder.
const ENC_MP3: Encoder = Encoder { bin: "lame", package: "lame", args: args_mp3 };



#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
/// # Output Format.
pub enum OutputFormat {
	/// # WAV (no encoder).
	Wav,

	/// # Raw PCM (no encoder).
	Pcm,

	/// # FLAC.
	Flac,

	/// # Apple Lossless.
	Alac,

	/// # Ogg Vorbis.
	Ogg,

	/// # Opus.
	Opus,

	/// # AAC.
	Aac,

	/// # AAC in an MP4 container.
	M4a,

	#[default]
	/// # MP3.
	Mp3,
}

impl fmt::Display for OutputFormat {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OutputFormat {
	type Err = StreamRipError;

	fn from_str(src: &str) -> Result<Self, Self::Err> {
		match src.trim().to_ascii_lowercase().as_str() {
			"wav" => Ok(Self::Wav),
			"pcm" | "raw" => Ok(Self::Pcm),
			"flac" => Ok(Self::Flac),
			"alac" | "alac.m4a" => Ok(Self::Alac),
			"ogg" | "vorbis" => Ok(Self::Ogg),
			"opus" => Ok(Self::Opus),
			"aac" => Ok(Self::Aac),
			"m4a" => Ok(Self::M4a),
			"mp3" => Ok(Self::Mp3),
			_ => Err(StreamRipError::UnsupportedFormat(src.to_owned())),
		}
	}
}

impl OutputFormat {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Wav => "wav",
			Self::Pcm => "pcm",
			Self::Flac => "flac",
			Self::Alac => "alac",
			Self::Ogg => "ogg",
			Self::Opus => "opus",
			Self::Aac => "aac",
			Self::M4a => "m4a",
			Self::Mp3 => "mp3",
		}
	}

	#[must_use]
	/// # File Extension.
	pub const fn extension(self) -> &'static str {
		match self {
			Self::Alac => "alac.m4a",
			_ => self.as_str(),
		}
	}

	#[must_use]
	/// # Encoder.
	///
	/// Return the external program used to produce this format, if any.
	pub const fn encoder(self) -> Option<&'static Encoder> {
		match self {
			Self::Wav | Self::Pcm => None,
			Self::Flac => Some(&ENC_FLAC),
			Self::Alac => Some(&ENC_ALAC),
			Self::Ogg => Some(&ENC_OGG),
			Self::Opus => Some(&ENC_OPUS),
			Self::Aac => Some(&ENC_AAC),
			Self::M4a => Some(&ENC_M4A),
			Self::Mp3 => Some(&ENC_MP3),
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Quality.
pub enum Quality {
	/// # Constant Bitrate (kbps).
	Cbr(u16),

	/// # Variable Bitrate/Quality.
	///
	/// The meaning of the level depends on the encoder. Zero means "use the
	/// encoder's recommended default".
	Vbr(u16),
}

impl Default for Quality {
	#[inline]
	fn default() -> Self { Self::Vbr(0) }
}

impl fmt::Display for Quality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Cbr(n) => write!(f, "CBR {n}kbps"),
			Self::Vbr(n) => write!(f, "VBR {n}"),
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # LAME Stereo Mode.
pub enum StereoMode {
	/// # Joint.
	Joint,

	/// # Simple.
	Simple,

	/// # Forced.
	Force,

	/// # Dual Mono.
	Dual,

	/// # Mono.
	Mono,
}

impl StereoMode {
	#[must_use]
	/// # From Char.
	pub const fn from_char(ch: char) -> Option<Self> {
		match ch {
			'j' | 'J' => Some(Self::Joint),
			's' | 'S' => Some(Self::Simple),
			'f' | 'F' => Some(Self::Force),
			'd' | 'D' => Some(Self::Dual),
			'm' | 'M' => Some(Self::Mono),
			_ => None,
		}
	}

	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Joint => "j",
			Self::Simple => "s",
			Self::Force => "f",
			Self::Dual => "d",
			Self::Mono => "m",
		}
	}
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Encoder Profile.
///
/// Everything needed to pick and configure an encoder. The command line for
/// a given profile and destination is a pure function of the two.
pub struct EncoderProfile {
	format: OutputFormat,
	quality: Quality,
	comp: u8,
	stereo: Option<StereoMode>,
	custom: Option<&'static Encoder>,
}

impl Default for EncoderProfile {
	fn default() -> Self { Self::new(OutputFormat::default()) }
}

impl fmt::Display for EncoderProfile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.format {
			OutputFormat::Wav => f.write_str("WAV"),
			OutputFormat::Pcm => f.write_str("PCM"),
			OutputFormat::Flac => write!(f, "FLAC, compression level {}", self.comp),
			OutputFormat::Alac => f.write_str("ALAC"),
			fmt => write!(f, "{}, {}", fmt.as_str().to_ascii_uppercase(), self.quality),
		}
	}
}

/// ## Setters.
impl EncoderProfile {
	#[must_use]
	/// # New.
	pub const fn new(format: OutputFormat) -> Self {
		Self {
			format,
			quality: Quality::Vbr(0),
			comp: 10,
			stereo: None,
			custom: None,
		}
	}

	#[must_use]
	/// # With Custom Encoder.
	///
	/// Pipe the audio through `enc` instead of the program normally used for
	/// the format. The format still determines the file extension.
	pub const fn with_encoder(self, enc: &'static Encoder) -> Self {
		Self { custom: Some(enc), ..self }
	}

	#[must_use]
	/// # With Compression Level.
	///
	/// This applies to FLAC and Opus. Values are capped at `10`.
	pub const fn with_comp(self, mut comp: u8) -> Self {
		if 10 < comp { comp = 10; }
		Self { comp, ..self }
	}

	#[must_use]
	/// # With Quality.
	pub const fn with_quality(self, quality: Quality) -> Self {
		Self { quality, ..self }
	}

	#[must_use]
	/// # With LAME Stereo Mode.
	pub const fn with_stereo_mode(self, stereo: Option<StereoMode>) -> Self {
		Self { stereo, ..self }
	}

	#[must_use]
	/// # Normalized.
	///
	/// Replace placeholder values with each encoder's recommended defaults.
	/// A variable quality of zero means "default" for Vorbis (9), Opus
	/// (320kbps), AAC (500) and M4A (mode 5), and FLAC's compression level
	/// tops out at 8.
	pub const fn normalized(self) -> Self {
		let quality = match (self.format, self.quality) {
			(OutputFormat::Ogg, Quality::Vbr(0)) => Quality::Vbr(9),
			(OutputFormat::Opus, Quality::Vbr(0)) => Quality::Vbr(320),
			(OutputFormat::Aac, Quality::Vbr(0)) => Quality::Vbr(500),
			(OutputFormat::M4a, Quality::Vbr(0 | 6..)) => Quality::Vbr(5),
			(OutputFormat::Mp3, Quality::Vbr(10..)) => Quality::Vbr(9),
			(_, q) => q,
		};
		let comp =
			if matches!(self.format, OutputFormat::Flac) && 8 < self.comp { 8 }
			else { self.comp };

		Self { quality, comp, ..self }
	}
}

/// ## Getters.
impl EncoderProfile {
	#[must_use]
	/// # Compression Level.
	pub const fn comp(&self) -> u8 { self.comp }

	#[must_use]
	/// # Encoder.
	///
	/// Return the external program this profile pipes audio through, if any.
	pub const fn encoder(&self) -> Option<&'static Encoder> {
		if let Some(enc) = self.custom { Some(enc) }
		else { self.format.encoder() }
	}

	#[must_use]
	/// # Format.
	pub const fn format(&self) -> OutputFormat { self.format }

	#[must_use]
	/// # Quality.
	pub const fn quality(&self) -> Quality { self.quality }

	#[must_use]
	/// # Stereo Mode.
	pub const fn stereo_mode(&self) -> Option<StereoMode> { self.stereo }

	#[must_use]
	/// # Command Arguments.
	///
	/// Return the arguments that would be passed to the encoder for `dst`, or
	/// `None` if the format is written directly.
	pub fn command_args(&self, dst: &Path) -> Option<Vec<OsString>> {
		let enc = self.encoder()?;
		Some((enc.args)(&self.normalized(), dst))
	}

	/// # Validate.
	///
	/// Make sure the encoder required by this profile is actually installed.
	/// This should be called once, before anything is ripped.
	///
	/// ## Errors
	///
	/// Returns [`StreamRipError::MissingEncoder`] if the program cannot be
	/// found in the `PATH`.
	pub fn validate(&self) -> Result<(), StreamRipError> {
		if let Some(enc) = self.encoder() {
			if find_executable(enc.bin).is_none() {
				return Err(StreamRipError::MissingEncoder(enc.bin, enc.package));
			}
		}
		Ok(())
	}
}



/// # Encoder.
///
/// An external program, the package that typically provides it, and a
/// function to build its argument list.
pub struct Encoder {
	bin: &'static str,
	package: &'static str,
	args: fn(&EncoderProfile, &Path) -> Vec<OsString>,
}

impl fmt::Debug for Encoder {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Encoder")
			.field("bin", &self.bin)
			.field("package", &self.package)
			.finish_non_exhaustive()
	}
}

impl Eq for Encoder {}

impl PartialEq for Encoder {
	fn eq(&self, other: &Self) -> bool {
		self.bin == other.bin && self.package == other.package
	}
}

impl Encoder {
	#[must_use]
	/// # New.
	///
	/// Describe a custom encoder: the program to run, the package that
	/// provides it (for error messages), and a function returning its
	/// arguments for a given profile and destination.
	///
	/// The program must read raw 16-bit little-endian stereo PCM at 44.1kHz
	/// from STDIN.
	pub const fn new(
		bin: &'static str,
		package: &'static str,
		args: fn(&EncoderProfile, &Path) -> Vec<OsString>,
	) -> Self {
		Self { bin, package, args }
	}

	#[must_use]
	/// # Binary Name.
	pub const fn bin(&self) -> &'static str { self.bin }

	#[must_use]
	/// # Package Name.
	pub const fn package(&self) -> &'static str { self.package }
}



/// # Argument Builder.
macro_rules! args {
	($($v:expr),+ $(,)?) => (
		vec![$(OsString::from($v)),+]
	);
}

/// # Arguments: FLAC.
fn args_flac(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	args![
		"-f", format!("-{}", p.comp), "--silent",
		"--endian", "little", "--channels", "2", "--bps", "16",
		"--sample-rate", "44100", "--sign", "signed",
		"-o", dst, "-",
	]
}

/// # Arguments: ALAC.
fn args_alac(_p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	args![
		"-nostats", "-loglevel", "0", "-y",
		"-f", "s16le", "-ar", "44100", "-ac", "2", "-channel_layout", "stereo",
		"-i", "-", "-acodec", "alac", dst,
	]
}

/// # Arguments: Vorbis.
fn args_ogg(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	let (flag, n) = match p.quality {
		Quality::Cbr(n) => ("-b", n),
		Quality::Vbr(n) => ("-q", n),
	};
	args!["--quiet", "--raw", flag, n.to_string(), "-o", dst, "-"]
}

/// # Arguments: Opus.
///
/// Opus gets half the requested constant bitrate.
fn args_opus(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	let (flag, n) = match p.quality {
		Quality::Cbr(n) => ("--cvbr", n / 2),
		Quality::Vbr(n) => ("--vbr", n),
	};
	args![
		"--quiet", "--comp", p.comp.to_string(), flag,
		"--bitrate", n.to_string(), "--raw", "--raw-rate", "44100",
		"-", dst,
	]
}

/// # Arguments: AAC.
fn args_aac(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	let (flag, n) = match p.quality {
		Quality::Cbr(n) => ("-b", n),
		Quality::Vbr(n) => ("-q", n),
	};
	args!["-P", "-X", flag, n.to_string(), "-o", dst, "-"]
}

/// # Arguments: M4A.
fn args_m4a(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	let (flag, n) = match p.quality {
		Quality::Cbr(n) => ("-b", n),
		Quality::Vbr(n) => ("-m", n),
	};
	args!["-S", "-R", flag, n.to_string(), "-o", dst, "-"]
}

/// # Arguments: MP3.
fn args_mp3(p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
	let mut out = args!["--silent"];
	if let Some(mode) = p.stereo {
		out.push("-m".into());
		out.push(mode.as_str().into());
	}
	match p.quality {
		Quality::Cbr(n) => out.extend(args!["-cbr", "-b", n.to_string()]),
		Quality::Vbr(n) => out.extend(args!["-V", n.to_string()]),
	}
	out.extend(args!["-h", "-r", "-", dst]);
	out
}



/// # Encoder Process.
///
/// One of these is opened for each track that streams. Audio is either piped
/// to an external encoder or written straight to disk.
pub struct EncoderProcess {
	dst: PathBuf,
	sink: EncoderSink,
	written: u64,
}

/// # Where the Bytes Go.
enum EncoderSink {
	/// # External Program.
	Pipe {
		bin: &'static str,
		child: Child,
		stdin: Option<ChildStdin>,
	},

	/// # WAV File.
	Wav(WavWriter<BufWriter<File>>),

	/// # PCM File.
	Raw(BufWriter<File>),

	/// # Finished.
	Closed,
}

impl fmt::Debug for EncoderProcess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match &self.sink {
			EncoderSink::Pipe { bin, .. } => bin,
			EncoderSink::Wav(_) => "wav",
			EncoderSink::Raw(_) => "pcm",
			EncoderSink::Closed => "closed",
		};
		f.debug_struct("EncoderProcess")
			.field("dst", &self.dst)
			.field("sink", &kind)
			.field("written", &self.written)
			.finish()
	}
}

impl Drop for EncoderProcess {
	fn drop(&mut self) {
		if let EncoderSink::Pipe { mut child, stdin, .. } = std::mem::replace(&mut self.sink, EncoderSink::Closed) {
			drop(stdin);
			let _res = child.kill();
			let _res = child.wait();
		}
	}
}

impl EncoderProcess {
	/// # Start.
	///
	/// Open the output for `dst`, spawning an external encoder if the
	/// profile calls for one.
	///
	/// ## Errors
	///
	/// This will return an error if the encoder cannot be spawned or the
	/// file cannot be created.
	pub fn start(dst: &Path, profile: &EncoderProfile) -> Result<Self, StreamRipError> {
		let profile = profile.normalized();
		let sink = match profile.encoder() {
			Some(enc) => return Self::spawn(dst, enc, &profile),
			None if matches!(profile.format, OutputFormat::Wav) => {
				let wav = WavWriter::create(dst, WAVE_SPEC)
					.map_err(|_| StreamRipError::Write(dst.to_string_lossy().into_owned()))?;
				EncoderSink::Wav(wav)
			},
			None => {
				let file = File::create(dst)
					.map_err(|_| StreamRipError::Write(dst.to_string_lossy().into_owned()))?;
				EncoderSink::Raw(BufWriter::new(file))
			},
		};

		Ok(Self { dst: dst.to_path_buf(), sink, written: 0 })
	}

	/// # Spawn.
	fn spawn(dst: &Path, enc: &'static Encoder, profile: &EncoderProfile)
	-> Result<Self, StreamRipError> {
		let bin = enc.bin;
		let mut child = Command::new(bin)
			.args((enc.args)(profile, dst))
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|_| StreamRipError::EncoderSpawn(bin))?;
		let stdin = child.stdin.take();
		if stdin.is_none() {
			let _res = child.kill();
			let _res = child.wait();
			return Err(StreamRipError::EncoderSpawn(bin));
		}

		Ok(Self {
			dst: dst.to_path_buf(),
			sink: EncoderSink::Pipe { bin, child, stdin },
			written: 0,
		})
	}

	#[must_use]
	/// # Bytes Written.
	pub const fn written(&self) -> u64 { self.written }

	/// # Write.
	///
	/// Send a chunk's PCM along. Writes to an external encoder block until
	/// the encoder has room for them.
	///
	/// ## Errors
	///
	/// This will return an error if the chunk is not 44.1kHz, if its payload
	/// is not made of whole 16-bit stereo frames, or if the bytes cannot be
	/// written, for example because the encoder has died.
	pub fn write(&mut self, chunk: &FrameChunk) -> Result<(), StreamRipError> {
		if chunk.sample_rate() != SAMPLE_RATE {
			return Err(StreamRipError::UnsupportedFormat(format!("{}Hz", chunk.sample_rate())));
		}

		let data = chunk.payload();
		if data.len() % FRAME_SIZE != 0 {
			return Err(StreamRipError::UnsupportedFormat(format!("{}-byte frame", data.len())));
		}
		match &mut self.sink {
			EncoderSink::Pipe { stdin: Some(stdin), .. } => stdin.write_all(data)
				.map_err(|_| self.pipe_err())?,
			EncoderSink::Wav(wav) => {
				for pair in data.chunks_exact(2) {
					wav.write_sample(i16::from_le_bytes([pair[0], pair[1]]))
						.map_err(|_| StreamRipError::Write(self.dst.to_string_lossy().into_owned()))?;
				}
			},
			EncoderSink::Raw(file) => file.write_all(data)
				.map_err(|_| StreamRipError::Write(self.dst.to_string_lossy().into_owned()))?,
			EncoderSink::Pipe { stdin: None, .. } | EncoderSink::Closed =>
				return Err(StreamRipError::Bug("encoder written after close")),
		}

		self.written += data.len() as u64;
		Ok(())
	}

	/// # Finish.
	///
	/// Flush and close the input, then wait for the encoder to exit,
	/// returning its exit code. Direct writers always return zero.
	///
	/// A non-zero code is not treated as an error here; it is up to the
	/// caller whether or not to complain about it.
	///
	/// ## Errors
	///
	/// This will return an error if the output cannot be flushed or the
	/// process cannot be waited on.
	pub fn finish(&mut self) -> Result<i32, StreamRipError> {
		match std::mem::replace(&mut self.sink, EncoderSink::Closed) {
			EncoderSink::Pipe { mut child, stdin, .. } => {
				if let Some(mut stdin) = stdin {
					let _res = stdin.flush();
				}
				let status = child.wait().map_err(|_| self.pipe_err())?;
				Ok(status.code().unwrap_or(-1))
			},
			EncoderSink::Wav(wav) => wav.finalize()
				.map(|()| 0)
				.map_err(|_| StreamRipError::Write(self.dst.to_string_lossy().into_owned())),
			EncoderSink::Raw(file) => file.into_inner().ok()
				.and_then(|f| f.sync_all().ok())
				.map(|()| 0)
				.ok_or_else(|| StreamRipError::Write(self.dst.to_string_lossy().into_owned())),
			EncoderSink::Closed => Ok(0),
		}
	}

	/// # Abort.
	///
	/// Close the input and give the encoder a moment to exit on its own
	/// before killing it. The output file is left for the caller to remove.
	pub fn abort(&mut self) {
		if let EncoderSink::Pipe { mut child, stdin, .. } = std::mem::replace(&mut self.sink, EncoderSink::Closed) {
			drop(stdin);
			let start = Instant::now();
			while start.elapsed() < ABORT_GRACE {
				match child.try_wait() {
					Ok(Some(_)) => return,
					Ok(None) => std::thread::sleep(Duration::from_millis(25)),
					Err(_) => break,
				}
			}
			let _res = child.kill();
			let _res = child.wait();
		}
	}

	/// # Pipe Error.
	fn pipe_err(&self) -> StreamRipError {
		StreamRipError::EncoderPipe(self.dst.to_string_lossy().into_owned())
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_format_parse() {
		for fmt in [
			OutputFormat::Wav, OutputFormat::Pcm, OutputFormat::Flac,
			OutputFormat::Alac, OutputFormat::Ogg, OutputFormat::Opus,
			OutputFormat::Aac, OutputFormat::M4a, OutputFormat::Mp3,
		] {
			assert_eq!(fmt.as_str().parse::<OutputFormat>(), Ok(fmt));
			assert_eq!(fmt.encoder().is_none(), matches!(fmt, OutputFormat::Wav | OutputFormat::Pcm));
		}
		assert_eq!(" MP3 ".parse::<OutputFormat>(), Ok(OutputFormat::Mp3));
		assert!("wma".parse::<OutputFormat>().is_err());
		assert_eq!(OutputFormat::Alac.extension(), "alac.m4a");
	}

	#[test]
	fn t_normalized() {
		let p = EncoderProfile::new(OutputFormat::Ogg).normalized();
		assert_eq!(p.quality(), Quality::Vbr(9));
		let p = EncoderProfile::new(OutputFormat::Opus).normalized();
		assert_eq!(p.quality(), Quality::Vbr(320));
		let p = EncoderProfile::new(OutputFormat::Aac).normalized();
		assert_eq!(p.quality(), Quality::Vbr(500));
		let p = EncoderProfile::new(OutputFormat::M4a).normalized();
		assert_eq!(p.quality(), Quality::Vbr(5));
		let p = EncoderProfile::new(OutputFormat::Mp3).normalized();
		assert_eq!(p.quality(), Quality::Vbr(0));

		// FLAC compression.
		let p = EncoderProfile::new(OutputFormat::Flac).normalized();
		assert_eq!(p.comp(), 8);
		let p = EncoderProfile::new(OutputFormat::Flac).with_comp(5).normalized();
		assert_eq!(p.comp(), 5);

		// Explicit choices are left alone.
		let p = EncoderProfile::new(OutputFormat::Ogg)
			.with_quality(Quality::Cbr(192))
			.normalized();
		assert_eq!(p.quality(), Quality::Cbr(192));
	}

	#[test]
	fn t_command_args() {
		let dst = Path::new("/tmp/out.mp3");
		let p = EncoderProfile::new(OutputFormat::Mp3)
			.with_quality(Quality::Cbr(320))
			.with_stereo_mode(Some(StereoMode::Joint));
		assert_eq!(
			p.command_args(dst),
			Some(args!["--silent", "-m", "j", "-cbr", "-b", "320", "-h", "-r", "-", "/tmp/out.mp3"]),
		);

		let dst = Path::new("/tmp/out.flac");
		let p = EncoderProfile::new(OutputFormat::Flac);
		let args = p.command_args(dst).expect("Missing args.");
		assert_eq!(args[1], OsString::from("-8"));
		assert_eq!(args.last(), Some(&OsString::from("-")));

		let dst = Path::new("/tmp/out.opus");
		let p = EncoderProfile::new(OutputFormat::Opus).with_quality(Quality::Cbr(320));
		assert_eq!(
			p.command_args(dst),
			Some(args![
				"--quiet", "--comp", "10", "--cvbr", "--bitrate", "160",
				"--raw", "--raw-rate", "44100", "-", "/tmp/out.opus",
			]),
		);

		assert!(EncoderProfile::new(OutputFormat::Wav).command_args(dst).is_none());
	}

	/// # Nonexistent Encoder.
	static ENC_NOPE: Encoder = Encoder::new("streamrip-no-such-encoder", "streamrip-nope", args_none);

	/// # Shell Copy.
	static ENC_CAT: Encoder = Encoder::new("sh", "dash", args_cat);

	/// # Shell Copy, Exit 3.
	static ENC_EXIT3: Encoder = Encoder::new("sh", "dash", args_exit3);

	/// # Shell Sleep.
	static ENC_SLEEP: Encoder = Encoder::new("sh", "dash", args_sleep);

	fn args_none(_p: &EncoderProfile, _dst: &Path) -> Vec<OsString> { Vec::new() }
	fn args_cat(_p: &EncoderProfile, dst: &Path) -> Vec<OsString> {
		args!["-c", "cat > \"$0\"", dst]
	}
	fn args_exit3(_p: &EncoderProfile, _dst: &Path) -> Vec<OsString> {
		args!["-c", "cat > /dev/null; exit 3"]
	}
	fn args_sleep(_p: &EncoderProfile, _dst: &Path) -> Vec<OsString> {
		args!["-c", "exec sleep 30"]
	}

	#[test]
	fn t_validate() {
		assert!(EncoderProfile::new(OutputFormat::Wav).validate().is_ok());
		assert!(EncoderProfile::new(OutputFormat::Pcm).validate().is_ok());

		// A custom encoder takes the place of the format's usual one.
		let p = EncoderProfile::new(OutputFormat::Pcm).with_encoder(&ENC_NOPE);
		assert_eq!(p.encoder(), Some(&ENC_NOPE));
		assert_eq!(
			p.validate(),
			Err(StreamRipError::MissingEncoder("streamrip-no-such-encoder", "streamrip-nope")),
		);
		assert_eq!(p.normalized().encoder().map(Encoder::bin), Some("streamrip-no-such-encoder"));
		assert_eq!(ENC_NOPE.package(), "streamrip-nope");
	}

	#[test]
	fn t_wav() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.wav");
		let mut enc = EncoderProcess::start(&dst, &EncoderProfile::new(OutputFormat::Wav))
			.expect("Start failed.");

		let samples: Vec<i16> = (0..400_i16).collect();
		let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
		enc.write(&FrameChunk::new(SAMPLE_RATE, 200, payload)).expect("Write failed.");
		assert_eq!(enc.written(), 800);
		assert_eq!(enc.finish(), Ok(0));

		let mut reader = hound::WavReader::open(&dst).expect("Read failed.");
		assert_eq!(reader.spec(), WAVE_SPEC);
		let back: Vec<i16> = reader.samples::<i16>().collect::<Result<_, _>>().expect("Bad samples.");
		assert_eq!(back, samples);
	}

	#[test]
	fn t_pcm() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.pcm");
		let mut enc = EncoderProcess::start(&dst, &EncoderProfile::new(OutputFormat::Pcm))
			.expect("Start failed.");
		enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![1, 2, 3, 4])).expect("Write failed.");
		enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![5, 6, 7, 8])).expect("Write failed.");

		// Wrong rate.
		assert!(enc.write(&FrameChunk::new(48_000, 1, vec![0; 4])).is_err());

		// Partial frames.
		assert!(matches!(
			enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![9; 5])),
			Err(StreamRipError::UnsupportedFormat(_)),
		));
		assert_eq!(enc.written(), 8);

		assert_eq!(enc.finish(), Ok(0));
		assert_eq!(std::fs::read(&dst).expect("Read failed."), [1, 2, 3, 4, 5, 6, 7, 8]);

		// Writing after finishing is a bug.
		assert!(enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![0; 4])).is_err());
	}

	#[cfg(unix)]
	#[test]
	fn t_pipe() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.raw");
		let profile = EncoderProfile::new(OutputFormat::Pcm).with_encoder(&ENC_CAT);
		let mut enc = EncoderProcess::start(&dst, &profile).expect("Spawn failed.");
		for i in 0..10_u8 {
			enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![i; 4])).expect("Write failed.");
		}
		assert_eq!(enc.finish(), Ok(0));

		let expected: Vec<u8> = (0..10_u8).flat_map(|i| [i; 4]).collect();
		assert_eq!(std::fs::read(&dst).expect("Read failed."), expected);
	}

	#[cfg(unix)]
	#[test]
	fn t_pipe_exit_code() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.raw");
		let profile = EncoderProfile::new(OutputFormat::Pcm).with_encoder(&ENC_EXIT3);
		let mut enc = EncoderProcess::start(&dst, &profile).expect("Spawn failed.");
		enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![0; 4])).expect("Write failed.");
		assert_eq!(enc.finish(), Ok(3));
	}

	#[cfg(unix)]
	#[test]
	fn t_pipe_abort() {
		let dir = tempfile::tempdir().expect("Tempdir failed.");
		let dst = dir.path().join("out.raw");
		let profile = EncoderProfile::new(OutputFormat::Pcm).with_encoder(&ENC_SLEEP);
		let mut enc = EncoderProcess::start(&dst, &profile).expect("Spawn failed.");
		let start = Instant::now();
		enc.abort();
		assert!(start.elapsed() < Duration::from_secs(10), "Abort hung.");

		// Further writes are refused.
		assert!(enc.write(&FrameChunk::new(SAMPLE_RATE, 1, vec![0; 4])).is_err());
	}
}
