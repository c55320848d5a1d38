/*!
# StreamRip: CLI
*/

use argyle::Argument;
use dactyl::traits::BytesToUnsigned;
use std::path::PathBuf;
use streamrip_core::{
	EncoderProfile,
	OutputFormat,
	PartialCheck,
	Quality,
	RipOptions,
	StereoMode,
	StreamRipError,
};



/// # Parsed Settings.
pub(super) struct Settings {
	/// # Rip Options.
	pub(super) opts: RipOptions,

	/// # Output Directory.
	pub(super) dir: PathBuf,

	/// # Fail Log.
	pub(super) fail_log: Option<PathBuf>,

	/// # Track IDs.
	pub(super) tracks: Vec<String>,
}



/// # Parse Options.
pub(super) fn parse() -> Result<Settings, StreamRipError> {
	let args = argyle::args()
		.with_keywords(include!(concat!(env!("OUT_DIR"), "/argyle.rs")));

	let mut opts = RipOptions::default();
	let mut format = OutputFormat::default();
	let mut quality = None;
	let mut comp = None;
	let mut stereo = None;
	let mut dir = None;
	let mut fail_log = None;
	let mut tracks = Vec::new();
	for arg in args {
		match arg {
			Argument::Key("-h" | "--help") => return Err(StreamRipError::PrintHelp),
			Argument::Key("--overwrite") => { opts = opts.with_overwrite(true); },
			Argument::Key("-v" | "--verbose") => { opts = opts.with_verbose(true); },
			Argument::Key("-V" | "--version") => return Err(StreamRipError::PrintVersion),

			Argument::KeyWithValue("-b" | "--bitrate", s) => {
				let s = u16::btou(s.trim().as_bytes())
					.filter(|&n| n != 0)
					.ok_or(StreamRipError::CliParse("-b/--bitrate"))?;
				quality.replace(Quality::Cbr(s));
			},
			Argument::KeyWithValue("--comp", s) => {
				let s = u8::btou(s.trim().as_bytes())
					.ok_or(StreamRipError::CliParse("--comp"))?;
				comp.replace(s);
			},
			Argument::KeyWithValue("-d" | "--dir" | "--directory", s) => {
				dir.replace(PathBuf::from(s));
			},
			Argument::KeyWithValue("--fail-log", s) => {
				fail_log.replace(PathBuf::from(s));
			},
			Argument::KeyWithValue("-f" | "--format", s) => {
				format = s.parse::<OutputFormat>()?;
			},
			Argument::KeyWithValue("-i" | "--input", s) => {
				let raw = std::fs::read_to_string(&s)
					.map_err(|_| StreamRipError::Read(s))?;
				tracks.extend(parse_track_list(&raw));
			},
			Argument::KeyWithValue("--partial-check", s) => {
				let s = PartialCheck::parse(&s)
					.ok_or(StreamRipError::CliParse("--partial-check"))?;
				opts = opts.with_partial_check(s);
			},
			Argument::KeyWithValue("--stereo-mode", s) => {
				stereo.replace(parse_stereo_mode(&s)?);
			},
			Argument::KeyWithValue("--vbr", s) => {
				let s = u16::btou(s.trim().as_bytes())
					.ok_or(StreamRipError::CliParse("--vbr"))?;
				quality.replace(Quality::Vbr(s));
			},

			Argument::Other(s) => {
				if s.starts_with('-') { return Err(StreamRipError::CliArg(s)); }
				tracks.push(s);
			},

			_ => {},
		}
	}

	// Build the profile.
	let mut profile = EncoderProfile::new(format).with_stereo_mode(stereo);
	if let Some(q) = quality { profile = profile.with_quality(q); }
	if let Some(c) = comp { profile = profile.with_comp(c); }
	opts = opts.with_profile(profile.normalized());

	// Default to the current directory.
	let dir = match dir {
		Some(d) => d,
		None => std::env::current_dir()
			.map_err(|_| StreamRipError::CliParse("-d/--directory"))?,
	};

	Ok(Settings { opts, dir, fail_log, tracks })
}



/// # Parse Stereo Mode.
fn parse_stereo_mode(src: &str) -> Result<StereoMode, StreamRipError> {
	let mut chars = src.trim().chars();
	match (chars.next(), chars.next()) {
		(Some(c), None) => StereoMode::from_char(c)
			.ok_or(StreamRipError::CliParse("--stereo-mode")),
		_ => Err(StreamRipError::CliParse("--stereo-mode")),
	}
}

/// # Parse Track List.
///
/// Return the non-empty, non-comment lines, trimmed.
fn parse_track_list(raw: &str) -> impl Iterator<Item=String> + '_ {
	raw.lines()
		.map(str::trim)
		.filter(|l| ! l.is_empty() && ! l.starts_with('#'))
		.map(String::from)
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_track_list() {
		let raw = "# Favorites\n\n  /music/one.wav  \n#/music/skip.wav\n/music/two.wav\n";
		let list: Vec<String> = parse_track_list(raw).collect();
		assert_eq!(list, ["/music/one.wav", "/music/two.wav"]);
	}

	#[test]
	fn t_stereo_mode() {
		assert!(parse_stereo_mode("j").is_ok());
		assert!(parse_stereo_mode(" m ").is_ok());
		assert!(parse_stereo_mode("").is_err());
		assert!(parse_stereo_mode("jj").is_err());
		assert!(parse_stereo_mode("x").is_err());
	}
}
