/*!
# StreamRip: Utilities
*/

use std::{
	ffi::OsStr,
	io::{
		Read,
		Write,
	},
	path::{
		Path,
		PathBuf,
	},
};



/// # Find Executable.
///
/// Search the `PATH` for a program named `bin`, returning the first match
/// that is a regular (and on Unix, executable) file.
pub(crate) fn find_executable<S>(bin: S) -> Option<PathBuf>
where S: AsRef<OsStr> {
	let bin = bin.as_ref();
	let paths = std::env::var_os("PATH")?;
	std::env::split_paths(&paths)
		.map(|dir| dir.join(bin))
		.find(|p| is_executable(p))
}

#[cfg(unix)]
/// # Is Executable?
fn is_executable(src: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;
	std::fs::metadata(src).is_ok_and(|m| m.is_file() && 0 != m.permissions().mode() & 0o111)
}

#[cfg(not(unix))]
/// # Is Executable?
fn is_executable(src: &Path) -> bool {
	src.is_file() || src.with_extension("exe").is_file()
}

/// # Zstd Decode.
///
/// Return a decompressed copy of `raw`, or `None` if the operation fails.
pub(crate) fn zstd_decode(raw: &[u8]) -> Option<Vec<u8>> {
	let mut out = Vec::with_capacity(raw.len() * 2);
	let mut decoder = zstd::stream::Decoder::new(raw).ok()?;
	decoder.read_to_end(&mut out).ok()?;

	if out.is_empty() { None }
	else { Some(out) }
}

/// # Zstd Encode.
///
/// Return a copy of the `raw` compressed with default-level zstd. If there is
/// any sort of problem, `None` will be returned instead.
pub(crate) fn zstd_encode(raw: &[u8]) -> Option<Vec<u8>> {
	let mut encoder = zstd::stream::Encoder::new(
		Vec::with_capacity(raw.len().wrapping_div(2)),
		zstd::DEFAULT_COMPRESSION_LEVEL,
	).ok()?;
	encoder.write_all(raw).ok()?;
	let out = encoder.finish().ok()?;

	if out.is_empty() { None }
	else { Some(out) }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_zstd() {
		let raw = b"Hello hello hello hello hello hello hello!".repeat(20);
		let enc = zstd_encode(&raw).expect("Encode failed.");
		assert!(enc.len() < raw.len());
		assert_eq!(zstd_decode(&enc).as_deref(), Some(raw.as_slice()));
		assert!(zstd_decode(b"not zstd").is_none());
	}

	#[cfg(unix)]
	#[test]
	fn t_find_executable() {
		assert!(find_executable("sh").is_some());
		assert!(find_executable("streamrip-definitely-not-a-real-program").is_none());
	}
}
