/*!
# StreamRip
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![expect(clippy::redundant_pub_crate, reason = "Unresolvable.")]



mod cli;

use cli::Settings;
use dactyl::{
	NiceElapsed,
	NiceU32,
};
use fyi_ansi::{
	ansi,
	csi,
	dim,
	bold,
};
use fyi_msg::{
	Msg,
	Progless,
};
use oxford_join::JoinFmt;
use std::{
	borrow::Cow,
	process::ExitCode,
	sync::Arc,
	time::Duration,
};
use streamrip_core::{
	FlatPaths,
	PartialCheck,
	ProgressSnapshot,
	RipHandle,
	RipJournal,
	RipPhase,
	RipReport,
	Ripper,
	StreamRipError,
	WavSession,
};
use utc2k::FmtUtc2k;



/// # Display Refresh Interval.
const DISPLAY_POLL: Duration = Duration::from_millis(100);



/// # Main.
///
/// This lets us bubble up startup errors so they can be pretty-printed.
fn main() -> ExitCode {
	match main__() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e @ (StreamRipError::PrintHelp | StreamRipError::PrintVersion)) => {
			println!("{e}");
			ExitCode::SUCCESS
		},
		Err(e) => {
			Msg::from(e).eprint();
			ExitCode::FAILURE
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn main__() -> Result<(), StreamRipError> {
	let settings = cli::parse()?;
	if settings.tracks.is_empty() { return Err(StreamRipError::Noop); }

	// Make sure the encoder is actually there before doing anything else.
	settings.opts.profile().validate()?;

	std::fs::create_dir_all(&settings.dir)
		.map_err(|_| StreamRipError::Write(settings.dir.to_string_lossy().into_owned()))?;
	let journal = RipJournal::open(&settings.dir)?;

	rip_summary(&settings);
	if settings.opts.verbose() { log_header(&settings); }

	// Rip and rip and rip!
	let Settings { opts, dir, fail_log, tracks } = settings;
	let paths = FlatPaths::new(&dir, opts.profile().format().extension());
	let handle = Ripper::new(Arc::new(WavSession::default()), opts, paths)
		.with_journal(journal)
		.with_post_run(RipReport::new(fail_log.clone()))
		.start(tracks)
		.map_err(|_| StreamRipError::Bug("unable to start the rip thread"))?;

	listen(&handle);
	watch(&handle);

	let summary = handle.join()?;
	summary.print();
	if let Some(dst) = fail_log.filter(|_| summary.failed() != 0) {
		Msg::info(format!("Failed track IDs were saved to {}.", dst.to_string_lossy()))
			.with_newline(true)
			.eprint();
	}

	if summary.aborted() { Err(StreamRipError::Killed) }
	else { Ok(()) }
}

/// # Listen.
///
/// Turn CTRL+C into an abort request, and ENTER into a skip request.
fn listen(handle: &RipHandle) {
	let signals = handle.signals();
	let _res = ctrlc::set_handler(move || { signals.request_abort(); });

	let signals = handle.signals();
	let _res = std::thread::Builder::new()
		.name("streamrip-stdin".to_owned())
		.spawn(move || {
			let stdin = std::io::stdin();
			let mut line = String::new();
			while ! signals.finished() {
				line.truncate(0);
				match stdin.read_line(&mut line) {
					Ok(0) | Err(_) => break,
					Ok(_) => { signals.request_skip(); },
				}
			}
		});
}

/// # Watch.
///
/// Relay status messages and keep a progress bar going for whichever track
/// is currently streaming, until the run is over.
fn watch(handle: &RipHandle) {
	let progress = Progless::default();
	let mut bar: Option<u32> = None;
	let mut done = 0_u32;

	loop {
		let notices = handle.notices();
		let snap = handle.progress();
		let draining = matches!(snap.phase, RipPhase::Draining);

		// Get the bar out of the way before printing anything else.
		if bar.is_some() && (! draining || ! notices.is_empty()) {
			progress.finish();
			bar = None;
		}
		for msg in notices { msg.eprint(); }

		if draining {
			if bar != Some(snap.track_index) {
				let _res = progress.try_reset(ms_to_secs(snap.song_duration).max(1));
				bar.replace(snap.track_index);
				done = 0;
			}

			let now = ms_to_secs(snap.song_position);
			if done < now {
				progress.increment_n(now - done);
				done = now;
			}
			progress.set_title(Some(progress_title(&snap)));
		}

		if handle.is_finished() { break; }
		std::thread::sleep(DISPLAY_POLL);
	}

	progress.finish();
	for msg in handle.notices() { msg.eprint(); }
}

/// # Progress Title.
fn progress_title(snap: &ProgressSnapshot) -> Msg {
	let mut eta = snap.song_eta.map_or(
		Cow::Borrowed("ETA: calculating…"),
		|s| Cow::Owned(format!("ETA: {}", NiceElapsed::from(s))),
	);
	if let Some(total) = snap.total_eta {
		eta = Cow::Owned(format!(
			concat!("{}", csi!(dim), " (all: {})", csi!(reset)),
			eta,
			NiceElapsed::from(total),
		));
	}

	Msg::new(
		(format!("Track {}/{}", snap.track_index + 1, snap.track_count), 199),
		eta,
	)
}

/// # Milliseconds to Seconds.
fn ms_to_secs(ms: u64) -> u32 { u32::try_from(ms / 1000).unwrap_or(u32::MAX) }

/// # Log Header.
///
/// Print a few basic setup details for the log. Only applies when -v/--verbose
/// is set.
fn log_header(settings: &Settings) {
	use std::io::Write;

	let writer = std::io::stdout();
	let mut handle = writer.lock();

	let _res = writeln!(
		&mut handle,
		concat!("#####
## StreamRip v", env!("CARGO_PKG_VERSION"), "
##
## Format:  {profile}
## Encoder: {encoder}
## Output:  {dir}
## Tracks:  {tracks}
## Date:    {date}
##
## Each track's events are listed in order, one per line:
##   * PHASE:     the rip moved to a new stage
##   * DISCARDED: stale audio from an earlier track was thrown out
##   * DROPPED:   audio was refused because the queue was full
##   * STALL:     consecutive polls that came up empty
##   * WRITTEN:   bytes handed to the encoder
##   * EXIT:      the encoder's exit code
#####"),
		profile=settings.opts.profile(),
		encoder=settings.opts.profile().encoder().map_or("built-in", |e| e.bin()),
		dir=settings.dir.to_string_lossy(),
		tracks=NiceU32::from(u32::try_from(settings.tracks.len()).unwrap_or(u32::MAX)),
		date=FmtUtc2k::now(),
	);

	let _res = handle.flush();
}

/// # Rip Summary.
///
/// Summarize the chosen settings before proceeding.
fn rip_summary(settings: &Settings) {
	let opts = &settings.opts;
	let nice_tracks = Cow::Owned(NiceU32::from(
		u32::try_from(settings.tracks.len()).unwrap_or(u32::MAX)
	).to_string());
	let nice_format = Cow::Owned(opts.profile().to_string());
	let nice_encoder = opts.profile().encoder().map_or(
		Cow::Borrowed("Built-in"),
		|e| Cow::Owned(format!(
			concat!("{}", csi!(reset, dim), " ({})"),
			e.bin(),
			e.package(),
		)),
	);
	let nice_output = Cow::Owned(format!(
		concat!("{}/", csi!(reset, dim), "## - ", csi!(reset, bold), "….{}"),
		settings.dir.to_string_lossy().trim_end_matches('/'),
		opts.profile().format().extension(),
	));
	let nice_existing = Cow::Owned(JoinFmt::new(
		[
			if opts.overwrite() { "Overwrite" } else { "Skip" },
			match opts.partial_check() {
				PartialCheck::None => "Trust Partials",
				PartialCheck::Weak => "Redo Known Partials",
				PartialCheck::Strict => "Redo Unverified",
			},
		].into_iter(),
		concat!(csi!(reset, dim), ", ", csi!(reset, bold)),
	).to_string());
	let nice_fail_log = settings.fail_log.as_ref().map_or(
		Cow::Borrowed("Disabled"),
		|p| Cow::Owned(p.to_string_lossy().into_owned()),
	);
	let nice_verbose = Cow::Borrowed(if opts.verbose() { "Yes" } else { "No" });

	let set = [
		("Tracks:", nice_tracks, true),
		("Format:", nice_format, true),
		("Encoder:", nice_encoder, true),
		("Existing:", nice_existing, true),
		("Fail Log:", nice_fail_log, settings.fail_log.is_some()),
		("Verbose:", nice_verbose, opts.verbose()),
		("Destination:", nice_output, true),
	];
	let max_label = set.iter().map(|(k, _, _)| k.len()).max().unwrap_or(0);

	// Print them!
	eprintln!(ansi!((bold, 199) "StreamRip…"));
	for (k, v, enabled) in set {
		if enabled {
			eprintln!(
				concat!("  {k:max_label$} ", bold!("{v}")),
				k=k,
				v=v,
				max_label=max_label,
			);
		}
		else {
			eprintln!(
				ansi!((dim, strike) "  {k:max_label$} {v}"),
				k=k,
				v=v,
				max_label=max_label,
			);
		}
	}
	eprintln!(dim!("  Press ENTER to skip a track, or CTRL+C to stop.\n"));
}
