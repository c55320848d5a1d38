/*!
# StreamRip: Library

This is the library half of StreamRip. A [`Session`] delivers decoded audio
into a [`FrameQueue`] from whatever threads it likes, an [`EventPump`] keeps
the session's own housekeeping ticking, and a [`Ripper`] drains the queue
into an [`EncoderProcess`], one track at a time.
*/

#![deny(unsafe_code)]

#![warn(
	clippy::filetype_is_file,
	clippy::integer_division,
	clippy::needless_borrow,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::suboptimal_flops,
	clippy::unneeded_field_pattern,
	macro_use_extern_crate,
	missing_copy_implementations,
	missing_debug_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unreachable_pub,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]

#![allow(
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::redundant_pub_crate,
)]

mod encoder;
mod error;
mod journal;
mod progress;
mod pump;
mod queue;
mod rip;
mod session;
mod signal;
mod utility;
mod wav;

pub use encoder::{
	CHANNELS,
	Encoder,
	EncoderProcess,
	EncoderProfile,
	OutputFormat,
	Quality,
	SAMPLE_RATE,
	StereoMode,
};
pub use error::StreamRipError;
pub use journal::{
	JOURNAL_BASE,
	PartialCheck,
	RipJournal,
};
pub use progress::{
	PROGRESS_TICK,
	ProgressBoard,
	ProgressEstimator,
	ProgressSnapshot,
};
pub use pump::{
	EventPump,
	PUMP_POLL,
	PumpNotifier,
};
pub use queue::{
	FrameChunk,
	FrameQueue,
};
pub use rip::{
	RipHandle,
	RipPhase,
	Ripper,
	opts::{
		DRAIN_POLL,
		RipOptions,
		STALL_LIMIT,
	},
	report::{
		RipOutcome,
		RipReport,
		RipSummary,
		SkipReason,
	},
};
pub use session::{
	FlatPaths,
	NoTags,
	OutputPaths,
	PostRun,
	Session,
	Tagger,
	Track,
};
pub use signal::{
	ConnectionState,
	RipSignals,
	SessionSink,
};
pub use wav::WavSession;
