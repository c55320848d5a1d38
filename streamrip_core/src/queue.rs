/*!
# StreamRip: Frame Queue
*/

use crossbeam_channel::{
	Receiver,
	RecvTimeoutError,
	Sender,
	TrySendError,
};
use std::{
	num::NonZeroUsize,
	sync::{
		Arc,
		atomic::{
			AtomicU64,
			Ordering::Relaxed,
		},
	},
	time::Duration,
};



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Frame Chunk.
///
/// A block of decoded, interleaved 16-bit PCM as delivered by the session.
pub struct FrameChunk {
	sample_rate: u32,
	frames: u32,
	payload: Vec<u8>,
}

impl FrameChunk {
	#[must_use]
	/// # New.
	pub const fn new(sample_rate: u32, frames: u32, payload: Vec<u8>) -> Self {
		Self { sample_rate, frames, payload }
	}

	#[must_use]
	/// # Sample Rate.
	pub const fn sample_rate(&self) -> u32 { self.sample_rate }

	#[must_use]
	/// # Frame Count.
	pub const fn frames(&self) -> u32 { self.frames }

	#[must_use]
	/// # Payload.
	pub fn payload(&self) -> &[u8] { &self.payload }

	#[must_use]
	/// # Payload Length.
	pub fn len(&self) -> usize { self.payload.len() }

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.payload.is_empty() }
}



#[derive(Debug, Clone)]
/// # Frame Queue.
///
/// An ordered, multi-producer channel carrying chunks from the delivery
/// callback to the orchestrator. Enqueueing never blocks; dequeueing waits up
/// to a timeout.
///
/// By default the queue is unbounded. If a capacity is set and exceeded, new
/// chunks are dropped (and counted) rather than blocking the caller.
pub struct FrameQueue {
	tx: Sender<FrameChunk>,
	rx: Receiver<FrameChunk>,
	dropped: Arc<AtomicU64>,
}

impl FrameQueue {
	#[must_use]
	/// # New.
	pub fn new(capacity: Option<NonZeroUsize>) -> Self {
		let (tx, rx) = match capacity {
			Some(cap) => crossbeam_channel::bounded(cap.get()),
			None => crossbeam_channel::unbounded(),
		};
		Self {
			tx,
			rx,
			dropped: Arc::new(AtomicU64::new(0)),
		}
	}

	#[must_use]
	/// # Try Enqueue.
	///
	/// Push a chunk onto the end of the queue, returning `false` if it had to
	/// be dropped.
	pub fn try_enqueue(&self, chunk: FrameChunk) -> bool {
		match self.tx.try_send(chunk) {
			Ok(()) => true,
			Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
				self.dropped.fetch_add(1, Relaxed);
				false
			},
		}
	}

	#[must_use]
	/// # Dequeue.
	///
	/// Wait up to `timeout` for the next chunk.
	pub fn dequeue(&self, timeout: Duration) -> Option<FrameChunk> {
		match self.rx.recv_timeout(timeout) {
			Ok(chunk) => Some(chunk),
			Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
		}
	}

	#[must_use]
	/// # Is Empty?
	pub fn is_empty(&self) -> bool { self.rx.is_empty() }

	#[must_use]
	/// # Length.
	pub fn len(&self) -> usize { self.rx.len() }

	/// # Discard Pending.
	///
	/// Throw away anything still queued, returning the number of chunks
	/// removed. This is used between tracks so stragglers from a stopped
	/// stream can't end up in the next file.
	pub fn discard_pending(&self) -> usize {
		self.rx.try_iter().count()
	}

	/// # Take Dropped.
	///
	/// Return and reset the number of chunks dropped since the last call.
	pub fn take_dropped(&self) -> u64 { self.dropped.swap(0, Relaxed) }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_fifo() {
		let queue = FrameQueue::new(None);
		let producer = queue.clone();

		// Deliver from another thread, like the session would.
		let handle = std::thread::spawn(move || {
			for i in 0..500_u32 {
				let chunk = FrameChunk::new(44_100, 1, i.to_le_bytes().to_vec());
				assert!(producer.try_enqueue(chunk), "Unbounded enqueue failed.");
			}
		});
		handle.join().expect("Producer panicked.");

		for i in 0..500_u32 {
			let chunk = queue.dequeue(Duration::from_millis(50)).expect("Missing chunk.");
			assert_eq!(chunk.payload(), i.to_le_bytes().as_slice(), "Chunk out of order.");
		}
		assert!(queue.is_empty());
		assert!(queue.dequeue(Duration::from_millis(5)).is_none());
		assert_eq!(queue.take_dropped(), 0);
	}

	#[test]
	fn t_bounded() {
		let queue = FrameQueue::new(NonZeroUsize::new(2));
		assert!(queue.try_enqueue(FrameChunk::new(44_100, 1, vec![1; 4])));
		assert!(queue.try_enqueue(FrameChunk::new(44_100, 1, vec![2; 4])));
		assert!(! queue.try_enqueue(FrameChunk::new(44_100, 1, vec![3; 4])));
		assert_eq!(queue.len(), 2);
		assert_eq!(queue.take_dropped(), 1);
		assert_eq!(queue.take_dropped(), 0);

		assert_eq!(queue.discard_pending(), 2);
		assert!(queue.is_empty());
	}
}
