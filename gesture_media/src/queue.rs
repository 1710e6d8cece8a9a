//! Drop-oldest frame queue between capture and recognition.
//!
//! Frames are cheap to lose, so a full queue evicts its oldest entry to make
//! room for the newest one instead of blocking the capture thread. Committed
//! commands never travel through this type.

use crossbeam_channel::{Receiver, Sender, TrySendError};

pub struct FrameQueue<T> {
    tx:    Sender<T>,
    /// Second handle on the receiving side, used only to evict. It also
    /// keeps the channel connected, so the capture thread watches the stop
    /// flag rather than waiting for a disconnect.
    evict: Receiver<T>,
}

impl<T> FrameQueue<T> {
    /// Returns the producer half and the consumer receiver.
    pub fn bounded(capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx, evict: rx.clone() }, rx)
    }

    /// Enqueue `item`, evicting the oldest queued items while full.
    /// Returns how many frames were dropped to make room.
    pub fn push(&self, mut item: T) -> usize {
        let mut dropped = 0;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return dropped,
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    item = back;
                    if self.evict.try_recv().is_ok() {
                        dropped += 1;
                    }
                }
            }
        }
    }

    pub fn len(&self)      -> usize { self.tx.len() }
    pub fn is_empty(&self) -> bool  { self.tx.is_empty() }
}
