//! Stop-and-wait bookkeeping for both transfer directions.
//!
//! These types never touch the network. The drivers in `client` feed them
//! decoded packets and act on what they return.

/// What to do with a received DATA packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataAction {
    /// The expected block: write it and acknowledge it. `last` is set for a
    /// short block, which ends the transfer.
    Accept { last: bool },
    /// An already acknowledged block whose ACK got lost: acknowledge again,
    /// write nothing.
    Duplicate,
    /// Not the expected block and not behind it.
    Ignore,
    /// Larger than the negotiated block size.
    Oversized,
}

/// Download side: which block comes next.
#[derive(Debug, Clone)]
pub(crate) struct Receiving {
    expected: u16,
    block_size: u16,
}

impl Receiving {
    pub fn new(block_size: u16) -> Self {
        Self {
            expected: 1,
            block_size,
        }
    }

    pub fn expected(&self) -> u16 {
        self.expected
    }

    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    pub fn set_block_size(&mut self, block_size: u16) {
        self.block_size = block_size;
    }

    pub fn on_data(&mut self, block: u16, len: usize) -> DataAction {
        if len > usize::from(self.block_size) {
            DataAction::Oversized
        } else if block == self.expected {
            self.expected = self.expected.wrapping_add(1);
            DataAction::Accept {
                last: len < usize::from(self.block_size),
            }
        } else if is_behind(block, self.expected) {
            DataAction::Duplicate
        } else {
            DataAction::Ignore
        }
    }
}

// Block numbers wrap, so "lower" means within the half of the sequence
// space just behind `expected`.
fn is_behind(block: u16, expected: u16) -> bool {
    let distance = expected.wrapping_sub(block);
    distance != 0 && distance < 0x8000
}

/// What to do with a received ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AckAction {
    /// Previous block confirmed: send this block number next.
    Send(u16),
    /// The final block was confirmed.
    Done,
    /// Not for the outstanding block.
    Stale,
}

/// Upload side: the block about to be sent.
#[derive(Debug, Clone)]
pub(crate) struct Sending {
    next: u16,
    block_size: u16,
    finished: bool,
}

impl Sending {
    pub fn new(block_size: u16) -> Self {
        Self {
            next: 1,
            block_size,
            finished: false,
        }
    }

    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    pub fn set_block_size(&mut self, block_size: u16) {
        self.block_size = block_size;
    }

    /// Block number of the outstanding packet (0 for the request).
    pub fn outstanding(&self) -> u16 {
        self.next.wrapping_sub(1)
    }

    pub fn on_ack(&self, block: u16) -> AckAction {
        if block != self.outstanding() {
            AckAction::Stale
        } else if self.finished {
            AckAction::Done
        } else {
            AckAction::Send(self.next)
        }
    }

    /// Records that a chunk of `len` bytes went out as the next block.
    pub fn sent(&mut self, len: usize) {
        self.next = self.next.wrapping_add(1);
        if len < usize::from(self.block_size) {
            self.finished = true;
        }
    }
}
