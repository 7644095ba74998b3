//! Growable ring-buffer FIFO
//!
//! Elements live in a fixed slot array addressed by a moving head; popping
//! from the front is O(1) and never shifts memory. When every slot is taken,
//! the array is doubled and the unread elements are moved to the front of the
//! new array in FIFO order, so a full copy is only paid at doubling
//! boundaries (amortized O(1) push).

const INITIAL_SLOTS: usize = 10;

/// Single-threaded FIFO queue on top of a ring buffer
#[derive(Debug)]
pub struct FifoQueue<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> FifoQueue<T> {
    /// Create an empty queue with the default number of slots
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_SLOTS)
    }

    /// Create an empty queue with room for `slots` elements before growing
    pub fn with_capacity(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            slots: (0..slots).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Append an element at the back, doubling storage if every slot is used
    pub fn push(&mut self, value: T) {
        if self.len == self.slots.len() {
            self.grow();
        }

        let tail = (self.head + self.len) % self.slots.len();
        self.slots[tail] = Some(value);
        self.len += 1;
    }

    /// Remove and return the front element
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }

    /// Borrow the front element
    pub fn front(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Borrow the back element
    pub fn back(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let tail = (self.head + self.len - 1) % self.slots.len();
        self.slots[tail].as_ref()
    }

    /// Number of queued elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots currently allocated
    #[inline]
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    fn grow(&mut self) {
        let old_slots = self.slots.len();
        let mut slots: Vec<Option<T>> = Vec::with_capacity(old_slots * 2);

        for i in 0..self.len {
            let index = (self.head + i) % old_slots;
            slots.push(self.slots[index].take());
        }
        slots.resize_with(old_slots * 2, || None);

        self.slots = slots;
        self.head = 0;
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
