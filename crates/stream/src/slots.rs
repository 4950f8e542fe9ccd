/// Free-list index allocator backing one fixed-capacity instance pool.
///
/// Slots below the high-water mark form the active range the GPU draws;
/// released slots are hidden by the caller and recycled before the range
/// grows again.
#[derive(Debug, Clone)]
pub struct SlotPool {
    capacity: u32,
    high_water: u32,
    free: Vec<u32>,
    in_use: Vec<bool>,
    live: u32,
}

impl SlotPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            high_water: 0,
            free: Vec::new(),
            in_use: Vec::new(),
            live: 0,
        }
    }

    /// Take a slot: recycled first, otherwise extend the active range.
    /// Returns `None` when the pool is at capacity.
    pub fn acquire(&mut self) -> Option<u32> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.high_water < self.capacity => {
                let slot = self.high_water;
                self.high_water += 1;
                self.in_use.push(false);
                slot
            }
            None => return None,
        };
        self.in_use[slot as usize] = true;
        self.live += 1;
        Some(slot)
    }

    /// Return a slot to the free-list. Returns `false` (and changes nothing)
    /// if the slot was not live.
    pub fn release(&mut self, slot: u32) -> bool {
        match self.in_use.get_mut(slot as usize) {
            Some(used) if *used => {
                *used = false;
                self.free.push(slot);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self, slot: u32) -> bool {
        self.in_use.get(slot as usize).copied().unwrap_or(false)
    }

    /// Instance count the GPU draws (live and hidden slots alike).
    pub fn active_count(&self) -> u32 {
        self.high_water
    }

    pub fn live_count(&self) -> u32 {
        self.live
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.high_water >= self.capacity
    }
}
