use system::hprintln;

use crate::buddy::block_size;
use crate::config::ORDER_COUNT;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OrderStats {
    pub free: usize,
    pub used: usize,
}

/// Snapshot of a heap's block accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub committed: usize,
    pub grow_calls: usize,
    pub orders: [OrderStats; ORDER_COUNT],
}

impl HeapStats {
    pub fn free_bytes(&self) -> usize {
        self.orders
            .iter()
            .enumerate()
            .map(|(order, entry)| entry.free * block_size(order))
            .sum()
    }

    pub fn used_bytes(&self) -> usize {
        self.orders
            .iter()
            .enumerate()
            .map(|(order, entry)| entry.used * block_size(order))
            .sum()
    }

    pub fn used_blocks(&self) -> usize {
        self.orders.iter().map(|entry| entry.used).sum()
    }

    pub fn largest_free_block(&self) -> usize {
        self.orders
            .iter()
            .enumerate()
            .rev()
            .find(|(_, entry)| entry.free > 0)
            .map_or(0, |(order, _)| block_size(order))
    }

    /// Percentage of free bytes that lie outside the largest free block.
    pub fn fragmentation(&self) -> usize {
        let free = self.free_bytes();
        if free == 0 {
            return 0;
        }
        (free - self.largest_free_block()) * 100 / free
    }
}

pub fn print_stats(stats: &HeapStats) {
    hprintln!(
        "[HEAP] committed: {} KB in {} growth calls",
        stats.committed / 1024,
        stats.grow_calls
    );
    for (order, entry) in stats.orders.iter().enumerate() {
        if entry.free == 0 && entry.used == 0 {
            continue;
        }
        hprintln!(
            "[HEAP] order {:2} ({:7} KB): {} free, {} used",
            order,
            block_size(order) / 1024,
            entry.free,
            entry.used
        );
    }
    hprintln!(
        "[HEAP] free: {} KB, used: {} KB, largest free: {} KB, fragmentation: {}%",
        stats.free_bytes() / 1024,
        stats.used_bytes() / 1024,
        stats.largest_free_block() / 1024,
        stats.fragmentation()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with(free: &[(usize, usize)]) -> HeapStats {
        let mut orders = [OrderStats::default(); ORDER_COUNT];
        for &(order, count) in free {
            orders[order].free = count;
        }
        HeapStats {
            committed: 0,
            grow_calls: 0,
            orders,
        }
    }

    #[test]
    fn empty_heap_has_no_fragmentation() {
        let stats = stats_with(&[]);
        assert_eq!(stats.free_bytes(), 0);
        assert_eq!(stats.largest_free_block(), 0);
        assert_eq!(stats.fragmentation(), 0);
    }

    #[test]
    fn single_free_block_is_unfragmented() {
        let stats = stats_with(&[(4, 1)]);
        assert_eq!(stats.largest_free_block(), 64 * 1024);
        assert_eq!(stats.fragmentation(), 0);
    }

    #[test]
    fn scattered_free_blocks_count_as_fragmented() {
        let stats = stats_with(&[(0, 2), (1, 1)]);
        assert_eq!(stats.free_bytes(), 16 * 1024);
        assert_eq!(stats.largest_free_block(), 8 * 1024);
        assert_eq!(stats.fragmentation(), 50);
    }
}
