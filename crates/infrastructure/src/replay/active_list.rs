use tokio::time::Instant;

/// Stable handle of an entry in an [`ActiveList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Debug)]
pub struct ActiveEntry<T> {
    pub started: Instant,
    pub value: T,
}

#[derive(Debug)]
struct Node<T> {
    entry: ActiveEntry<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list over a slot arena, ordered by insertion.
///
/// Entries are only ever appended at the tail with the current time, so the
/// head is always the oldest entry. All operations are O(1).
#[derive(Debug)]
pub struct ActiveList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for ActiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActiveList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_back(&mut self, started: Instant, value: T) -> SlotId {
        let node = Node {
            entry: ActiveEntry { started, value },
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(node) = self.slots[tail].as_mut() {
                    node.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        SlotId(index)
    }

    /// Unlinks and returns the entry, `None` if the slot is not occupied.
    pub fn remove(&mut self, slot: SlotId) -> Option<ActiveEntry<T>> {
        let node = self.slots.get_mut(slot.0)?.take()?;

        match node.prev {
            Some(prev) => {
                if let Some(p) = self.slots[prev].as_mut() {
                    p.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(n) = self.slots[next].as_mut() {
                    n.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }

        self.free.push(slot.0);
        self.len -= 1;
        Some(node.entry)
    }

    pub fn front(&self) -> Option<(SlotId, &ActiveEntry<T>)> {
        let head = self.head?;
        self.slots[head]
            .as_ref()
            .map(|node| (SlotId(head), &node.entry))
    }

    pub fn pop_front(&mut self) -> Option<(SlotId, ActiveEntry<T>)> {
        let head = SlotId(self.head?);
        self.remove(head).map(|entry| (head, entry))
    }

    pub fn get(&self, slot: SlotId) -> Option<&ActiveEntry<T>> {
        self.slots.get(slot.0)?.as_ref().map(|node| &node.entry)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut ActiveEntry<T>> {
        self.slots
            .get_mut(slot.0)?
            .as_mut()
            .map(|node| &mut node.entry)
    }

    /// Re-inserts an entry at the tail with a new start time, keeping its slot.
    pub fn move_to_back(&mut self, slot: SlotId, started: Instant) -> bool {
        let Some(entry) = self.remove(slot) else {
            return false;
        };
        // the slot we just freed is on top of the free list
        let reinserted = self.push_back(started, entry.value);
        debug_assert_eq!(reinserted, slot);
        true
    }

    /// Iterates from the oldest to the newest entry.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Removes every entry, oldest first.
    pub fn drain(&mut self) -> Vec<(SlotId, ActiveEntry<T>)> {
        let mut out = Vec::with_capacity(self.len);
        while let Some(item) = self.pop_front() {
            out.push(item);
        }
        out
    }
}

pub struct Iter<'a, T> {
    list: &'a ActiveList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (SlotId, &'a ActiveEntry<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = self.list.slots[index].as_ref()?;
        self.cursor = node.next;
        Some((SlotId(index), &node.entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn values(list: &ActiveList<u32>) -> Vec<u32> {
        list.iter().map(|(_, e)| e.value).collect()
    }

    fn is_sorted(list: &ActiveList<u32>) -> bool {
        let starts: Vec<Instant> = list.iter().map(|(_, e)| e.started).collect();
        starts.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn keeps_insertion_order() {
        let base = Instant::now();
        let mut list = ActiveList::new();
        for i in 0..5 {
            list.push_back(base + Duration::from_millis(i as u64), i);
        }
        assert_eq!(values(&list), vec![0, 1, 2, 3, 4]);
        assert_eq!(list.front().map(|(_, e)| e.value), Some(0));
    }

    #[test]
    fn removes_from_middle_and_ends() {
        let base = Instant::now();
        let mut list = ActiveList::new();
        let slots: Vec<SlotId> = (0..5).map(|i| list.push_back(base, i)).collect();

        assert_eq!(list.remove(slots[2]).map(|e| e.value), Some(2));
        assert_eq!(list.remove(slots[0]).map(|e| e.value), Some(0));
        assert_eq!(list.remove(slots[4]).map(|e| e.value), Some(4));
        assert_eq!(values(&list), vec![1, 3]);
        assert_eq!(list.len(), 2);

        assert!(list.remove(slots[2]).is_none(), "double remove is a no-op");
    }

    #[test]
    fn freed_slots_are_reused() {
        let base = Instant::now();
        let mut list = ActiveList::new();
        let a = list.push_back(base, 1);
        list.push_back(base, 2);
        list.remove(a);
        let c = list.push_back(base, 3);
        assert_eq!(a, c);
        assert_eq!(values(&list), vec![2, 3]);
    }

    #[test]
    fn move_to_back_refreshes_start() {
        let base = Instant::now();
        let mut list = ActiveList::new();
        let a = list.push_back(base, 1);
        list.push_back(base + Duration::from_millis(1), 2);

        assert!(list.move_to_back(a, base + Duration::from_millis(5)));
        assert_eq!(values(&list), vec![2, 1]);
        assert_eq!(list.get(a).map(|e| e.value), Some(1));
        assert!(is_sorted(&list));
    }

    #[test]
    fn ttl_reaping_preserves_ordering() {
        let ttl = Duration::from_millis(10);
        let base = Instant::now();
        let mut list = ActiveList::new();
        let mut clock = 0u64;

        // interleave insertions with head reaping
        for round in 0..50u32 {
            for _ in 0..(round % 4 + 1) {
                clock += 3;
                list.push_back(base + Duration::from_millis(clock), round);
            }
            let now = base + Duration::from_millis(clock);
            while let Some((_, entry)) = list.front() {
                if entry.started + ttl > now {
                    break;
                }
                list.pop_front();
            }
            assert!(is_sorted(&list), "round {round}");
            if let Some((_, entry)) = list.front() {
                assert!(entry.started + ttl > now);
            }
        }
    }

    #[test]
    fn drain_empties_oldest_first() {
        let base = Instant::now();
        let mut list = ActiveList::new();
        for i in 0..3 {
            list.push_back(base, i);
        }
        let drained: Vec<u32> = list.drain().into_iter().map(|(_, e)| e.value).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert!(list.is_empty());
        assert!(list.front().is_none());
    }
}
