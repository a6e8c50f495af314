//! Per-process descriptor fields (feature `userprog`).
//!
//! The process layer owns everything in here; the scheduler only preserves
//! it across context switches. Handles are opaque at this layer.

use crate::sync::Semaphore;
use crate::thread::Tid;

use alloc::vec::Vec;

/// Opaque handle to a process address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrSpaceHandle(pub usize);

/// Opaque handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle(pub usize);

/// Number of file-descriptor slots per process.
pub const MAX_OPEN_FILES: usize = 128;

/// File-descriptor table: dense array of optional handles.
pub struct FdTable {
    slots: [Option<FileHandle>; MAX_OPEN_FILES],
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_OPEN_FILES],
        }
    }

    /// Install a handle in the lowest free slot; returns the descriptor.
    pub fn insert(&mut self, handle: FileHandle) -> Option<usize> {
        let slot = self.slots.iter().position(|s| s.is_none())?;
        self.slots[slot] = Some(handle);
        Some(slot)
    }

    pub fn get(&self, fd: usize) -> Option<FileHandle> {
        self.slots.get(fd).copied().flatten()
    }

    pub fn remove(&mut self, fd: usize) -> Option<FileHandle> {
        self.slots.get_mut(fd).and_then(|s| s.take())
    }
}

/// Process-layer state carried on a thread descriptor.
pub struct ProcessInfo {
    pub addr_space: Option<AddrSpaceHandle>,
    pub children: Vec<Tid>,
    pub exit_status: i32,
    /// Whether the executable loaded successfully
    pub loaded: bool,
    /// Whether the parent already waited on this thread
    pub waited: bool,
    pub fd_table: FdTable,
    pub exec_file: Option<FileHandle>,
    /// Parent waits here until the child exits
    pub wait_child: Semaphore,
    /// Child waits here until the parent has collected the exit status
    pub wait_parent: Semaphore,
    /// Parent waits here until the child finishes loading
    pub load_done: Semaphore,
    /// Child waits here until the parent has observed a failed load, so the
    /// failure status is not torn down before the parent reads it
    pub load_error: Semaphore,
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInfo {
    pub const fn new() -> Self {
        Self {
            addr_space: None,
            children: Vec::new(),
            exit_status: 0,
            loaded: false,
            waited: false,
            fd_table: FdTable::new(),
            exec_file: None,
            wait_child: Semaphore::new(0),
            wait_parent: Semaphore::new(0),
            load_done: Semaphore::new(0),
            load_error: Semaphore::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_table_allocates_lowest_free_slot() {
        let mut table = FdTable::new();
        assert_eq!(table.insert(FileHandle(10)), Some(0));
        assert_eq!(table.insert(FileHandle(11)), Some(1));
        assert_eq!(table.remove(0), Some(FileHandle(10)));
        assert_eq!(table.insert(FileHandle(12)), Some(0));
        assert_eq!(table.get(1), Some(FileHandle(11)));
        assert_eq!(table.get(99), None);
    }
}
