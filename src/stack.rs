//! Private fixed-size stacks for uthreads.
//!
//! Each stack is an anonymous mapping with one `PROT_NONE` guard page at
//! its low end. Running past the usable region faults on the guard page;
//! there is no other overflow detection.

use crate::error::{Error, Result};
use std::io;
use std::ptr::NonNull;

/// A mapped stack region, unmapped on drop.
#[derive(Debug)]
pub struct Stack {
    base: NonNull<u8>,
    /// Total mapping length, guard page included.
    len: usize,
    guard: usize,
}

impl Stack {
    /// Map a stack with at least `size` usable bytes.
    pub fn new(size: usize) -> Result<Self> {
        let page = page_size();
        let Some((usable, len)) = size
            .div_ceil(page)
            .checked_mul(page)
            .and_then(|usable| Some((usable, usable.checked_add(page)?)))
            .filter(|&(_, len)| len <= isize::MAX as usize)
        else {
            return Err(Error::StackAllocation(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("stack size {size} is too large to map"),
            )));
        };

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(Error::StackAllocation(io::Error::last_os_error()));
        }
        let Some(base) = NonNull::new(ptr.cast::<u8>()) else {
            return Err(Error::StackAllocation(io::Error::other("mmap returned null")));
        };

        // Stack grows downward, so the guard goes at the lowest address
        if unsafe { libc::mprotect(ptr, page, libc::PROT_NONE) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::munmap(ptr, len);
            }
            return Err(Error::StackAllocation(err));
        }

        log::debug!("mapped uthread stack at {ptr:p} ({usable} usable bytes)");

        Ok(Stack {
            base,
            len,
            guard: page,
        })
    }

    /// Highest address of the usable region, aligned to 16 bytes (required by ABI).
    pub fn top(&self) -> usize {
        (self.base.as_ptr() as usize + self.len) & !0xF
    }

    /// Lowest usable address, just above the guard page.
    pub fn bottom(&self) -> usize {
        self.base.as_ptr() as usize + self.guard
    }

    /// Usable bytes, guard page excluded.
    pub fn size(&self) -> usize {
        self.len - self.guard
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base.as_ptr().cast(), self.len) };
        if ret != 0 {
            log::warn!(
                "munmap of uthread stack failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_rounded_to_pages() {
        let page = page_size();
        let stack = Stack::new(page + 1).unwrap();
        assert_eq!(stack.size(), 2 * page);
    }

    #[test]
    fn oversized_request_is_an_error() {
        for size in [usize::MAX, usize::MAX - page_size(), isize::MAX as usize] {
            let err = Stack::new(size).unwrap_err();
            assert!(matches!(err, Error::StackAllocation(_)), "size {size}");
        }
    }

    #[test]
    fn top_is_aligned_and_above_bottom() {
        let stack = Stack::new(16 * 1024).unwrap();
        assert_eq!(stack.top() % 16, 0);
        assert!(stack.top() > stack.bottom());
        assert!(stack.top() - stack.bottom() <= stack.size());
    }

    #[test]
    fn usable_region_is_writable() {
        let stack = Stack::new(16 * 1024).unwrap();
        unsafe {
            let low = stack.bottom() as *mut u8;
            let high = (stack.top() - 1) as *mut u8;
            low.write(0xAA);
            high.write(0x55);
            assert_eq!(low.read(), 0xAA);
            assert_eq!(high.read(), 0x55);
        }
    }
}
