use core::ops::{Deref, DerefMut};
use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::regressor::Regressor;

// This is a helper for UNSAFELY sharing data between threads

struct SharedCell<T>(UnsafeCell<T>);

// SUPER UNSAFE
// Every holder gets a &mut to the same value without any locking.
// That is exactly what Hogwild training wants, and nothing else should use it.
unsafe impl<T: Send> Sync for SharedCell<T> {}

pub struct UnsafelySharable<T> {
    content: Arc<SharedCell<T>>,
}

pub type SharedRegressor = UnsafelySharable<Regressor>;

impl<T> UnsafelySharable<T> {
    pub fn new(a: T) -> UnsafelySharable<T> {
        UnsafelySharable {
            content: Arc::new(SharedCell(UnsafeCell::new(a))),
        }
    }

    /// Gets the value back once every other handle has been dropped
    pub fn into_inner(self) -> Result<T, UnsafelySharable<T>> {
        match Arc::try_unwrap(self.content) {
            Ok(cell) => Ok(cell.0.into_inner()),
            Err(content) => Err(UnsafelySharable { content }),
        }
    }

    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.content)
    }
}

impl<T> Clone for UnsafelySharable<T> {
    fn clone(&self) -> UnsafelySharable<T> {
        UnsafelySharable {
            content: Arc::clone(&self.content),
        }
    }
}

impl<T> Deref for UnsafelySharable<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.content.0.get() }
    }
}

impl<T> DerefMut for UnsafelySharable<T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.content.0.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_writes_and_into_inner() {
        let mut a = UnsafelySharable::new(vec![0u32; 4]);
        let mut b = a.clone();
        assert_eq!(a.handle_count(), 2);
        a[0] = 1;
        b[1] = 2;
        assert_eq!(*a, vec![1, 2, 0, 0]);

        let a = match a.into_inner() {
            Ok(_) => panic!("b is still alive"),
            Err(a) => a,
        };
        drop(b);
        assert_eq!(a.into_inner().ok().unwrap(), vec![1, 2, 0, 0]);
    }

    #[test]
    fn test_shared_across_threads() {
        let shared = UnsafelySharable::new(vec![0u32; 8]);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mut s = shared.clone();
                std::thread::spawn(move || s[i] = i as u32 + 1)
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*shared, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
