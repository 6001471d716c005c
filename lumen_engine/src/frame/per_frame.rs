/// Fixed-size per-slot storage for frames in flight

use std::ops::{Index, IndexMut};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// One value per frame slot
#[derive(Debug, Clone)]
pub struct PerFrame<T> {
    values: [T; MAX_FRAMES_IN_FLIGHT],
}

impl<T> PerFrame<T> {
    /// Build each slot's value from its index
    pub fn from_fn(f: impl FnMut(usize) -> T) -> Self {
        Self { values: std::array::from_fn(f) }
    }

    /// Build each slot's value with a fallible constructor.
    ///
    /// Values created before a failure are handed to `cleanup` so partially
    /// built GPU objects can be released.
    pub fn try_from_fn<E>(
        mut f: impl FnMut(usize) -> Result<T, E>,
        mut cleanup: impl FnMut(T),
    ) -> Result<Self, E> {
        let mut built = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            match f(slot) {
                Ok(value) => built.push(value),
                Err(e) => {
                    for value in built {
                        cleanup(value);
                    }
                    return Err(e);
                }
            }
        }
        let values: [T; MAX_FRAMES_IN_FLIGHT] = match built.try_into() {
            Ok(values) => values,
            Err(_) => unreachable!("exactly MAX_FRAMES_IN_FLIGHT values were built"),
        };
        Ok(Self { values })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.values.iter_mut()
    }

    /// Consume into the slot values, in slot order
    pub fn into_values(self) -> [T; MAX_FRAMES_IN_FLIGHT] {
        self.values
    }
}

impl<T: Clone> PerFrame<T> {
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<usize> for PerFrame<T> {
    type Output = T;

    fn index(&self, slot: usize) -> &T {
        &self.values[slot]
    }
}

impl<T> IndexMut<usize> for PerFrame<T> {
    fn index_mut(&mut self, slot: usize) -> &mut T {
        &mut self.values[slot]
    }
}

#[cfg(test)]
#[path = "per_frame_tests.rs"]
mod tests;
