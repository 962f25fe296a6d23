use std::collections::VecDeque;

/// Resources waiting for the GPU submission that may still reference them to complete.
///
/// `defer` parks an item; `mark_submitted` ties everything parked so far to a new submission
/// generation; `release_through(g)` hands back every item whose generation is `<= g`.
#[derive(Debug)]
pub struct ReleaseQueue<T> {
    parked: Vec<T>,
    submitted: VecDeque<(u64, Vec<T>)>,
    generation: u64,
}

impl<T> ReleaseQueue<T> {
    pub fn new() -> Self {
        Self {
            parked: Vec::new(),
            submitted: VecDeque::new(),
            generation: 0,
        }
    }

    pub fn defer(&mut self, item: T) {
        self.parked.push(item);
    }

    /// Close the current batch. Returns the generation that must complete before it is released.
    pub fn mark_submitted(&mut self) -> u64 {
        self.generation += 1;
        if !self.parked.is_empty() {
            let batch = std::mem::take(&mut self.parked);
            self.submitted.push_back((self.generation, batch));
        }
        self.generation
    }

    /// Release every batch submitted at or before `completed`. Returns the number of items released.
    pub fn release_through(&mut self, completed: u64, mut release: impl FnMut(T)) -> usize {
        let mut n = 0;
        while self
            .submitted
            .front()
            .is_some_and(|(g, _)| *g <= completed)
        {
            if let Some((_, batch)) = self.submitted.pop_front() {
                n += batch.len();
                batch.into_iter().for_each(&mut release);
            }
        }
        n
    }

    /// Release everything, parked or submitted. Only valid once the device is idle.
    pub fn release_all(&mut self, mut release: impl FnMut(T)) -> usize {
        let mut n = 0;
        for (_, batch) in self.submitted.drain(..) {
            n += batch.len();
            batch.into_iter().for_each(&mut release);
        }
        n += self.parked.len();
        self.parked.drain(..).for_each(&mut release);
        n
    }

    pub fn pending(&self) -> usize {
        self.parked.len() + self.submitted.iter().map(|(_, b)| b.len()).sum::<usize>()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> Default for ReleaseQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
