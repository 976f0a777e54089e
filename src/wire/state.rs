//! Reader-side bookkeeping shared by both encodings.
//!
//! Reading a record pushes a frame carrying the read limit clipped to the
//! record's measured length plus the saved positions of fields that were
//! encountered while scanning for some other name. Saved positions let a
//! reader pull fields in any order without re-scanning from the record
//! start; they reset when the frame pops and between documents.

use smallvec::SmallVec;

#[derive(Debug)]
pub struct ReadFrame {
    /// Last offset a read inside this frame may touch.
    pub limit: usize,
    /// Cursor position to restore when the frame closes.
    pub resume: usize,
    /// Field positions noted while scanning out of order.
    pub saved: Vec<(String, usize)>,
}

#[derive(Debug, Default)]
pub struct ReaderState {
    frames: SmallVec<[ReadFrame; 4]>,
    base_limit: usize,
    /// Saved positions for the top level of the current document.
    top_saved: Vec<(String, usize)>,
}

impl ReaderState {
    pub fn reset(&mut self, base_limit: usize) {
        self.frames.clear();
        self.top_saved.clear();
        self.base_limit = base_limit;
    }

    pub fn limit(&self) -> usize {
        self.frames.last().map(|f| f.limit).unwrap_or(self.base_limit)
    }

    pub fn set_base_limit(&mut self, limit: usize) {
        self.base_limit = limit;
    }

    pub fn base_limit(&self) -> usize {
        self.base_limit
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, limit: usize, resume: usize) {
        self.frames.push(ReadFrame {
            limit,
            resume,
            saved: Vec::new(),
        });
    }

    pub fn pop(&mut self) -> Option<ReadFrame> {
        self.frames.pop()
    }

    pub fn save(&mut self, name: String, pos: usize) {
        match self.frames.last_mut() {
            Some(f) => f.saved.push((name, pos)),
            None => self.top_saved.push((name, pos)),
        }
    }

    /// Takes a previously saved position for `name`, if any.
    pub fn take_saved(&mut self, name: &str) -> Option<usize> {
        let saved = match self.frames.last_mut() {
            Some(f) => &mut f.saved,
            None => &mut self.top_saved,
        };
        let idx = saved.iter().position(|(n, _)| n == name)?;
        Some(saved.remove(idx).1)
    }
}
