// Grid resize - grows or shrinks the step axis in fixed segments

use crate::sequencer::grid::NoteGrid;
use tracing::debug;

/// Bounds and increment for step-count changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePolicy {
    pub min_steps: usize,
    pub max_steps: usize,
    pub segment_size: usize,
}

impl ResizePolicy {
    pub fn new(min_steps: usize, max_steps: usize, segment_size: usize) -> Self {
        assert!(min_steps > 0, "Minimum step count must be positive");
        assert!(min_steps <= max_steps, "Minimum step count exceeds maximum");
        assert!(segment_size > 0, "Segment size must be positive");
        Self {
            min_steps,
            max_steps,
            segment_size,
        }
    }

    /// Whether a step count lies inside `[min_steps, max_steps]`
    pub fn allows(&self, step_count: usize) -> bool {
        (self.min_steps..=self.max_steps).contains(&step_count)
    }

    /// Append one segment of empty columns
    ///
    /// Returns the new step count, or `None` when the grid is already at the
    /// maximum (the grid is left untouched).
    pub fn grow(&self, grid: &mut NoteGrid) -> Option<usize> {
        let current = grid.step_count();
        let target = current + self.segment_size;
        if current >= self.max_steps || target > self.max_steps {
            debug!(current, max = self.max_steps, "grow ignored at maximum length");
            return None;
        }
        grid.set_step_count(target);
        Some(target)
    }

    /// Remove the last segment of columns
    ///
    /// Heads inside the removed region are dropped; notes that started before
    /// it keep their head and have their duration clamped to the new end.
    pub fn shrink(&self, grid: &mut NoteGrid) -> Option<usize> {
        let current = grid.step_count();
        if current <= self.min_steps || current < self.min_steps + self.segment_size {
            debug!(current, min = self.min_steps, "shrink ignored at minimum length");
            return None;
        }
        let target = current - self.segment_size;
        grid.set_step_count(target);
        Some(target)
    }
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self::new(16, 128, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_shape(grid: &NoteGrid) {
        let (heads, durations) = grid.to_matrices();
        for (h_pitches, d_pitches) in heads.iter().zip(&durations) {
            for (h, d) in h_pitches.iter().zip(d_pitches) {
                assert_eq!(h.len(), grid.step_count());
                assert_eq!(d.len(), grid.step_count());
            }
        }
    }

    #[test]
    fn test_grow_appends_segment() {
        let policy = ResizePolicy::default();
        let mut grid = NoteGrid::new(&[12, 12], 16);
        grid.create_sustained(0, 0, 2, 5);

        assert_eq!(policy.grow(&mut grid), Some(20));
        assert_eq!(grid.step_count(), 20);
        assert_eq!(grid.duration(0, 0, 2), 4);
        assert!(!grid.is_active(0, 0, 19));
        assert_eq!(grid.duration(1, 3, 18), 1);
        assert_shape(&grid);
    }

    #[test]
    fn test_grow_at_maximum_is_noop() {
        let policy = ResizePolicy::new(4, 8, 4);
        let mut grid = NoteGrid::new(&[2], 8);
        let before = grid.clone();
        assert_eq!(policy.grow(&mut grid), None);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_shrink_at_minimum_is_noop() {
        let policy = ResizePolicy::default();
        let mut grid = NoteGrid::new(&[12], 16);
        grid.toggle(0, 0, 15);
        let before = grid.clone();
        assert_eq!(policy.shrink(&mut grid), None);
        assert_eq!(grid, before);
    }

    #[test]
    fn test_shrink_clamps_sustain_and_drops_removed_heads() {
        let policy = ResizePolicy::default();
        let mut grid = NoteGrid::new(&[12], 24);
        grid.create_sustained(0, 0, 18, 21);
        grid.toggle(0, 1, 22);

        assert_eq!(policy.shrink(&mut grid), Some(20));
        assert!(grid.is_active(0, 0, 18));
        assert_eq!(grid.duration(0, 0, 18), 2);
        assert_eq!(grid.note_count(), 1);
        assert_shape(&grid);
    }

    #[test]
    fn test_grow_then_shrink_restores_length() {
        let policy = ResizePolicy::default();
        let mut grid = NoteGrid::new(&[12, 12, 12], 16);
        grid.toggle(2, 5, 7);
        policy.grow(&mut grid);
        policy.grow(&mut grid);
        assert_eq!(grid.step_count(), 24);
        policy.shrink(&mut grid);
        policy.shrink(&mut grid);
        assert_eq!(grid.step_count(), 16);
        assert!(grid.is_active(2, 5, 7));
        assert_shape(&grid);
    }

    #[test]
    fn test_allows() {
        let policy = ResizePolicy::default();
        assert!(policy.allows(16));
        assert!(policy.allows(128));
        assert!(!policy.allows(12));
        assert!(!policy.allows(132));
    }
}
