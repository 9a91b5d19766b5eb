//! Partition of the scene range into contiguous capture chunks.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::project::ProjectError;
use crate::script::SceneId;

/// A contiguous scene range `[start, end)` captured by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk index; also the id of the worker that captures it.
    pub index: usize,
    pub start: SceneId,
    pub end: SceneId,
}

impl Chunk {
    pub fn range(&self) -> Range<SceneId> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn first_scene(&self) -> SceneId {
        self.start
    }

    /// Scene shown before capture begins, so that the first captured frames
    /// contain the entry transition into [`Chunk::first_scene`]. `None` for
    /// a chunk starting at scene 0, which has no predecessor.
    pub fn priming_scene(&self) -> Option<SceneId> {
        self.start.checked_sub(1)
    }
}

/// An ordered, gap-free, non-overlapping cover of `[0, scene_count)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    scene_count: usize,
    chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Split `scene_count` scenes into blocks of `ceil(scene_count / workers)`.
    ///
    /// Fewer than `workers` chunks are produced when the blocks run out
    /// (10 scenes on 4 workers gives `[0,3) [3,6) [6,9) [9,10)`; 4 scenes
    /// on 3 workers gives `[0,2) [2,4)`).
    pub fn partition(scene_count: usize, workers: usize) -> Result<Self, ProjectError> {
        if workers == 0 {
            return Err(ProjectError::invalid("worker count must be at least 1"));
        }
        if scene_count == 0 {
            return Err(ProjectError::invalid("no scenes to partition"));
        }
        let size = scene_count.div_ceil(workers);
        let chunks = (0..workers)
            .map(|index| Chunk {
                index,
                start: (index * size).min(scene_count),
                end: ((index + 1) * size).min(scene_count),
            })
            .filter(|c| !c.is_empty())
            .collect();
        Self::from_chunks(scene_count, chunks)
    }

    /// Build a plan from explicit chunks, checking the cover invariant.
    pub fn from_chunks(scene_count: usize, chunks: Vec<Chunk>) -> Result<Self, ProjectError> {
        let mut next = 0;
        for (position, chunk) in chunks.iter().enumerate() {
            if chunk.index != position {
                return Err(ProjectError::invalid(format!(
                    "chunk at position {position} has index {}",
                    chunk.index
                )));
            }
            if chunk.start != next {
                return Err(ProjectError::invalid(format!(
                    "chunk {} starts at scene {} but scene {next} is next",
                    chunk.index, chunk.start
                )));
            }
            if chunk.is_empty() {
                return Err(ProjectError::invalid(format!(
                    "chunk {} is empty",
                    chunk.index
                )));
            }
            next = chunk.end;
        }
        if next != scene_count {
            return Err(ProjectError::invalid(format!(
                "chunks cover scenes [0, {next}) but {scene_count} scenes exist"
            )));
        }
        Ok(Self {
            scene_count,
            chunks,
        })
    }

    pub fn scene_count(&self) -> usize {
        self.scene_count
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk that captures a given scene.
    pub fn chunk_for(&self, scene: SceneId) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.range().contains(&scene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ranges(plan: &ChunkPlan) -> Vec<(usize, usize)> {
        plan.chunks().iter().map(|c| (c.start, c.end)).collect()
    }

    #[test]
    fn test_four_workers_ten_scenes() {
        let plan = ChunkPlan::partition(10, 4).unwrap();
        assert_eq!(ranges(&plan), vec![(0, 3), (3, 6), (6, 9), (9, 10)]);
        assert_eq!(plan.chunk_for(9).unwrap().index, 3);
    }

    #[test]
    fn test_trailing_empty_chunks_are_dropped() {
        let plan = ChunkPlan::partition(4, 3).unwrap();
        assert_eq!(ranges(&plan), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_more_workers_than_scenes() {
        let plan = ChunkPlan::partition(2, 8).unwrap();
        assert_eq!(ranges(&plan), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_zero_workers_is_an_error() {
        assert!(ChunkPlan::partition(5, 0).is_err());
        assert!(ChunkPlan::partition(0, 2).is_err());
    }

    #[test]
    fn test_priming_scene() {
        let plan = ChunkPlan::partition(10, 4).unwrap();
        assert_eq!(plan.chunks()[0].priming_scene(), None);
        assert_eq!(plan.chunks()[1].priming_scene(), Some(2));
    }

    #[test]
    fn test_from_chunks_rejects_overlap_and_gaps() {
        let overlap = vec![
            Chunk { index: 0, start: 0, end: 3 },
            Chunk { index: 1, start: 2, end: 5 },
        ];
        assert!(ChunkPlan::from_chunks(5, overlap).is_err());

        let gap = vec![
            Chunk { index: 0, start: 0, end: 2 },
            Chunk { index: 1, start: 3, end: 5 },
        ];
        assert!(ChunkPlan::from_chunks(5, gap).is_err());

        let short = vec![Chunk { index: 0, start: 0, end: 4 }];
        assert!(ChunkPlan::from_chunks(5, short).is_err());
    }

    proptest! {
        #[test]
        fn prop_partition_covers_each_scene_once(scenes in 1usize..500, workers in 1usize..64) {
            let plan = ChunkPlan::partition(scenes, workers).unwrap();
            prop_assert!(plan.len() <= workers);

            let mut seen = vec![0u32; scenes];
            for chunk in plan.chunks() {
                for scene in chunk.range() {
                    seen[scene] += 1;
                }
            }
            prop_assert!(seen.iter().all(|&n| n == 1));

            let size = scenes.div_ceil(workers);
            for chunk in plan.chunks() {
                prop_assert!(chunk.len() <= size);
            }
        }
    }
}
