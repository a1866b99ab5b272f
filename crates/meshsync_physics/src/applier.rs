use bevy::tasks::{ParallelSliceMut, TaskPool};
use meshsync_core::{Float3, SyncConfig, SyncError};

/// Final position for one vertex.
///
/// The read-back value is taken as an absolute position in the GPU frame;
/// `bias` shifts it into the mesh frame. The rest pose is not added.
#[inline]
pub fn deform_vertex(offset: Float3, bias: [f32; 2]) -> Float3 {
    Float3::new(offset.x + bias[0], offset.y + bias[1], offset.z)
}

/// Elementwise `offsets -> output` transform, parallel over fixed-size batches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformationApplier {
    pub bias: [f32; 2],
    pub batch_size: usize,
}

impl DeformationApplier {
    pub fn new(bias: [f32; 2], batch_size: usize) -> Result<Self, SyncError> {
        if batch_size == 0 {
            return Err(SyncError::InvalidConfig("batch_size must be positive".into()));
        }
        Ok(Self { bias, batch_size })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        Self::new(config.bias, config.batch_size)
    }

    /// Writes `output[i] = deform_vertex(offsets[i])` for every vertex.
    ///
    /// `base_positions` only fixes the vertex range. Blocks until every batch
    /// is done. Meshes smaller than one batch run inline.
    pub fn apply(
        &self,
        pool: &TaskPool,
        base_positions: &[Float3],
        offsets: &[Float3],
        mut output: &mut [Float3],
    ) -> Result<(), SyncError> {
        check_lengths(base_positions, offsets, output)?;
        if output.len() <= self.batch_size {
            self.write_range(offsets, output);
            return Ok(());
        }

        let batch = self.batch_size;
        output.par_chunk_map_mut(pool, batch, |chunk_index, chunk| {
            let start = chunk_index * batch;
            self.write_range(&offsets[start..start + chunk.len()], chunk);
        });
        Ok(())
    }

    /// Single-threaded path; same results as [`Self::apply`]
    pub fn apply_serial(
        &self,
        base_positions: &[Float3],
        offsets: &[Float3],
        output: &mut [Float3],
    ) -> Result<(), SyncError> {
        check_lengths(base_positions, offsets, output)?;
        self.write_range(offsets, output);
        Ok(())
    }

    fn write_range(&self, offsets: &[Float3], output: &mut [Float3]) {
        for (out, offset) in output.iter_mut().zip(offsets) {
            *out = deform_vertex(*offset, self.bias);
        }
    }
}

fn check_lengths(
    base_positions: &[Float3],
    offsets: &[Float3],
    output: &[Float3],
) -> Result<(), SyncError> {
    let n = base_positions.len();
    if offsets.len() != n {
        return Err(SyncError::LengthMismatch {
            what: "offsets",
            expected: n,
            actual: offsets.len(),
        });
    }
    if output.len() != n {
        return Err(SyncError::LengthMismatch {
            what: "output",
            expected: n,
            actual: output.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::tasks::TaskPoolBuilder;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_offsets(n: usize, seed: u64) -> Vec<Float3> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                Float3::new(
                    rng.gen_range(-100.0..100.0f32),
                    rng.gen_range(-100.0..100.0f32),
                    rng.gen_range(-100.0..100.0f32),
                )
            })
            .collect()
    }

    fn bits(v: &[Float3]) -> Vec<[u32; 3]> {
        v.iter()
            .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .collect()
    }

    #[test]
    fn test_known_offsets() {
        let applier = DeformationApplier::new([0.01, 0.02], 64).unwrap();
        let base = [Float3::ZERO; 2];
        let offsets = [Float3::new(1.0, 2.0, 3.0), Float3::new(4.0, 5.0, 6.0)];
        let mut out = [Float3::ZERO; 2];
        applier
            .apply(&TaskPool::new(), &base, &offsets, &mut out)
            .unwrap();

        assert!((out[0].x - 1.01).abs() < 1e-6);
        assert!((out[0].y - 2.02).abs() < 1e-6);
        assert_eq!(out[0].z, 3.0);
        assert!((out[1].x - 4.01).abs() < 1e-6);
        assert!((out[1].y - 5.02).abs() < 1e-6);
        assert_eq!(out[1].z, 6.0);
    }

    #[test]
    fn test_rest_pose_is_not_added() {
        let applier = DeformationApplier::new([0.01, 0.02], 4).unwrap();
        let base = vec![Float3::new(10.0, 10.0, 10.0); 3];
        let offsets = vec![Float3::ZERO; 3];
        let mut out = vec![Float3::new(-1.0, -1.0, -1.0); 3];
        applier.apply_serial(&base, &offsets, &mut out).unwrap();
        assert_eq!(out, vec![Float3::new(0.01, 0.02, 0.0); 3]);
    }

    #[test]
    fn test_parallel_matches_serial_bit_for_bit() {
        let n = 1_037;
        let base = vec![Float3::ZERO; n];
        let offsets = random_offsets(n, 7);

        let reference = DeformationApplier::new([0.01, 0.02], 64).unwrap();
        let mut expected = vec![Float3::ZERO; n];
        reference.apply_serial(&base, &offsets, &mut expected).unwrap();

        for threads in [1, 2, 4] {
            let pool = TaskPoolBuilder::new().num_threads(threads).build();
            for batch in [1, 7, 64, 500, 2_000] {
                let applier = DeformationApplier::new([0.01, 0.02], batch).unwrap();
                let mut out = vec![Float3::ZERO; n];
                applier.apply(&pool, &base, &offsets, &mut out).unwrap();
                assert_eq!(bits(&out), bits(&expected), "threads={threads} batch={batch}");

                // Second run over a dirty buffer gives the same bits
                applier.apply(&pool, &base, &offsets, &mut out).unwrap();
                assert_eq!(bits(&out), bits(&expected));
            }
        }
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let applier = DeformationApplier::new([0.01, 0.02], 2).unwrap();
        let pool = TaskPool::new();
        let base = vec![Float3::ZERO; 4];
        let offsets = vec![Float3::new(1.0, 1.0, 1.0); 4];
        let mut short = vec![Float3::ZERO; 3];

        assert_eq!(
            applier.apply(&pool, &base, &offsets, &mut short),
            Err(SyncError::LengthMismatch {
                what: "output",
                expected: 4,
                actual: 3,
            })
        );
        // Nothing was written
        assert_eq!(short, vec![Float3::ZERO; 3]);

        let mut out = vec![Float3::ZERO; 4];
        assert!(matches!(
            applier.apply(&pool, &base, &offsets[..2], &mut out),
            Err(SyncError::LengthMismatch { what: "offsets", .. })
        ));
        assert!(applier.apply_serial(&base, &offsets, &mut short).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        assert!(DeformationApplier::new([0.0, 0.0], 0).is_err());
    }
}
