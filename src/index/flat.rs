/// Exact nearest-neighbor search over a dense embedding matrix
use super::{IndexError, NearestNeighbors, Neighbor};
use ndarray::{Array2, ArrayView1, Axis};

/// Brute-force index: one row per corpus chunk, Euclidean distance
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Build from row vectors in corpus order
    pub fn from_vectors(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let rows = vectors.len();
        let mut flat = Vec::with_capacity(rows * dimension);
        for vector in vectors {
            if vector.len() != dimension {
                return Err(IndexError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            flat.extend(vector);
        }

        let vectors = Array2::from_shape_vec((rows, dimension), flat)
            .map_err(|e| IndexError::SerializationError(e.to_string()))?;

        Ok(Self { vectors })
    }
}

impl NearestNeighbors for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension() {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let query = ArrayView1::from(query);
        let mut hits: Vec<Neighbor> = self
            .vectors
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(position, row)| {
                let diff = &row - &query;
                Neighbor {
                    position,
                    distance: diff.dot(&diff).sqrt(),
                }
            })
            .collect();

        // Stable sort keeps corpus order among equal distances
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.vectors.nrows()
    }

    fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn test_exact_match_is_first() {
        let index =
            FlatIndex::from_vectors(4, vec![unit(4, 0), unit(4, 1), unit(4, 2), unit(4, 3)])
                .unwrap();

        let hits = index.search(&unit(4, 2), 4).unwrap();
        assert_eq!(hits[0].position, 2);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_results_sorted_and_capped() {
        let vectors = vec![vec![3.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0], vec![0.5, 0.0]];
        let index = FlatIndex::from_vectors(2, vectors).unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![3, 1, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[1].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_index() {
        let index = FlatIndex::from_vectors(2, vec![vec![1.0, 1.0]]).unwrap();
        assert_eq!(index.search(&[0.0, 0.0], 5).unwrap().len(), 1);
    }

    #[test]
    fn test_dimension_validation() {
        assert!(FlatIndex::from_vectors(3, vec![vec![1.0, 2.0]]).is_err());

        let index = FlatIndex::from_vectors(2, vec![vec![1.0, 2.0]]).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }
}
