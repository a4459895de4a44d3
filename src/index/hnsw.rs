/// HNSW vector index for approximate similarity search
use super::{HnswParams, IndexError, NearestNeighbors, Neighbor};
use hnsw_rs::prelude::*;

/// Upper bound on graph layers; hnsw_rs caps it at 16 anyway
const MAX_LAYERS: usize = 16;

/// HNSW index wrapper
///
/// Provides efficient approximate nearest neighbor search with Euclidean
/// distance. Data ids are corpus positions. The graph is fully built before the
/// index is shared, so no lock is held during search.
pub struct HnswIndex {
    index: Hnsw<'static, f32, DistL2>,
    dimension: usize,
    count: usize,
    ef_search: usize,
}

impl HnswIndex {
    /// Build the graph from row vectors in corpus order
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `vectors` - One vector per corpus chunk
    /// * `params` - M, ef_construction and ef_search
    pub fn from_vectors(
        dimension: usize,
        vectors: Vec<Vec<f32>>,
        params: HnswParams,
    ) -> Result<Self, IndexError> {
        let count = vectors.len();
        let index = Hnsw::<f32, DistL2>::new(
            params.m,
            count.max(1),
            MAX_LAYERS,
            params.ef_construction,
            DistL2,
        );

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexError::InvalidDimension {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            index.insert((vector, position));
        }

        Ok(Self {
            index,
            dimension,
            count,
            ef_search: params.ef_search,
        })
    }
}

impl NearestNeighbors for HnswIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }

        // ef must be at least k for the search to return k candidates
        let ef_search = self.ef_search.max(k);
        let mut hits: Vec<Neighbor> = self
            .index
            .search(query, k, ef_search)
            .into_iter()
            .map(|neighbour| Neighbor {
                position: neighbour.d_id,
                distance: neighbour.distance,
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
