//! Snapshot loading.
//!
//! Snapshots hold adjacency only; edge scores are recomputed from the vector
//! source while loading, so the source must index the same vectors the graph
//! was built over.

use std::{
    collections::BTreeMap,
    io::{self, Read},
    sync::atomic::Ordering,
};

use tracing::{info, instrument};

use crate::{
    graph::{
        error::GraphError,
        search::{QueryScorer, ScoreFunction},
        types::{ScoredNode, sort_best_first},
    },
    labels::LabelSource,
    vectors::VectorSource,
};

use super::{GraphBuilder, countdown};

impl<S: VectorSource, L: LabelSource> GraphBuilder<S, L> {
    /// Restores a graph written by [`GraphStore::save`] into this empty
    /// builder. The snapshot is validated in full before any node is added.
    ///
    /// # Errors
    /// Returns [`GraphError::NonEmptyGraph`] when nodes were already added,
    /// [`GraphError::InvalidParameters`] when the snapshot's maximum degree
    /// differs from the builder's, [`GraphError::MalformedSnapshot`] for
    /// truncated or inconsistent input and [`GraphError::Io`] when reading
    /// fails.
    ///
    /// [`GraphStore::save`]: crate::GraphStore::save
    #[instrument(name = "graph.load", err, skip(self, reader))]
    pub fn load<R: Read>(&self, reader: &mut R) -> Result<(), GraphError> {
        if !self.store.is_empty() {
            return Err(GraphError::NonEmptyGraph {
                size: self.store.size(),
            });
        }
        let size = read_count(reader, "node count")?;
        let entry = read_i32(reader, "entry point")?;
        let max_degree = read_count(reader, "max degree")?;
        if max_degree != self.params.max_degree() {
            return Err(GraphError::InvalidParameters {
                reason: format!(
                    "snapshot max degree {max_degree} differs from configured {}",
                    self.params.max_degree()
                ),
            });
        }

        let function = self.params.similarity();
        let mut value = self.views.acquire()?;
        let mut comparison = self.views.acquire()?;
        let mut nodes: BTreeMap<usize, Vec<ScoredNode>> = BTreeMap::new();
        for _ in 0..size {
            let id = read_count(reader, "node id")?;
            if nodes.contains_key(&id) {
                return Err(malformed(format!("node {id} appears twice")));
            }
            let count = read_count(reader, "neighbour count")?;
            if count > max_degree {
                return Err(malformed(format!(
                    "node {id} lists {count} neighbours, above the maximum degree {max_degree}"
                )));
            }
            let mut scorer = QueryScorer::for_node(id, &mut *value, &mut *comparison, function)?;
            let mut neighbours = Vec::with_capacity(count);
            for _ in 0..count {
                let neighbour = read_count(reader, "neighbour id")?;
                neighbours.push(ScoredNode::new(neighbour, scorer.similarity_to(neighbour)?));
            }
            sort_best_first(&mut neighbours);
            nodes.insert(id, neighbours);
        }
        drop(value);
        drop(comparison);

        for (id, neighbours) in &nodes {
            if let Some(target) = neighbours.iter().find(|n| !nodes.contains_key(&n.id)) {
                return Err(malformed(format!(
                    "node {id} links to {}, which is not in the snapshot",
                    target.id
                )));
            }
        }
        let entry = match entry {
            -1 if nodes.is_empty() => None,
            -1 => return Err(malformed("populated snapshot has no entry point")),
            _ => {
                let entry = to_id(entry, "entry point")?;
                if !nodes.contains_key(&entry) {
                    return Err(malformed(format!("entry point {entry} is not in the snapshot")));
                }
                Some(entry)
            }
        };

        let edges: usize = nodes.values().map(Vec::len).sum();
        let ids: Vec<usize> = nodes.keys().copied().collect();
        for (id, neighbours) in nodes {
            self.store.add_loaded_node(id, neighbours);
        }
        self.store.update_entry(entry);

        if self.is_labelled() {
            for &id in &ids {
                for label in self.labels.labels_of(id)?.iter() {
                    if let Some(population) = self.label_populations.get(label) {
                        population.fetch_add(1, Ordering::AcqRel);
                        self.store.maybe_set_initial_label_entry(id, label);
                    }
                }
            }
        }
        let interval = self.params.entry_refresh_interval();
        self.entry_countdown
            .store(countdown(interval.max(size)), Ordering::Release);
        for remaining in &self.label_countdowns {
            remaining.store(countdown(interval), Ordering::Release);
        }
        info!(nodes = size, edges, "graph snapshot loaded");
        Ok(())
    }
}

fn malformed(reason: impl Into<String>) -> GraphError {
    GraphError::MalformedSnapshot {
        reason: reason.into(),
    }
}

fn read_i32<R: Read>(reader: &mut R, field: &str) -> Result<i32, GraphError> {
    let mut bytes = [0_u8; 4];
    match reader.read_exact(&mut bytes) {
        Ok(()) => Ok(i32::from_be_bytes(bytes)),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
            Err(malformed(format!("truncated while reading {field}")))
        }
        Err(error) => Err(error.into()),
    }
}

fn read_count<R: Read>(reader: &mut R, field: &str) -> Result<usize, GraphError> {
    to_id(read_i32(reader, field)?, field)
}

fn to_id(value: i32, field: &str) -> Result<usize, GraphError> {
    usize::try_from(value).map_err(|_| malformed(format!("negative {field}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn words(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }

    #[rstest]
    #[case(&[], "node count")]
    #[case(&[1], "entry point")]
    #[case(&[1, 0], "max degree")]
    fn truncated_headers_are_malformed(#[case] values: &[i32], #[case] field: &str) {
        let bytes = words(values);
        let mut reader = bytes.as_slice();
        let mut outcome = Ok(0);
        for name in ["node count", "entry point", "max degree"] {
            outcome = read_count(&mut reader, name);
            if outcome.is_err() {
                break;
            }
        }
        match outcome {
            Err(GraphError::MalformedSnapshot { reason }) => assert!(reason.contains(field), "{reason}"),
            other => panic!("expected malformed snapshot, got {other:?}"),
        }
    }

    #[test]
    fn negative_counts_are_malformed() {
        let bytes = words(&[-3]);
        let err = read_count(&mut bytes.as_slice(), "node count").expect_err("negative");
        assert!(matches!(err, GraphError::MalformedSnapshot { .. }));
    }
}
