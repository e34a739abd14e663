//! Structural fingerprints of nodes.

use forma_common::{Fingerprint, FingerprintHasher, Recipe};
use forma_graph::{FeatureGraph, GraphError, NodeId};

/// Fingerprints a node from its type tag, its parameters and the
/// fingerprints of its dependencies, in that order.
///
/// The type tag is hashed by name, parameters as `(name, value)` pairs in
/// declaration order. With `record` set, the digested bytes are returned as
/// a [`Recipe`] for collision checks.
pub fn node_fingerprint(
    graph: &FeatureGraph,
    id: NodeId,
    dependencies: &[Fingerprint],
    record: bool,
) -> Result<(Fingerprint, Option<Recipe>), GraphError> {
    let node = graph.node(id)?;
    let mut hasher = if record {
        FingerprintHasher::recording()
    } else {
        FingerprintHasher::new()
    };

    hasher.combine(graph.type_name(id)?);

    hasher.write_seq_len(node.params().len());
    for param in node.params() {
        hasher.combine(param.name.as_str()).combine(&param.value);
    }

    hasher.combine(dependencies);

    Ok(hasher.finalize_with_recipe())
}
