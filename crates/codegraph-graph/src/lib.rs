//! Project-isolated property graph: files, functions, modules and the
//! `calls`/`depends_on`/`contains`/`belongs_to` edges between them,
//! stored in SurrealDB.
//!
//! `build_call_graph` walks `calls` edges breadth-first in Rust rather
//! than issuing a SurrealQL variable-length graph traversal — the
//! query shape those require is easy to get subtly wrong and hard to
//! validate without a live cluster, whereas a plain edge scan plus BFS
//! is conventional and easy to reason about. Revisit if profiling ever
//! shows the full-edge-scan cost dominating for large projects.

pub mod ids;
pub mod schema;
pub mod store;

pub use ids::*;
pub use schema::*;
pub use store::*;
