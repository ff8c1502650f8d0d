use std::collections::HashMap;

use async_trait::async_trait;
use codegraph_core::{
    ChunkMetadata, CodeChunk, CodeGraphError, ProjectId, Result, SimilarityResult, VectorConfig,
    VectorStore,
};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Deterministic UUID namespace for chunk-id -> Qdrant point-id
/// derivation. Qdrant only accepts u64 or UUID point ids, but our
/// chunk ids are content-hash hex strings, so we map one onto the
/// other with `Uuid::new_v5` rather than keeping a separate id table.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x63, 0x67, 0x5f, 0x71, 0x64, 0x72, 0x61, 0x6e, 0x74, 0x5f, 0x70, 0x6f, 0x69, 0x6e, 0x74,
]);

fn point_id_for(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&POINT_ID_NAMESPACE, chunk_id.as_bytes())
}

/// Project-isolated vector store backed by Qdrant. Collections are
/// named `<project_id>_<base>`; every method that needs isolation
/// filters on that prefix rather than trusting a caller-supplied
/// collection name outright.
pub struct QdrantVectorStore {
    client: Qdrant,
    dimension: usize,
}

impl QdrantVectorStore {
    pub fn connect(config: &VectorConfig) -> Result<Self> {
        info!("connecting to vector store at {}", config.url);
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(key) = &config.api_key {
            use secrecy::ExposeSecret;
            builder = builder.api_key(key.expose_secret().to_string());
        }
        let client = builder
            .build()
            .map_err(|e| CodeGraphError::StorageConnection(format!("qdrant client: {e}")))?;

        Ok(Self {
            client,
            dimension: config.dimension,
        })
    }

    pub fn collection_name(project_id: &ProjectId, base: &str) -> String {
        format!("{project_id}_{base}")
    }

    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("collection_exists: {e}")))?;
        if exists {
            return Ok(());
        }
        self.create_collection(collection).await
    }
}

fn metadata_value(metadata: &ChunkMetadata) -> HashMap<String, QdrantValue> {
    let mut map = HashMap::new();
    map.insert("file_path".to_string(), metadata.file_path.clone().into());
    map.insert("file_name".to_string(), metadata.file_name.clone().into());
    map.insert("module".to_string(), metadata.module.clone().into());
    map.insert("start_line".to_string(), (metadata.start_line as i64).into());
    map.insert("end_line".to_string(), (metadata.end_line as i64).into());
    map.insert("chunk_type".to_string(), metadata.chunk_type.clone().into());
    // None -> empty string, per the embedder's metadata-flattening rule.
    map.insert(
        "function_name".to_string(),
        metadata.function_name.clone().unwrap_or_default().into(),
    );
    map.insert("chunk_tokens".to_string(), (metadata.chunk_tokens as i64).into());
    map
}

fn metadata_from_payload(payload: &HashMap<String, QdrantValue>) -> ChunkMetadata {
    let get_str = |key: &str| -> String {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let get_int = |key: &str| -> u32 {
        payload
            .get(key)
            .and_then(|v| v.as_integer())
            .unwrap_or(0) as u32
    };

    let function_name = get_str("function_name");
    ChunkMetadata {
        file_path: get_str("file_path"),
        file_name: get_str("file_name"),
        module: get_str("module"),
        start_line: get_int("start_line"),
        end_line: get_int("end_line"),
        chunk_type: get_str("chunk_type"),
        function_name: if function_name.is_empty() {
            None
        } else {
            Some(function_name)
        },
        chunk_tokens: get_int("chunk_tokens"),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn create_collection(&self, collection: &str) -> Result<()> {
        debug!("creating qdrant collection {collection}");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("create_collection: {e}")))?;
        Ok(())
    }

    async fn add_embeddings(
        &self,
        collection: &str,
        chunks: &[CodeChunk],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(CodeGraphError::Validation(format!(
                "chunk count {} does not match vector count {}",
                chunks.len(),
                vectors.len()
            )));
        }
        if chunks.is_empty() {
            return Ok(());
        }

        self.ensure_collection(collection).await?;

        let points: Vec<PointStruct> = chunks
            .iter()
            .zip(vectors.iter())
            .map(|(chunk, vector)| {
                let mut payload = metadata_value(&chunk.metadata);
                payload.insert("text".to_string(), chunk.text.clone().into());
                payload.insert("chunk_id".to_string(), chunk.id.clone().into());
                PointStruct::new(point_id_for(&chunk.id).to_string(), vector.clone(), payload)
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points))
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("upsert_points: {e}")))?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SimilarityResult>> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("collection_exists: {e}")))?;
        if !exists {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), top_k as u64).with_payload(true),
            )
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("search_points: {e}")))?;

        let results = response
            .result
            .into_iter()
            .map(|scored| {
                let metadata = metadata_from_payload(&scored.payload);
                let text = scored
                    .payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let chunk_id = scored
                    .payload
                    .get("chunk_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let distance = 1.0 - scored.score;
                SimilarityResult {
                    id: chunk_id,
                    document: text,
                    metadata,
                    distance,
                    similarity: scored.score,
                }
            })
            .collect();

        Ok(results)
    }

    async fn list_collections(&self, project_id: &ProjectId) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| CodeGraphError::StorageOperation(format!("list_collections: {e}")))?;
        let prefix = format!("{project_id}_");
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .filter(|name| name.starts_with(&prefix))
            .collect())
    }

    async fn cleanup_project(&self, project_id: &ProjectId) -> Result<()> {
        for collection in self.list_collections(project_id).await? {
            match self.client.delete_collection(collection.clone()).await {
                Ok(_) => {
                    self.create_collection(&collection).await?;
                }
                Err(e) => warn!("failed to cleanup collection {collection}: {e}"),
            }
        }
        Ok(())
    }

    async fn delete_project(&self, project_id: &ProjectId) -> Result<()> {
        for collection in self.list_collections(project_id).await? {
            self.client
                .delete_collection(collection.clone())
                .await
                .map_err(|e| {
                    CodeGraphError::StorageOperation(format!("delete_collection {collection}: {e}"))
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic_per_chunk_id() {
        assert_eq!(point_id_for("abc123"), point_id_for("abc123"));
        assert_ne!(point_id_for("abc123"), point_id_for("def456"));
    }

    #[test]
    fn collection_name_uses_project_prefix() {
        assert_eq!(
            QdrantVectorStore::collection_name(&"auto_deadbeef".to_string(), "code_chunks"),
            "auto_deadbeef_code_chunks"
        );
    }
}
