use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use catalog_core::identity::EmbeddingIdentity;
use catalog_core::traits::VectorStore;
use catalog_core::types::{Meta, VectorHit, CHUNK_POS_KEY, CHUNK_SEQ_KEY, CONTENT_HASH_KEY};

use crate::table::{f32_at, i64_at, open_db, sql_quote, str_at, table_exists};

const STRING_METADATA_COLUMNS: [&str; 6] = [
	"source_doc_id",
	"dataset",
	"embedding_backend",
	"embedding_model_name",
	"embedding_profile",
	CONTENT_HASH_KEY,
];

/// Chunk vectors in one LanceDB table, possibly from several embedding identities.
pub struct LanceVectorStore {
	db: Connection,
	table_name: String,
	native: Option<EmbeddingIdentity>,
}

impl LanceVectorStore {
	pub async fn open(uri: &str, table_name: &str) -> Result<Self> {
		Ok(Self::new(open_db(uri).await?, table_name))
	}

	pub fn new(db: Connection, table_name: &str) -> Self {
		Self { db, table_name: table_name.to_string(), native: None }
	}

	/// Bind the store to a single embedding space; identity discovery is skipped.
	#[must_use]
	pub fn with_native_identity(mut self, identity: EmbeddingIdentity) -> Self {
		self.native = Some(identity);
		self
	}

	pub fn connection(&self) -> &Connection {
		&self.db
	}

	fn filter(identity: Option<&EmbeddingIdentity>, dataset_name: Option<&str>) -> Option<String> {
		let mut clauses = Vec::new();
		if let Some(identity) = identity {
			clauses.push(format!("embedding_profile = {}", sql_quote(&identity.profile())));
		}
		if let Some(dataset) = dataset_name {
			clauses.push(format!("dataset = {}", sql_quote(dataset)));
		}
		(!clauses.is_empty()).then(|| clauses.join(" AND "))
	}
}

#[async_trait]
impl VectorStore for LanceVectorStore {
	fn native_identity(&self) -> Option<EmbeddingIdentity> {
		self.native.clone()
	}

	async fn identities(&self, dataset_name: Option<&str>) -> Result<Vec<EmbeddingIdentity>> {
		if !table_exists(&self.db, &self.table_name).await? {
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut query = table.query().select(Select::columns(&["embedding_profile"]));
		if let Some(filter) = Self::filter(None, dataset_name) {
			query = query.only_if(filter);
		}
		let mut stream = query.execute().await?;
		let mut profiles = BTreeSet::new();
		while let Some(batch) = stream.try_next().await? {
			for i in 0..batch.num_rows() {
				if let Some(profile) = str_at(&batch, "embedding_profile", i) {
					profiles.insert(profile);
				}
			}
		}
		let mut identities = Vec::with_capacity(profiles.len());
		for profile in profiles {
			match EmbeddingIdentity::from_profile(&profile) {
				Some(identity) => identities.push(identity),
				None => warn!(profile, "skipping malformed embedding profile"),
			}
		}
		Ok(identities)
	}

	async fn similarity(
		&self,
		query_vec: &[f32],
		identity: Option<&EmbeddingIdentity>,
		top_k: usize,
		dataset_name: Option<&str>,
	) -> Result<Vec<VectorHit>> {
		if top_k == 0 || !table_exists(&self.db, &self.table_name).await? {
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut query = table.vector_search(query_vec.to_vec())?.distance_type(DistanceType::Cosine).limit(top_k);
		if let Some(filter) = Self::filter(identity, dataset_name) {
			query = query.only_if(filter);
		}
		let mut stream = query.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			for i in 0..batch.num_rows() {
				let node_id = str_at(&batch, "node_id", i);
				let (Some(node_id), Some(distance)) = (node_id, f32_at(&batch, "_distance", i)) else {
					warn!(row = i, "skipping vector row without node_id or distance");
					continue;
				};
				let mut metadata = Meta::new();
				for key in STRING_METADATA_COLUMNS {
					if let Some(v) = str_at(&batch, key, i) {
						metadata.insert(key.to_string(), v.into());
					}
				}
				for key in [CHUNK_SEQ_KEY, CHUNK_POS_KEY] {
					if let Some(v) = i64_at(&batch, key, i) {
						metadata.insert(key.to_string(), v.into());
					}
				}
				hits.push(VectorHit { node_id, score: 1.0 - distance, metadata });
			}
		}
		debug!(returned = hits.len(), profile = ?identity.map(EmbeddingIdentity::profile), "vector similarity");
		Ok(hits)
	}
}
