use anyhow::{bail, Result};
use std::cmp::Ordering;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, ConstScoreQuery, Occur, PhraseQuery, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{TantivyDocument, Term};
use tracing::debug;

use catalog_core::traits::LexicalIndex;
use catalog_core::types::{Bm25Weights, Hit};

use crate::index::ChunkIndex;

impl ChunkIndex {
	/// Analyze one whitespace token of the query into positioned terms.
	fn analyze(&self, field: Field, token: &str) -> Result<Vec<(usize, Term)>> {
		let mut analyzer = self.index.tokenizer_for_field(field)?;
		let mut stream = analyzer.token_stream(token);
		let mut terms = Vec::new();
		while stream.advance() {
			let t = stream.token();
			terms.push((t.position, Term::from_field_text(field, &t.text)));
		}
		Ok(terms)
	}

	/// OR of all query tokens against one column. Tokens that analyze into
	/// several terms (`foo-bar`, `a:b`) must match as a phrase.
	fn field_query(&self, field: Field, query: &str) -> Result<Option<Box<dyn Query>>> {
		let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		for token in query.split_whitespace() {
			let mut terms = self.analyze(field, token)?;
			match terms.len() {
				0 => {}
				1 => {
					let (_, term) = terms.remove(0);
					let term_query = TermQuery::new(term, IndexRecordOption::WithFreqs);
					clauses.push((Occur::Should, Box::new(term_query)));
				}
				_ => {
					let first = terms[0].0;
					let offsets = terms.into_iter().map(|(pos, term)| (pos - first, term)).collect();
					clauses.push((Occur::Should, Box::new(PhraseQuery::new_with_offset(offsets))));
				}
			}
		}
		if clauses.is_empty() {
			return Ok(None);
		}
		Ok(Some(Box::new(BooleanQuery::new(clauses))))
	}

	fn build_query(
		&self,
		query: &str,
		weights: &Bm25Weights,
		source_doc_id_prefix: Option<&str>,
	) -> Result<Option<Box<dyn Query>>> {
		let mut columns: Vec<(Occur, Box<dyn Query>)> = Vec::new();
		for (field, weight) in [(self.fields.heading, weights.heading), (self.fields.body, weights.body)] {
			if weight <= 0.0 {
				continue;
			}
			if let Some(q) = self.field_query(field, query)? {
				columns.push((Occur::Should, Box::new(BoostQuery::new(q, weight))));
			}
		}
		if columns.is_empty() {
			return Ok(None);
		}
		let text_query: Box<dyn Query> = Box::new(BooleanQuery::new(columns));
		let Some(prefix) = source_doc_id_prefix else { return Ok(Some(text_query)) };
		let dataset = dataset_from_prefix(prefix)?;
		let dataset_term = Term::from_field_text(self.fields.dataset, dataset);
		let filter = TermQuery::new(dataset_term, IndexRecordOption::Basic);
		Ok(Some(Box::new(BooleanQuery::new(vec![
			(Occur::Must, text_query),
			(Occur::Must, Box::new(ConstScoreQuery::new(Box::new(filter), 0.0))),
		]))))
	}
}

/// Only whole-dataset prefixes (`"{dataset}:"`) are indexed for filtering.
fn dataset_from_prefix(prefix: &str) -> Result<&str> {
	match prefix.strip_suffix(':') {
		Some(dataset) if !dataset.is_empty() && !dataset.contains(':') => Ok(dataset),
		_ => bail!("unsupported source_doc_id prefix '{prefix}': expected '<dataset>:'"),
	}
}

impl LexicalIndex for ChunkIndex {
	fn search_with_scores(
		&self,
		query: &str,
		limit: usize,
		source_doc_id_prefix: Option<&str>,
		weights: Option<&Bm25Weights>,
	) -> Result<Vec<Hit>> {
		let weights = weights.copied().unwrap_or_default();
		let Some(q) = self.build_query(query, &weights, source_doc_id_prefix)? else {
			return Ok(Vec::new());
		};
		if limit == 0 {
			return Ok(Vec::new());
		}
		let searcher = self.reader.searcher();
		// Fetch past the cut until the last row scores below the row at the
		// cut, so ties at the boundary are settled by node_id below.
		let mut fetch = limit.saturating_add(1);
		let top_docs = loop {
			let docs = searcher.search(&q, &TopDocs::with_limit(fetch))?;
			let at_cut = docs.get(limit - 1).map(|(score, _)| *score);
			let tied_at_cut = docs.len() == fetch && docs.last().map(|(score, _)| *score) == at_cut;
			if !tied_at_cut {
				break docs;
			}
			fetch = fetch.saturating_mul(2);
		};

		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let record = self.record_from_doc(&doc);
			let body = doc.get_first(self.fields.body).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let mut hit = Hit::new(record.node_id.clone(), record.source_doc_id.clone(), body, score);
			hit.metadata = record.position_metadata();
			hits.push(hit);
		}

		hits.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(Ordering::Equal)
				.then_with(|| a.node_id.cmp(&b.node_id))
		});
		hits.truncate(limit);
		let max = hits.first().map_or(0.0, |h| h.score);
		if max > 0.0 {
			for hit in &mut hits {
				hit.score /= max;
			}
		}
		debug!(query, returned = hits.len(), heading_weight = weights.heading, "lexical search");
		Ok(hits)
	}

	fn dataset_exists(&self, dataset_name: &str) -> Result<bool> {
		let searcher = self.reader.searcher();
		Ok(searcher.doc_freq(&Term::from_field_text(self.fields.dataset, dataset_name))? > 0)
	}
}
