use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query, QueryParser};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::models::Issue;

/// BM25 index over issue title + body, keyed by issue id.
pub struct IssueIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    f_issue_id: Field,
    f_title: Field,
    f_body: Field,
}

const ISSUE_ID_FIELD: &str = "issue_id";

fn build_schema() -> (Schema, Field, Field, Field) {
    let mut schema_builder = Schema::builder();
    let f_issue_id = schema_builder.add_u64_field(ISSUE_ID_FIELD, INDEXED | FAST);
    let f_title = schema_builder.add_text_field("title", TEXT);
    let f_body = schema_builder.add_text_field("body", TEXT);
    (schema_builder.build(), f_issue_id, f_title, f_body)
}

impl IssueIndex {
    /// Create or open the index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let (schema, f_issue_id, f_title, f_body) = build_schema();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Self::from_index(index, f_issue_id, f_title, f_body)
    }

    /// Index held entirely in memory.
    pub fn in_memory() -> Result<Self> {
        let (schema, f_issue_id, f_title, f_body) = build_schema();
        Self::from_index(Index::create_in_ram(schema), f_issue_id, f_title, f_body)
    }

    fn from_index(index: Index, f_issue_id: Field, f_title: Field, f_body: Field) -> Result<Self> {
        let writer: IndexWriter = index
            .writer(50_000_000)
            .context("Failed to create index writer")?;
        // Reloaded explicitly after each commit so searches see writes immediately.
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            f_issue_id,
            f_title,
            f_body,
        })
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit().context("Failed to commit index")?;
        self.reader.reload().context("Failed to reload index reader")?;
        Ok(())
    }

    /// Replace the indexed text of each issue.
    pub fn index_issues(&self, issues: &[Issue]) -> Result<()> {
        if issues.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock();
        for issue in issues {
            let id = issue.issue_id as u64;
            writer.delete_term(Term::from_field_u64(self.f_issue_id, id));
            writer.add_document(doc!(
                self.f_issue_id => id,
                self.f_title => issue.title.clone(),
                self.f_body => issue.body.clone(),
            ))?;
        }
        self.commit(&mut writer)
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Every issue matching the query, with its BM25 score (larger is more relevant).
    ///
    /// Terms are combined with AND. A blank query matches every indexed issue.
    /// Syntax the parser cannot read is dropped rather than failing the search.
    pub fn search_all(&self, query_str: &str) -> Result<HashMap<i64, f32>> {
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        if total == 0 {
            return Ok(HashMap::new());
        }

        let query: Box<dyn Query> = if query_str.trim().is_empty() {
            Box::new(AllQuery)
        } else {
            let mut query_parser = QueryParser::for_index(&self.index, vec![self.f_title, self.f_body]);
            query_parser.set_conjunction_by_default();
            let (query, errors) = query_parser.parse_query_lenient(query_str);
            if !errors.is_empty() {
                tracing::debug!("Lenient parse of {query_str:?} dropped: {errors:?}");
            }
            query
        };

        let top_docs = searcher
            .search(query.as_ref(), &TopDocs::with_limit(total))
            .context("Search failed")?;

        // Ids come from the fast-field column, one per segment, not the doc store.
        let id_columns = searcher
            .segment_readers()
            .iter()
            .map(|segment| segment.fast_fields().u64(ISSUE_ID_FIELD))
            .collect::<tantivy::Result<Vec<_>>>()
            .context("Failed to open issue id column")?;

        let mut hits = HashMap::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let id = id_columns
                .get(doc_address.segment_ord as usize)
                .and_then(|column| column.first(doc_address.doc_id));
            if let Some(id) = id {
                hits.insert(id as i64, score);
            }
        }

        Ok(hits)
    }
}
