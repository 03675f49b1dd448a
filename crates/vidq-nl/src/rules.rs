//! Rule-based translator
//!
//! Deterministic and offline. The question is lower-cased, entities are
//! extracted, and the intent rule with the longest matching trigger phrase
//! decides the projection and table. Entity filters are attached in a fixed
//! order (creator, date, threshold, intent filter) so the same question always
//! produces byte-identical SQL.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use vidq_schema::{IntentRule, SchemaDescriptor, TableKind};

use crate::extract::{extract_creator_id, extract_date, extract_threshold};
use crate::{TranslationError, Translator, FALLBACK_QUERY};

const DEFAULT_METRIC: &str = "views";

pub struct RuleTranslator {
    schema: Arc<SchemaDescriptor>,
    fallback: bool,
}

impl RuleTranslator {
    pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
        Self {
            schema,
            fallback: true,
        }
    }

    /// Disable the total-count fallback; unmatched questions become errors
    pub fn strict(mut self) -> Self {
        self.fallback = false;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Translate synchronously
    pub fn build_query(&self, question: &str) -> Result<String, TranslationError> {
        let text = question.trim().to_lowercase().replace('ё', "е");
        if !text.chars().any(char::is_alphabetic) {
            return Err(TranslationError::Unrecognized);
        }

        let Some(rule) = self.select_intent(&text) else {
            if self.fallback {
                warn!(
                    question,
                    query = FALLBACK_QUERY,
                    "no intent rule matched, falling back to total video count"
                );
                return Ok(FALLBACK_QUERY.to_string());
            }
            return Err(TranslationError::NoIntent);
        };

        let metric = self.schema.metric_in(&text).unwrap_or(DEFAULT_METRIC);
        let creator_id = extract_creator_id(question);
        if rule.requires_creator && creator_id.is_none() {
            return Err(TranslationError::MissingEntity("creator id"));
        }

        let mut filters = Vec::new();

        if let Some(id) = &creator_id {
            filters.push(creator_filter(rule.table, id));
        }
        if let Some(date) = extract_date(&text, &self.schema) {
            filters.push(date.to_sql(rule.table.date_column()));
        }
        if let Some(threshold) = extract_threshold(&text, &self.schema) {
            filters.push(threshold.to_sql(metric));
        }
        if let Some(filter) = &rule.filter {
            filters.push(filter.replace("{metric}", metric));
        }

        let table = self
            .schema
            .table(rule.table)
            .map(|t| t.name.as_str())
            .unwrap_or_else(|| rule.table.table_name());

        let mut sql = format!(
            "SELECT {} FROM {}",
            rule.projection.replace("{metric}", metric),
            table
        );
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filters.join(" AND "));
        }

        debug!(intent = %rule.name, %sql, "rule translation");
        Ok(sql)
    }

    /// Longest trigger wins; earlier rules win ties
    fn select_intent(&self, text: &str) -> Option<&IntentRule> {
        let mut best: Option<(usize, &IntentRule)> = None;
        for rule in &self.schema.intents {
            if let Some(len) = rule.best_match(text) {
                if best.map_or(true, |(best_len, _)| len > best_len) {
                    best = Some((len, rule));
                }
            }
        }
        best.map(|(_, rule)| rule)
    }
}

fn creator_filter(table: TableKind, id: &str) -> String {
    match table {
        TableKind::Videos => format!("creator_id = '{}'", id),
        TableKind::Snapshots => format!(
            "video_id IN (SELECT id FROM videos WHERE creator_id = '{}')",
            id
        ),
    }
}

#[async_trait]
impl Translator for RuleTranslator {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn translate(&self, question: &str) -> Result<String, TranslationError> {
        self.build_query(question)
    }
}
