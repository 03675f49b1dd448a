//! Translators driven by an extended schema descriptor

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use vidq_nl::{CompletionClient, LlmTranslator, RuleTranslator, TranslationError, Translator};
use vidq_schema::{IntentRule, SchemaDescriptor, TableKind};

fn with_reported_videos() -> SchemaDescriptor {
    let mut schema = SchemaDescriptor::builtin();
    schema.register(IntentRule {
        name: "reported_videos".to_string(),
        triggers: vec!["сколько видео с жалобами".to_string()],
        table: TableKind::Videos,
        projection: "COUNT(*)".to_string(),
        filter: Some("reports_count > 0".to_string()),
        requires_creator: false,
    });
    schema
}

struct EchoCompletion;

#[async_trait]
impl CompletionClient for EchoCompletion {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TranslationError> {
        assert!(system.contains("video_snapshots"));
        assert!(user.starts_with("Вход: "));
        Ok("```sql\nSELECT COUNT(*) FROM videos\n```".to_string())
    }
}

#[test]
fn test_registered_intent_beats_shorter_trigger() {
    let translator = RuleTranslator::new(Arc::new(with_reported_videos()));
    let sql = translator
        .build_query("Сколько видео с жалобами вышло 3 ноября 2025?")
        .unwrap();
    assert_eq!(
        sql,
        "SELECT COUNT(*) FROM videos WHERE DATE(video_created_at) = '2025-11-03' AND reports_count > 0"
    );

    // Questions the new rule does not cover keep their old translation
    let sql = translator.build_query("Сколько всего видео есть в системе?").unwrap();
    assert_eq!(sql, "SELECT COUNT(*) FROM videos");
}

#[test]
fn test_yaml_descriptor_drives_rules() {
    let yaml = with_reported_videos().to_yaml().unwrap();
    let loaded = SchemaDescriptor::from_yaml(&yaml).unwrap();

    let translator = RuleTranslator::new(Arc::new(loaded));
    let sql = translator.build_query("сколько видео с жалобами?").unwrap();
    assert_eq!(sql, "SELECT COUNT(*) FROM videos WHERE reports_count > 0");
}

#[tokio::test]
async fn test_strategies_share_one_interface() {
    let schema = Arc::new(SchemaDescriptor::builtin());
    let translators: Vec<Box<dyn Translator>> = vec![
        Box::new(RuleTranslator::new(schema.clone())),
        Box::new(LlmTranslator::new(EchoCompletion, schema, Duration::from_secs(1))),
    ];

    for translator in &translators {
        let sql = translator
            .translate("Сколько всего видео есть в системе?")
            .await
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM videos", "strategy {}", translator.name());
    }
}
