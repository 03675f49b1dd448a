//! Schema descriptor for the video analytics dataset
//!
//! Static, versioned description of the two queryable tables together with the
//! phrase vocabulary used to turn Russian analytics questions into SQL:
//! metric words, month names, comparison phrases and ordered intent rules.
//! Translators consume it read-only; extending the vocabulary means editing
//! data here (or a YAML file), never the translator's control flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to parse schema descriptor: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Intent rule '{0}' has no trigger phrases")]
    EmptyTriggers(String),

    #[error("Descriptor must describe table: {0}")]
    MissingTable(&'static str),
}

/// The two queryable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Videos,
    Snapshots,
}

impl TableKind {
    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Videos => "videos",
            TableKind::Snapshots => "video_snapshots",
        }
    }

    /// Column that "on date X" phrasing binds to
    pub fn date_column(self) -> &'static str {
        match self {
            TableKind::Videos => "video_created_at",
            TableKind::Snapshots => "created_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub kind: TableKind,
    pub name: String,
    pub description: String,
    pub columns: Vec<ColumnInfo>,
}

/// Word stem naming a counter, e.g. "просмотр" -> "views"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWord {
    pub stem: String,
    pub metric: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthName {
    pub stem: String,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub phrase: String,
    pub operator: String,
}

/// Natural-language pattern and the SQL fragment it stands for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub phrase: String,
    pub fragment: String,
}

/// One question intent: which table to aggregate and how
///
/// `projection` and `filter` may contain a `{metric}` placeholder that is
/// replaced with the counter named in the question (`views` by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRule {
    pub name: String,
    pub triggers: Vec<String>,
    pub table: TableKind,
    pub projection: String,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub requires_creator: bool,
}

impl IntentRule {
    /// Length (in chars) of the longest trigger contained in `text`
    pub fn best_match(&self, text: &str) -> Option<usize> {
        self.triggers
            .iter()
            .filter(|t| text.contains(t.as_str()))
            .map(|t| t.chars().count())
            .max()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub question: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: String,
    pub tables: Vec<TableInfo>,
    pub metrics: Vec<MetricWord>,
    pub months: Vec<MonthName>,
    pub comparisons: Vec<Comparison>,
    pub conversions: Vec<Conversion>,
    pub intents: Vec<IntentRule>,
    #[serde(default)]
    pub examples: Vec<Example>,
}

impl SchemaDescriptor {
    /// Built-in descriptor for the `videos` / `video_snapshots` dataset
    pub fn builtin() -> Self {
        let mut descriptor = Self {
            version: "1.0.0".to_string(),
            tables: builtin_tables(),
            metrics: [
                ("просмотр", "views"),
                ("лайк", "likes"),
                ("коммент", "comments"),
                ("жалоб", "reports"),
            ]
            .into_iter()
            .map(|(stem, metric)| MetricWord {
                stem: stem.to_string(),
                metric: metric.to_string(),
            })
            .collect(),
            months: [
                ("янв", 1),
                ("фев", 2),
                ("мар", 3),
                ("апр", 4),
                ("мая", 5),
                ("май", 5),
                ("июн", 6),
                ("июл", 7),
                ("авг", 8),
                ("сен", 9),
                ("окт", 10),
                ("ноя", 11),
                ("дек", 12),
            ]
            .into_iter()
            .map(|(stem, month)| MonthName {
                stem: stem.to_string(),
                month,
            })
            .collect(),
            // Longer phrases first so "не меньше" is not read as "меньше"
            comparisons: [
                ("не меньше", ">="),
                ("не менее", ">="),
                ("не больше", "<="),
                ("не более", "<="),
                ("больше", ">"),
                ("более", ">"),
                ("свыше", ">"),
                ("меньше", "<"),
                ("менее", "<"),
            ]
            .into_iter()
            .map(|(phrase, operator)| Comparison {
                phrase: phrase.to_string(),
                operator: operator.to_string(),
            })
            .collect(),
            conversions: [
                ("сколько всего / общее количество", "COUNT(*)"),
                ("сумма просмотров", "SUM(views_count)"),
                ("прирост просмотров / на сколько просмотров", "SUM(delta_views_count)"),
                (
                    "сколько разных видео получали новые просмотры",
                    "COUNT(DISTINCT video_id) ... WHERE delta_views_count > 0",
                ),
                ("больше N просмотров", "views_count > N"),
                ("28 ноября 2025", "DATE(created_at) = '2025-11-28'"),
                ("с 1 по 5 ноября 2025", "BETWEEN '2025-11-01' AND '2025-11-05'"),
                ("у креатора с id X", "creator_id = 'X'"),
            ]
            .into_iter()
            .map(|(phrase, fragment)| Conversion {
                phrase: phrase.to_string(),
                fragment: fragment.to_string(),
            })
            .collect(),
            intents: Vec::new(),
            examples: builtin_examples(),
        };
        descriptor.register_builtin_intents();
        descriptor
    }

    fn register_builtin_intents(&mut self) {
        self.register(IntentRule {
            name: "distinct_active_videos".to_string(),
            triggers: strings(&[
                "сколько разных видео получали новые",
                "разных видео получали",
                "получали новые",
                "видео получали",
            ]),
            table: TableKind::Snapshots,
            projection: "COUNT(DISTINCT video_id)".to_string(),
            filter: Some("delta_{metric}_count > 0".to_string()),
            requires_creator: false,
        });

        self.register(IntentRule {
            name: "growth".to_string(),
            triggers: strings(&[
                "на сколько просмотров",
                "прирост просмотров",
                "на сколько",
                "насколько",
                "прирост",
                "вырос",
                "увеличил",
            ]),
            table: TableKind::Snapshots,
            projection: "SUM(delta_{metric}_count)".to_string(),
            filter: None,
            requires_creator: false,
        });

        // Aggregates over final per-video counters
        for (name, triggers, func) in [
            ("total", &["сумма просмотров", "сумма", "сумму", "в сумме", "суммарн"][..], "SUM"),
            ("average", &["среднее", "средний", "в среднем"][..], "AVG"),
            ("maximum", &["максимальн", "наибольш"][..], "MAX"),
            ("minimum", &["минимальн", "наименьш"][..], "MIN"),
        ] {
            self.register(IntentRule {
                name: name.to_string(),
                triggers: strings(triggers),
                table: TableKind::Videos,
                projection: format!("{}({{metric}}_count)", func),
                filter: None,
                requires_creator: false,
            });
        }

        self.register(IntentRule {
            name: "distinct_creators".to_string(),
            triggers: strings(&[
                "сколько разных креаторов",
                "сколько креаторов",
                "количество креаторов",
            ]),
            table: TableKind::Videos,
            projection: "COUNT(DISTINCT creator_id)".to_string(),
            filter: None,
            requires_creator: false,
        });

        self.register(IntentRule {
            name: "creator_videos".to_string(),
            triggers: strings(&["сколько видео у креатора"]),
            table: TableKind::Videos,
            projection: "COUNT(*)".to_string(),
            filter: None,
            requires_creator: true,
        });

        self.register(IntentRule {
            name: "snapshot_count".to_string(),
            triggers: strings(&[
                "сколько замеров",
                "сколько снапшотов",
                "количество замеров",
                "количество снапшотов",
            ]),
            table: TableKind::Snapshots,
            projection: "COUNT(*)".to_string(),
            filter: None,
            requires_creator: false,
        });

        self.register(IntentRule {
            name: "video_count".to_string(),
            triggers: strings(&[
                "сколько всего",
                "общее количество",
                "сколько видео",
                "количество видео",
            ]),
            table: TableKind::Videos,
            projection: "COUNT(*)".to_string(),
            filter: None,
            requires_creator: false,
        });
    }

    /// Append an intent rule; earlier rules win ties on match length
    pub fn register(&mut self, rule: IntentRule) {
        self.intents.push(rule);
    }

    /// Load a descriptor from YAML and check it is usable
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let descriptor: SchemaDescriptor = serde_yaml::from_str(yaml)?;
        descriptor.check()?;
        Ok(descriptor)
    }

    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn check(&self) -> Result<(), SchemaError> {
        for kind in [TableKind::Videos, TableKind::Snapshots] {
            if self.table(kind).is_none() {
                return Err(SchemaError::MissingTable(kind.table_name()));
            }
        }
        if let Some(rule) = self.intents.iter().find(|r| r.triggers.is_empty()) {
            return Err(SchemaError::EmptyTriggers(rule.name.clone()));
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn table(&self, kind: TableKind) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.kind == kind)
    }

    /// Names of all tables a query may touch
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Month number for a (lower-cased) month word
    pub fn month_for(&self, word: &str) -> Option<u32> {
        self.months
            .iter()
            .find(|m| word.starts_with(m.stem.as_str()))
            .map(|m| m.month)
    }

    /// Metric of the first metric word occurring in `text`
    pub fn metric_in(&self, text: &str) -> Option<&str> {
        self.metrics
            .iter()
            .filter_map(|m| text.find(m.stem.as_str()).map(|pos| (pos, m)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, m)| m.metric.as_str())
    }

    /// Render the instruction text handed to a text-completion model
    pub fn render_prompt(&self) -> String {
        let mut out = String::new();
        out.push_str("# Схема базы данных для аналитики видео\n");
        out.push_str(&format!("# Версия схемы: {}\n\n## ТАБЛИЦЫ:\n\n", self.version));

        for (idx, table) in self.tables.iter().enumerate() {
            out.push_str(&format!(
                "{}. Таблица {} ({}):\n",
                idx + 1,
                table.name,
                table.description
            ));
            for col in &table.columns {
                out.push_str(&format!(
                    "- {} ({}) — {}\n",
                    col.name, col.data_type, col.description
                ));
            }
            out.push('\n');
        }

        out.push_str("## ПРАВИЛА ПРЕОБРАЗОВАНИЯ В SQL:\n\n");
        for conv in &self.conversions {
            out.push_str(&format!("- \"{}\" → {}\n", conv.phrase, conv.fragment));
        }
        out.push_str(
            "- даты публикации фильтруются по videos.video_created_at, \
             даты замеров по video_snapshots.created_at\n",
        );
        out.push_str("- оба конца диапазона дат включаются\n\n");

        if !self.examples.is_empty() {
            out.push_str("## ПРИМЕРЫ:\n\n");
            for ex in &self.examples {
                out.push_str(&format!("Вход: \"{}\" → {}\n", ex.question, ex.query));
            }
            out.push('\n');
        }

        out.push_str(
            "Разрешён только один запрос SELECT к таблицам videos и video_snapshots.\n\
             ВОЗВРАЩАЙ ТОЛЬКО SQL ЗАПРОС, БЕЗ ОБЪЯСНЕНИЙ!",
        );
        out
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn column(name: &str, data_type: &str, description: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        description: description.to_string(),
    }
}

fn builtin_tables() -> Vec<TableInfo> {
    let mut videos = vec![
        column("id", "текст", "идентификатор видео"),
        column("creator_id", "текст", "идентификатор креатора"),
        column("video_created_at", "дата-время", "дата и время публикации видео"),
    ];
    let mut snapshots = vec![
        column("id", "текст", "идентификатор замера"),
        column("video_id", "текст", "ссылка на videos.id"),
    ];

    for metric in ["views", "likes", "comments", "reports"] {
        videos.push(column(
            &format!("{}_count", metric),
            "число",
            "итоговое значение счётчика",
        ));
        snapshots.push(column(
            &format!("{}_count", metric),
            "число",
            "значение счётчика на момент замера",
        ));
    }
    for metric in ["views", "likes", "comments", "reports"] {
        snapshots.push(column(
            &format!("delta_{}_count", metric),
            "число",
            "приращение с прошлого замера, 0 для первого",
        ));
    }

    videos.push(column("created_at", "дата-время", "служебное поле"));
    videos.push(column("updated_at", "дата-время", "служебное поле"));
    snapshots.push(column("created_at", "дата-время", "время замера (раз в час)"));

    vec![
        TableInfo {
            kind: TableKind::Videos,
            name: TableKind::Videos.table_name().to_string(),
            description: "итоговая статистика по ролику".to_string(),
            columns: videos,
        },
        TableInfo {
            kind: TableKind::Snapshots,
            name: TableKind::Snapshots.table_name().to_string(),
            description: "почасовые замеры по ролику".to_string(),
            columns: snapshots,
        },
    ]
}

fn builtin_examples() -> Vec<Example> {
    [
        ("Сколько всего видео есть в системе?", "SELECT COUNT(*) FROM videos"),
        (
            "Сколько видео набрало больше 100000 просмотров за всё время?",
            "SELECT COUNT(*) FROM videos WHERE views_count > 100000",
        ),
        (
            "На сколько просмотров в сумме выросли все видео 28 ноября 2025?",
            "SELECT SUM(delta_views_count) FROM video_snapshots WHERE DATE(created_at) = '2025-11-28'",
        ),
        (
            "Сколько разных видео получали новые просмотры 27 ноября 2025?",
            "SELECT COUNT(DISTINCT video_id) FROM video_snapshots WHERE DATE(created_at) = '2025-11-27' AND delta_views_count > 0",
        ),
    ]
    .into_iter()
    .map(|(question, query)| Example {
        question: question.to_string(),
        query: query.to_string(),
    })
    .collect()
}
