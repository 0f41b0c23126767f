//! Keyword/regex based action extraction
//!
//! The heuristic parser is the always-on first tier of the pipeline. It
//! segments the entry on delimiters and connectives, then matches each
//! segment against compiled category, subcategory and achievement tables and
//! a duration pattern. Everything is substring containment over the
//! lowercased segment; no morphology beyond the stems baked into the tables.

use std::time::Instant;

use regex::Regex;

use crate::models::{mean_confidence, ActionSource, ActionType, ParseResult, RawAction};

/// One category entry: detection keywords plus optional subcategory keywords
struct CategoryRule {
    name: &'static str,
    keywords: &'static [&'static str],
    subcategories: &'static [(&'static str, &'static [&'static str])],
}

/// Ordered category table; first match wins
const CATEGORIES: &[CategoryRule] = &[
    CategoryRule {
        name: "спорт",
        keywords: &[
            "зал", "тренир", "спорт", "бег", "бежал", "пробеж", "качал", "пресс", "отжим",
            "подтяг", "присед", "кардио", "йога", "пилатес", "бассейн", "плав", "велосипед",
            "фитнес",
        ],
        subcategories: &[
            ("бодибилдинг", &["качал", "пожал", "жим", "присед", "становая"]),
            ("кардио", &["бег", "бежал", "кардио", "велосипед"]),
            ("йога", &["йога", "медитац"]),
        ],
    },
    CategoryRule {
        name: "учёба",
        keywords: &[
            "учи", "читал", "книг", "курс", "лекци", "учёб", "урок", "задач", "домашк",
            "экзамен", "конспект", "изуча", "разбир", "математ", "програм", "учебник",
        ],
        subcategories: &[
            ("математика", &["математ", "алгебр", "геометр", "матан"]),
            ("программирование", &["програм", "код", "python", "java", "алгоритм"]),
            ("языки", &["английск", "немецк", "французск", "язык"]),
        ],
    },
    CategoryRule {
        name: "готовка",
        keywords: &[
            "готов", "приготов", "сварил", "пожарил", "испёк", "кухн", "рецепт", "еда",
            "обед", "ужин", "завтрак",
        ],
        subcategories: &[],
    },
    CategoryRule {
        name: "работа",
        keywords: &[
            "работ", "проект", "задач", "встреч", "созвон", "деплой", "фича", "баг",
            "код ревью", "митинг",
        ],
        subcategories: &[],
    },
    CategoryRule {
        name: "творчество",
        keywords: &[
            "рисов", "писал", "музык", "игра на", "сочин", "творч", "художеств", "стих",
            "песн", "картин",
        ],
        subcategories: &[
            ("музыка", &["музык", "гитар", "пиани", "играл на"]),
            ("рисование", &["рисов", "нарисов", "художеств", "картин"]),
        ],
    },
    CategoryRule {
        name: "саморазвитие",
        keywords: &[
            "медитиров", "размышл", "психолог", "личностн", "саморазв", "цели",
            "планиров", "дневник",
        ],
        subcategories: &[],
    },
    CategoryRule {
        name: "социальное",
        keywords: &[
            "встреч", "друзья", "семья", "общен", "позвон", "гости", "компан", "тусовк",
            "свидан",
        ],
        subcategories: &[],
    },
    CategoryRule {
        name: "дом",
        keywords: &["убир", "уборк", "помыл", "постир", "почист", "порядок", "быт"],
        subcategories: &[],
    },
];

/// Achievement markers with their weights; first match wins
const ACHIEVEMENTS: &[(&str, i64)] = &[
    ("впервые", 20),
    ("первый раз", 20),
    ("рекорд", 25),
    ("побил рекорд", 25),
    ("личный рекорд", 25),
    ("достижени", 15),
    ("смог", 10),
    ("получилось", 10),
    ("наконец", 8),
    ("завершил", 12),
    ("окончил", 15),
    ("сдал экзамен", 20),
    ("защитил", 20),
];

/// Heuristic parser; stateless after construction, holds compiled patterns
pub struct HeuristicParser {
    segment_re: Regex,
    time_re: Regex,
    whitespace_re: Regex,
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicParser {
    pub fn new() -> Self {
        Self {
            segment_re: Regex::new(r"(?i)[,;]|\s+и\s+|\s+а\s+|\s+также\s+|\s+потом\s+")
                .expect("invalid segment pattern"),
            time_re: Regex::new(
                r"(?i)(\d+)\s*(час(?:а|ов)?|ч\.?|минут(?:а|ы|у)?|мин\.?|секунд(?:а|ы|у)?|сек\.?)",
            )
            .expect("invalid time pattern"),
            whitespace_re: Regex::new(r"\s+").expect("invalid whitespace pattern"),
        }
    }

    /// Extract actions from preprocessed text. Never fails: an unparseable
    /// entry yields an empty result.
    pub fn parse(&self, _user_id: i64, text: &str) -> ParseResult {
        let start = Instant::now();

        let actions: Vec<RawAction> = self
            .segment_text(text)
            .iter()
            .filter_map(|segment| self.extract_action(segment))
            .collect();

        ParseResult {
            confidence: mean_confidence(&actions),
            latency_ms: start.elapsed().as_millis() as i64,
            errors: Vec::new(),
            actions,
        }
    }

    fn segment_text(&self, text: &str) -> Vec<String> {
        self.segment_re
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn extract_action(&self, segment: &str) -> Option<RawAction> {
        let lowered = segment.to_lowercase();

        let (category, subcategory) = Self::detect_category(&lowered)?;
        let achievement_weight = Self::detect_achievement(&lowered);
        let time_minutes = self.extract_time(segment);

        let action_type = if achievement_weight.is_some() {
            ActionType::Achievement
        } else {
            ActionType::Activity
        };

        let mut confidence: f64 = 0.5 + 0.2; // base + matched category
        if time_minutes.is_some() {
            confidence += 0.2;
        }
        if achievement_weight.is_some() {
            confidence += 0.1;
        }

        Some(RawAction {
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            action: self.clean_action_text(segment),
            action_type,
            estimated_time_minutes: time_minutes,
            confidence: confidence.min(1.0),
            achievement_weight,
            source: ActionSource::Heuristic,
        })
    }

    fn detect_category(lowered: &str) -> Option<(&'static str, Option<&'static str>)> {
        for rule in CATEGORIES {
            for keyword in rule.keywords {
                if lowered.contains(keyword) {
                    let subcategory = rule
                        .subcategories
                        .iter()
                        .find(|(_, kws)| kws.iter().any(|kw| lowered.contains(kw)))
                        .map(|(name, _)| *name);
                    return Some((rule.name, subcategory));
                }
            }
        }
        None
    }

    fn detect_achievement(lowered: &str) -> Option<i64> {
        ACHIEVEMENTS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, weight)| *weight)
    }

    /// Extract a duration mention and convert it to minutes
    fn extract_time(&self, segment: &str) -> Option<i64> {
        let caps = self.time_re.captures(segment)?;
        let value: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_lowercase();

        if unit.starts_with('ч') {
            Some(value * 60)
        } else if unit.starts_with("мин") {
            Some(value)
        } else if unit.starts_with("сек") {
            Some((value / 60).max(1))
        } else {
            None
        }
    }

    /// Strip the duration mention and collapse whitespace
    fn clean_action_text(&self, segment: &str) -> String {
        let without_time = self.time_re.replace_all(segment, "");
        self.whitespace_re
            .replace_all(&without_time, " ")
            .trim()
            .to_string()
    }
}
