use anyhow::Result;
use rust_i18n::t;

use crate::error::ServiceError;
use crate::service::EvaluationService;

pub const SAMPLE_LESSON: &str = "本节课学习了数学中的二次函数，包括：
1. 二次函数的定义和一般形式 y=ax²+bx+c
2. 二次函数的图像特征（开口方向、顶点、对称轴）
3. 二次函数与一元二次方程的关系
4. 实际应用问题（如抛物线运动、最值问题等）

学生在课堂中表现积极，能够回答关于二次函数开口方向的问题，但在计算顶点坐标时出现了一些错误。";

pub const SAMPLE_RATING: &str = "良好";

const KEYWORDS: [&str; 14] = [
    "二次函数", "顶点", "对称轴", "开口", "抛物线", "方程", "最值",
    "理解", "掌握", "应用", "计算", "分析", "问题", "回答",
];

const SUGGESTION_WORDS: [&str; 3] = ["建议", "改进", "加强"];

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub lesson_keywords: Vec<&'static str>,
    /// Percentage of lesson keywords that reappear in the evaluation.
    pub relevance: f64,
    pub char_count: usize,
    pub has_suggestions: bool,
}

impl QualityReport {
    pub fn length_ok(&self) -> bool {
        (200..=400).contains(&self.char_count)
    }
}

fn keywords(text: &str) -> Vec<&'static str> {
    KEYWORDS.into_iter().filter(|k| text.contains(k)).collect()
}

pub fn analyze(evaluation: &str, lesson: &str) -> QualityReport {
    let lesson_keywords = keywords(lesson);
    let evaluation_keywords = keywords(evaluation);

    let relevant = lesson_keywords
        .iter()
        .filter(|k| evaluation_keywords.iter().any(|e| e.contains(*k) || k.contains(e)))
        .count();

    let relevance = if lesson_keywords.is_empty() {
        0.0
    } else {
        relevant as f64 / lesson_keywords.len() as f64 * 100.0
    };

    QualityReport {
        lesson_keywords,
        relevance,
        char_count: evaluation.chars().count(),
        has_suggestions: SUGGESTION_WORDS.iter().any(|w| evaluation.contains(w)),
    }
}

/// Shows at most the first 10 characters of a key.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(10).collect();
    format!("{}...", visible)
}

fn hint_for_status(status: u16) -> Option<String> {
    match status {
        401 => Some(t!("check_hint_401").to_string()),
        403 => Some(t!("check_hint_403").to_string()),
        429 => Some(t!("check_hint_429").to_string()),
        _ => None,
    }
}

/// Troubleshooting hint for a failed check, keyed on the provider's HTTP status.
pub fn failure_hint(err: &ServiceError) -> Option<String> {
    err.adapter_error().and_then(|a| a.status()).and_then(hint_for_status)
}

/// Runs one evaluation on the sample lesson and prints a short quality report.
pub fn run(service: &EvaluationService) -> Result<()> {
    let settings = service.settings();
    let provider = service.active_provider();
    let svc = settings.service(provider);

    println!("{}", t!("check_config_header"));
    println!("{}", t!("check_provider", provider = provider, url = svc.url));
    println!("{}", t!("check_model", model = svc.model));
    println!("{}", t!("check_api_key", key = svc.api_key.as_deref().map(mask_key).unwrap_or_else(|| "-".to_string())));
    if let Some(secret) = svc.secret_key.as_deref() {
        println!("{}", t!("check_secret_key", key = mask_key(secret)));
    }
    println!("{}", t!("check_params", max_tokens = settings.max_tokens, temperature = settings.temperature));
    println!();
    println!("{}", t!("check_running"));

    match service.generate(SAMPLE_LESSON, SAMPLE_RATING) {
        Ok(evaluation) => {
            println!("{}", t!("check_success"));
            println!("{}", "=".repeat(50));
            println!("{}", evaluation);
            println!("{}", "=".repeat(50));

            let report = analyze(&evaluation, SAMPLE_LESSON);
            println!("{}", t!("check_keywords", keywords = report.lesson_keywords.join(", ")));
            println!("{}", t!("check_relevance", score = format!("{:.1}", report.relevance)));
            println!("{}", t!("check_length", count = report.char_count, ok = if report.length_ok() { "✅" } else { "⚠️" }));
            println!("{}", t!("check_suggestions", ok = if report.has_suggestions { "✅" } else { "❌" }));
            Ok(())
        },
        Err(e) => {
            println!("{}", t!("check_failed", error = e));
            if let Some(hint) = failure_hint(&e) {
                println!("{}", hint);
            }
            Err(e.into())
        },
    }
}
