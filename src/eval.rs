//! Batch evaluation of the answer pipeline over a fixed question suite

use crate::error::{AdvisorError, Result};
use crate::pipeline::{AnswerPipeline, FailureKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Marker every grounded answer is expected to contain
pub const CITATION_MARKER: &str = "[Source p.";

pub const DEFAULT_QUESTIONS: [&str; 20] = [
    // Pests
    "What are the main pests affecting cotton crops?",
    "What are the common diseases found in cotton plants?",
    "What is the recommended integrated pest management strategy for cotton?",
    "How can farmers identify early signs of pest infestation in cotton?",
    // Specific pests
    "What is the life cycle of cotton bollworm?",
    "How to control whitefly in cotton crops?",
    "What are the symptoms of pink bollworm infestation?",
    "What is the best time to spray pesticides for controlling cotton pests?",
    // Diseases
    "What causes cotton leaf curl disease?",
    "How to prevent wilt disease in cotton?",
    "What are the symptoms of bacterial blight in cotton?",
    "How to manage root rot in cotton plants?",
    // Treatments
    "What are the recommended chemical pesticides for cotton pest control?",
    "What biological control methods are effective for cotton pests?",
    "What is the recommended dosage for pest control in cotton?",
    "How often should cotton fields be monitored for pests?",
    // Prevention
    "What preventive measures can reduce pest infestation in cotton?",
    "What crop rotation practices help in cotton pest management?",
    "How does weather affect pest occurrence in cotton?",
    "What are the best agricultural practices to minimize cotton diseases?",
];

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResult {
    pub question_num: usize,
    pub question: String,
    pub answer: String,
    pub success: bool,
    pub has_citation: bool,
    pub word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub total_questions: usize,
    pub successful: usize,
    pub with_citations: usize,
    pub success_rate: f64,
    pub citation_rate: f64,
    pub average_word_count: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub test_date: String,
    pub summary: EvalSummary,
    pub results: Vec<QuestionResult>,
}

/// Question file: either a JSON array of strings or `{"questions": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionFile {
    List(Vec<String>),
    Wrapped { questions: Vec<String> },
}

pub fn load_questions(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| AdvisorError::Io {
        source: e,
        context: format!("Failed to read question file: {:?}", path),
    })?;
    let file: QuestionFile = serde_json::from_str(&content).map_err(|e| AdvisorError::Json {
        source: e,
        context: format!("Failed to parse question file: {:?}", path),
    })?;

    let questions = match file {
        QuestionFile::List(questions) | QuestionFile::Wrapped { questions } => questions,
    };
    if questions.is_empty() {
        return Err(AdvisorError::Config(format!(
            "Question file {:?} contains no questions",
            path
        )));
    }
    Ok(questions)
}

pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Answer every question in order, one at a time
pub async fn run_suite(pipeline: &AnswerPipeline, questions: &[String]) -> EvalReport {
    let mut results = Vec::with_capacity(questions.len());

    for (i, question) in questions.iter().enumerate() {
        info!("Question {}/{}: {}", i + 1, questions.len(), question);
        let result = pipeline.answer(question, &[]).await;

        results.push(QuestionResult {
            question_num: i + 1,
            question: question.clone(),
            has_citation: result.success && result.answer_text.contains(CITATION_MARKER),
            word_count: result.answer_text.split_whitespace().count(),
            answer: result.answer_text,
            success: result.success,
            failure: result.failure,
        });
    }

    EvalReport {
        test_date: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        summary: summarize(&results),
        results,
    }
}

pub fn summarize(results: &[QuestionResult]) -> EvalSummary {
    let total = results.len();
    let successful = results.iter().filter(|r| r.success).count();
    let with_citations = results.iter().filter(|r| r.has_citation).count();
    let words: usize = results.iter().map(|r| r.word_count).sum();

    let rate = |n: usize| {
        if total == 0 {
            0.0
        } else {
            n as f64 / total as f64
        }
    };

    EvalSummary {
        total_questions: total,
        successful,
        with_citations,
        success_rate: rate(successful),
        citation_rate: rate(with_citations),
        average_word_count: rate(words),
    }
}

impl EvalReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| AdvisorError::Json {
            source: e,
            context: "Failed to serialize evaluation report".to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| AdvisorError::Io {
            source: e,
            context: format!("Failed to write evaluation report: {:?}", path),
        })
    }

    /// Successful answers that carry no citation
    pub fn uncited(&self) -> impl Iterator<Item = &QuestionResult> {
        self.results.iter().filter(|r| r.success && !r.has_citation)
    }
}

/// Timestamped report name, e.g. `eval_results_20250101_120000.json`
pub fn default_report_name() -> String {
    format!(
        "eval_results_{}.json",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(success: bool, has_citation: bool, word_count: usize) -> QuestionResult {
        QuestionResult {
            question_num: 1,
            question: "q".to_string(),
            answer: "a".to_string(),
            success,
            has_citation,
            word_count,
            failure: None,
        }
    }

    #[test]
    fn test_summary_rates() {
        let results = vec![
            result(true, true, 40),
            result(true, false, 20),
            result(false, false, 10),
            result(true, true, 30),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.with_citations, 2);
        assert!((summary.success_rate - 0.75).abs() < 1e-9);
        assert!((summary.citation_rate - 0.5).abs() < 1e-9);
        assert!((summary.average_word_count - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.success_rate, 0.0);
    }

    #[test]
    fn test_load_question_formats() {
        let temp = TempDir::new().unwrap();

        let list = temp.path().join("list.json");
        std::fs::write(&list, r#"["How to control whitefly?"]"#).unwrap();
        assert_eq!(load_questions(&list).unwrap(), vec!["How to control whitefly?"]);

        let wrapped = temp.path().join("wrapped.json");
        std::fs::write(&wrapped, r#"{"questions": ["a", "b"]}"#).unwrap();
        assert_eq!(load_questions(&wrapped).unwrap().len(), 2);

        let empty = temp.path().join("empty.json");
        std::fs::write(&empty, "[]").unwrap();
        assert!(load_questions(&empty).is_err());
    }

    #[test]
    fn test_default_suite_size() {
        assert_eq!(default_questions().len(), 20);
    }
}
