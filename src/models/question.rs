// src/models/question.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::{Validate, ValidationError};

use crate::utils::html::clean_html;

static OPTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-F]$").expect("option id pattern is valid"));

/// PMP exam content outline domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    People,
    Process,
    BusinessEnvironment,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::People => "people",
            Domain::Process => "process",
            Domain::BusinessEnvironment => "business_environment",
        }
    }

    /// Accepts the spellings found in spreadsheets ("Business Environment", "business-environment").
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match key.as_str() {
            "people" => Some(Domain::People),
            "process" => Some(Domain::Process),
            "business_environment" | "business" => Some(Domain::BusinessEnvironment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Predictive,
    Agile,
    Hybrid,
}

impl Approach {
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "predictive" | "waterfall" => Some(Approach::Predictive),
            "agile" => Some(Approach::Agile),
            "hybrid" => Some(Approach::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "moderate" => Some(Difficulty::Medium),
            "hard" | "difficult" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// One answer choice. `id` is a single letter, `A` through `F`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub statement: String,
    pub options: Json<Vec<QuestionOption>>,

    /// One id for single-answer questions, several for "choose two/three".
    pub correct_option_ids: Json<Vec<String>>,

    pub explanation: Option<String>,
    pub domain: Domain,
    pub approach: Approach,
    pub difficulty: Difficulty,

    /// Inactive questions are drafts and never served to candidates.
    pub is_active: bool,

    pub exam_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            statement: self.statement.clone(),
            options: self.options.0.clone(),
            select_count: self.correct_option_ids.0.len(),
            domain: self.domain,
            approach: self.approach,
            difficulty: self.difficulty,
        }
    }
}

/// DTO for sending question to client (excludes answer key and explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub statement: String,
    pub options: Vec<QuestionOption>,
    /// How many options the candidate has to pick.
    pub select_count: usize,
    pub domain: Domain,
    pub approach: Approach,
    pub difficulty: Difficulty,
}

fn default_true() -> bool {
    true
}

/// DTO for creating a new question.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[validate(schema(function = validate_answer_key))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 4000), custom(function = validate_visible_text))]
    pub statement: String,
    #[validate(length(min = 2, max = 6, message = "A question needs between 2 and 6 options."))]
    pub options: Vec<QuestionOption>,
    pub correct_option_ids: Vec<String>,
    #[validate(length(max = 4000))]
    pub explanation: Option<String>,
    pub domain: Domain,
    pub approach: Approach,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub exam_id: Option<i64>,
}

impl CreateQuestionRequest {
    /// Strips unsafe markup from every free-text field and normalizes the answer key.
    pub fn sanitized(mut self) -> Self {
        self.statement = clean_html(&self.statement);
        self.explanation = self.explanation.map(|e| clean_html(&e));
        for opt in &mut self.options {
            opt.id = opt.id.trim().to_ascii_uppercase();
            opt.text = clean_html(&opt.text);
        }
        let mut ids: Vec<String> = self
            .correct_option_ids
            .iter()
            .map(|id| id.trim().to_ascii_uppercase())
            .collect();
        ids.sort();
        ids.dedup();
        self.correct_option_ids = ids;
        self
    }
}

/// Text that sanitizes to nothing (e.g. only a `<script>` block) counts as empty.
fn has_visible_text(raw: &str) -> bool {
    !clean_html(raw).trim().is_empty()
}

fn validate_visible_text(raw: &str) -> Result<(), ValidationError> {
    if has_visible_text(raw) {
        Ok(())
    } else {
        Err(ValidationError::new("empty_after_sanitizing"))
    }
}

fn validate_answer_key(req: &CreateQuestionRequest) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for opt in &req.options {
        let id = opt.id.trim().to_ascii_uppercase();
        if !OPTION_ID.is_match(&id) {
            return Err(ValidationError::new("invalid_option_id"));
        }
        if !seen.insert(id) {
            return Err(ValidationError::new("duplicate_option_id"));
        }
        if !has_visible_text(&opt.text) || opt.text.len() > 1000 {
            return Err(ValidationError::new("invalid_option_text"));
        }
    }
    if req.correct_option_ids.is_empty() {
        return Err(ValidationError::new("missing_correct_option"));
    }
    for id in &req.correct_option_ids {
        if !seen.contains(&id.trim().to_ascii_uppercase()) {
            return Err(ValidationError::new("correct_option_not_in_options"));
        }
    }
    Ok(())
}

/// DTO for updating a question. Absent fields keep their stored value.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub statement: Option<String>,
    pub options: Option<Vec<QuestionOption>>,
    pub correct_option_ids: Option<Vec<String>>,
    pub explanation: Option<String>,
    pub domain: Option<Domain>,
    pub approach: Option<Approach>,
    pub difficulty: Option<Difficulty>,
    pub is_active: Option<bool>,
    pub exam_id: Option<i64>,
}

impl UpdateQuestionRequest {
    /// Merges this patch over the stored question, producing a full request to re-validate.
    pub fn merge_into(self, current: Question) -> CreateQuestionRequest {
        CreateQuestionRequest {
            statement: self.statement.unwrap_or(current.statement),
            options: self.options.unwrap_or(current.options.0),
            correct_option_ids: self
                .correct_option_ids
                .unwrap_or(current.correct_option_ids.0),
            explanation: self.explanation.or(current.explanation),
            domain: self.domain.unwrap_or(current.domain),
            approach: self.approach.unwrap_or(current.approach),
            difficulty: self.difficulty.unwrap_or(current.difficulty),
            is_active: self.is_active.unwrap_or(current.is_active),
            exam_id: self.exam_id.or(current.exam_id),
        }
    }
}

/// Query filter for drawing a pool of questions.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionFilter {
    pub domain: Option<Domain>,
    pub approach: Option<Approach>,
    pub difficulty: Option<Difficulty>,
    pub limit: Option<i64>,
}

/// Query parameters for the admin question listing.
#[derive(Debug, Deserialize)]
pub struct AdminQuestionParams {
    pub exam_id: Option<i64>,
    pub active: Option<bool>,
}

/// One spreadsheet row as posted by the bulk importer.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Option A")]
    pub option_a: Option<String>,
    #[serde(rename = "Option B")]
    pub option_b: Option<String>,
    #[serde(rename = "Option C")]
    pub option_c: Option<String>,
    #[serde(rename = "Option D")]
    pub option_d: Option<String>,
    #[serde(rename = "Option E")]
    pub option_e: Option<String>,
    #[serde(rename = "Option F")]
    pub option_f: Option<String>,
    #[serde(rename = "Correct Answer")]
    pub correct_answer: String,
    #[serde(rename = "Explanation")]
    pub explanation: Option<String>,
    #[serde(rename = "Domain")]
    pub domain: Option<String>,
    #[serde(rename = "Approach")]
    pub approach: Option<String>,
    #[serde(rename = "Difficulty")]
    pub difficulty: Option<String>,
}

impl ImportRow {
    /// Converts the row into a validated create request.
    /// Missing domain/approach default to Process/Predictive.
    pub fn into_request(self, exam_id: Option<i64>) -> Result<CreateQuestionRequest, String> {
        let columns = [
            ("A", self.option_a),
            ("B", self.option_b),
            ("C", self.option_c),
            ("D", self.option_d),
            ("E", self.option_e),
            ("F", self.option_f),
        ];
        let options: Vec<QuestionOption> = columns
            .into_iter()
            .filter_map(|(id, text)| {
                text.filter(|t| !t.trim().is_empty()).map(|t| QuestionOption {
                    id: id.to_string(),
                    text: t.trim().to_string(),
                })
            })
            .collect();

        let correct_option_ids: Vec<String> = self
            .correct_answer
            .split([',', ';', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_uppercase)
            .collect();

        let domain = match self.domain.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => Domain::parse_loose(raw).ok_or(format!("unknown domain '{raw}'"))?,
            None => Domain::Process,
        };
        let approach = match self.approach.as_deref().filter(|a| !a.trim().is_empty()) {
            Some(raw) => Approach::parse_loose(raw).ok_or(format!("unknown approach '{raw}'"))?,
            None => Approach::Predictive,
        };
        let difficulty = match self.difficulty.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => {
                Difficulty::parse_loose(raw).ok_or(format!("unknown difficulty '{raw}'"))?
            }
            None => Difficulty::default(),
        };

        let req = CreateQuestionRequest {
            statement: self.question.trim().to_string(),
            options,
            correct_option_ids,
            explanation: self.explanation.filter(|e| !e.trim().is_empty()),
            domain,
            approach,
            difficulty,
            is_active: true,
            exam_id,
        };
        req.validate().map_err(|e| e.to_string())?;
        Ok(req.sanitized())
    }
}

/// Body of `POST /api/admin/questions/import`.
#[derive(Debug, Deserialize)]
pub struct ImportQuestionsRequest {
    pub exam_id: Option<i64>,
    pub rows: Vec<ImportRow>,
}

/// Per-row failure reported back to the importer. `row` is 1-based, header excluded.
#[derive(Debug, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: Vec<ImportRowError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, text: &str) -> QuestionOption {
        QuestionOption {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn request() -> CreateQuestionRequest {
        CreateQuestionRequest {
            statement: "A stakeholder escalates a conflict. What should the PM do first?".into(),
            options: vec![
                option("A", "Escalate to the sponsor"),
                option("B", "Meet the parties to understand the issue"),
                option("C", "Update the risk register"),
                option("D", "Ignore it"),
            ],
            correct_option_ids: vec!["B".into()],
            explanation: Some("Collaborate before escalating.".into()),
            domain: Domain::People,
            approach: Approach::Agile,
            difficulty: Difficulty::Medium,
            is_active: true,
            exam_id: None,
        }
    }

    fn row() -> ImportRow {
        ImportRow {
            question: "Which artifact tracks identified risks?".into(),
            option_a: Some("Risk register".into()),
            option_b: Some("Issue log".into()),
            option_c: Some("Charter".into()),
            option_d: Some(" ".into()),
            option_e: None,
            option_f: None,
            correct_answer: "a".into(),
            explanation: None,
            domain: Some("Business Environment".into()),
            approach: None,
            difficulty: Some("Hard".into()),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn correct_id_must_be_an_option() {
        let mut req = request();
        req.correct_option_ids = vec!["E".into()];
        assert!(req.validate().is_err());
    }

    #[test]
    fn duplicate_option_ids_rejected() {
        let mut req = request();
        req.options[1].id = "A".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn single_option_rejected() {
        let mut req = request();
        req.options.truncate(1);
        req.correct_option_ids = vec!["A".into()];
        assert!(req.validate().is_err());
    }

    #[test]
    fn markup_only_text_is_rejected() {
        let mut req = request();
        req.statement = "<script>alert(1)</script>".into();
        assert!(req.validate().is_err());

        let mut req = request();
        req.options[1].text = "<script>steal()</script>  ".into();
        assert!(req.validate().is_err());

        let mut req = request();
        req.statement = "<b>Which</b> artifact?".into();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn sanitized_strips_script_and_normalizes_key() {
        let mut req = request();
        req.statement = "Pick one<script>alert(1)</script>".into();
        req.correct_option_ids = vec!["b".into(), "B".into()];
        let req = req.sanitized();
        assert!(!req.statement.contains("script"));
        assert_eq!(req.correct_option_ids, vec!["B".to_string()]);
    }

    #[test]
    fn import_row_skips_blank_options_and_parses_labels() {
        let req = row().into_request(Some(3)).unwrap();
        assert_eq!(req.options.len(), 3);
        assert_eq!(req.correct_option_ids, vec!["A".to_string()]);
        assert_eq!(req.domain, Domain::BusinessEnvironment);
        assert_eq!(req.approach, Approach::Predictive);
        assert_eq!(req.difficulty, Difficulty::Hard);
        assert_eq!(req.exam_id, Some(3));
    }

    #[test]
    fn import_row_with_multiple_answers() {
        let mut r = row();
        r.correct_answer = "A, C".into();
        let req = r.into_request(None).unwrap();
        assert_eq!(req.correct_option_ids, vec!["A".to_string(), "C".to_string()]);
    }

    #[test]
    fn import_row_rejects_unknown_domain() {
        let mut r = row();
        r.domain = Some("Finance".into());
        let err = r.into_request(None).unwrap_err();
        assert!(err.contains("Finance"));
    }

    #[test]
    fn import_row_rejects_answer_pointing_at_blank_option() {
        let mut r = row();
        r.correct_answer = "D".into();
        assert!(r.into_request(None).is_err());
    }

    #[test]
    fn import_row_deserializes_spreadsheet_headers() {
        let json = serde_json::json!({
            "Question": "Q?",
            "Option A": "x",
            "Option B": "y",
            "Correct Answer": "B"
        });
        let r: ImportRow = serde_json::from_value(json).unwrap();
        assert_eq!(r.option_b.as_deref(), Some("y"));
        assert!(r.option_c.is_none());
    }

    #[test]
    fn public_question_hides_answer_key() {
        let q = Question {
            id: 7,
            statement: "S".into(),
            options: Json(vec![option("A", "a"), option("B", "b"), option("C", "c")]),
            correct_option_ids: Json(vec!["A".into(), "C".into()]),
            explanation: Some("because".into()),
            domain: Domain::Process,
            approach: Approach::Hybrid,
            difficulty: Difficulty::Easy,
            is_active: true,
            exam_id: None,
            created_at: None,
        };
        let public = serde_json::to_value(q.to_public()).unwrap();
        assert_eq!(public["select_count"], 2);
        assert!(public.get("correct_option_ids").is_none());
        assert!(public.get("explanation").is_none());
    }
}
