use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionOption, QuestionType};
use crate::models::test::TestDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOptionPayload {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default)]
    pub options: Vec<QuestionOptionPayload>,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTestPayload {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub questions: Vec<QuestionPayload>,
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[validate(range(min = 1))]
    pub duration_seconds: Option<i64>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
}

impl CreateTestPayload {
    /// Structural checks the derive attributes cannot express.
    pub fn validate_questions(&self) -> Result<()> {
        if let (Some(from), Some(until)) = (self.available_from, self.available_until) {
            if from > until {
                return Err(Error::BadRequest(
                    "Availability window ends before it starts".to_string(),
                ));
            }
        }
        for (index, question) in self.questions.iter().enumerate() {
            let label = index + 1;
            if question.text.trim().is_empty() {
                return Err(Error::BadRequest(format!(
                    "Question {} has empty text",
                    label
                )));
            }
            if question.points < 0 {
                return Err(Error::BadRequest(format!(
                    "Question {} has negative points",
                    label
                )));
            }
            if question
                .options
                .iter()
                .any(|option| option.text.trim().is_empty())
            {
                return Err(Error::BadRequest(format!(
                    "Question {} has an option with empty text",
                    label
                )));
            }
            match question.question_type {
                QuestionType::MultipleChoice => {
                    if question.options.len() < 2 {
                        return Err(Error::BadRequest(format!(
                            "Question {} needs at least two options",
                            label
                        )));
                    }
                    if question.correct_count() != 1 {
                        return Err(Error::BadRequest(format!(
                            "Question {} must have exactly one correct option",
                            label
                        )));
                    }
                }
                QuestionType::TrueFalse => {
                    if question.options.len() != 2 {
                        return Err(Error::BadRequest(format!(
                            "Question {} needs exactly two options",
                            label
                        )));
                    }
                    if question.correct_count() != 1 {
                        return Err(Error::BadRequest(format!(
                            "Question {} must have exactly one correct option",
                            label
                        )));
                    }
                }
                QuestionType::ShortAnswer | QuestionType::Essay => {
                    if !question.options.is_empty() {
                        return Err(Error::BadRequest(format!(
                            "Question {} is free text and cannot have options",
                            label
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn into_definition(self, now: DateTime<Utc>) -> TestDefinition {
        TestDefinition {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            questions: self
                .questions
                .into_iter()
                .map(QuestionPayload::into_question)
                .collect(),
            max_attempts: self.max_attempts,
            duration_seconds: self.duration_seconds,
            available_from: self.available_from,
            available_until: self.available_until,
            is_published: self.is_published,
            created_at: now,
        }
    }
}

impl QuestionPayload {
    fn correct_count(&self) -> usize {
        self.options.iter().filter(|option| option.is_correct).count()
    }

    fn into_question(self) -> Question {
        Question {
            id: Uuid::new_v4(),
            text: self.text,
            question_type: self.question_type,
            points: self.points,
            options: self
                .options
                .into_iter()
                .map(|option| QuestionOption {
                    id: Uuid::new_v4(),
                    text: option.text,
                    is_correct: option.is_correct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub id: uuid::Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub max_attempts: i32,
    pub duration_seconds: Option<i64>,
    pub available_from: Option<DateTime<Utc>>,
    pub available_until: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub max_score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestListResponse {
    pub items: Vec<TestResponse>,
    pub total: usize,
}

impl From<TestDefinition> for TestResponse {
    fn from(value: TestDefinition) -> Self {
        let max_score = value.max_score();
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            questions: value.questions,
            max_attempts: value.max_attempts,
            duration_seconds: value.duration_seconds,
            available_from: value.available_from,
            available_until: value.available_until,
            is_published: value.is_published,
            created_at: value.created_at,
            max_score,
        }
    }
}
