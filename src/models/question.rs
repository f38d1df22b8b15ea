use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question as frozen into an attempt's snapshot at start time. Owned by the
/// test catalog; never mutated by the attempt lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    /// Choice questions are answered by option id, the rest by free text.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: Uuid,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl Question {
    pub fn option(&self, option_id: Uuid) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}
