use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub points_earned: i32,
}

pub struct GradingService;

impl GradingService {
    /// Grades one submitted answer against the question snapshot. Pure: no
    /// state, no clock. Choice questions earn full points when the selected
    /// option is flagged correct, zero otherwise. Free-text questions are
    /// stored ungraded at zero points.
    pub fn grade(
        question: &Question,
        option_id: Option<Uuid>,
        text_answer: Option<&str>,
    ) -> Result<GradeOutcome> {
        match question.question_type {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                if text_answer.is_some() {
                    return Err(Error::InvalidAnswer(
                        "Choice questions are answered with option_id, not text".to_string(),
                    ));
                }
                let Some(option_id) = option_id else {
                    return Err(Error::InvalidAnswer(
                        "option_id is required for choice questions".to_string(),
                    ));
                };
                let Some(option) = question.option(option_id) else {
                    return Err(Error::InvalidAnswer(format!(
                        "Option {} does not belong to question {}",
                        option_id, question.id
                    )));
                };

                Ok(GradeOutcome {
                    is_correct: option.is_correct,
                    points_earned: if option.is_correct { question.points } else { 0 },
                })
            }
            QuestionType::ShortAnswer | QuestionType::Essay => {
                if option_id.is_some() {
                    return Err(Error::InvalidAnswer(
                        "Free-text questions are answered with text_answer, not an option"
                            .to_string(),
                    ));
                }
                let answered = text_answer.map_or(false, |t| !t.trim().is_empty());
                if !answered {
                    return Err(Error::InvalidAnswer(
                        "text_answer is required for free-text questions".to_string(),
                    ));
                }

                // No automatic correctness for free text; stored at zero.
                Ok(GradeOutcome {
                    is_correct: false,
                    points_earned: 0,
                })
            }
        }
    }
}
