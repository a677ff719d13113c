use serde::{Deserialize, Serialize};

/// The two task positions in a writing exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskSlot {
    Task1,
    Task2,
}

impl TaskSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskSlot::Task1 => "task1",
            TaskSlot::Task2 => "task2",
        }
    }
}

impl std::fmt::Display for TaskSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    Academic,
    General,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Academic => "academic",
            ExamType::General => "general",
        }
    }
}

impl std::fmt::Display for ExamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A writing prompt as stored by the content-management collaborator.
/// Immutable once referenced by a submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingTask {
    #[serde(rename = "_id")]
    pub id: String,
    pub slot: TaskSlot,
    pub exam_type: ExamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl WritingTask {
    /// Slot content policy: task 1 prompts are built around a figure, task 2
    /// prompts are text-only.
    pub fn check_content_policy(&self) -> Result<(), String> {
        match self.slot {
            TaskSlot::Task1 if self.image_url.is_none() => {
                Err(format!("task {} requires an image reference", self.id))
            }
            TaskSlot::Task2 if self.image_url.is_some() => Err(format!(
                "task {} must not carry an image reference",
                self.id
            )),
            TaskSlot::Task2
                if self
                    .question_text
                    .as_deref()
                    .is_none_or(|q| q.trim().is_empty()) =>
            {
                Err(format!("task {} is missing its question text", self.id))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(slot: TaskSlot, question: Option<&str>, image: Option<&str>) -> WritingTask {
        WritingTask {
            id: "t-1".to_string(),
            slot,
            exam_type: ExamType::Academic,
            question_text: question.map(str::to_string),
            image_url: image.map(str::to_string),
            source: None,
        }
    }

    #[test]
    fn task1_requires_image() {
        let t = task(TaskSlot::Task1, Some("Describe the chart."), None);
        assert!(t.check_content_policy().is_err());

        let t = task(
            TaskSlot::Task1,
            Some("Describe the chart."),
            Some("images/writing/chart-1.png"),
        );
        assert!(t.check_content_policy().is_ok());
    }

    #[test]
    fn task2_forbids_image() {
        let t = task(
            TaskSlot::Task2,
            Some("Discuss both views."),
            Some("images/writing/essay.png"),
        );
        assert!(t.check_content_policy().is_err());
    }

    #[test]
    fn task2_requires_question_text() {
        let t = task(TaskSlot::Task2, None, None);
        assert!(t.check_content_policy().is_err());

        let t = task(TaskSlot::Task2, Some("   "), None);
        assert!(t.check_content_policy().is_err());

        let t = task(TaskSlot::Task2, Some("Discuss both views."), None);
        assert!(t.check_content_policy().is_ok());
    }

    #[test]
    fn slot_and_exam_type_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskSlot::Task1).unwrap(),
            "\"task1\""
        );
        assert_eq!(
            serde_json::to_string(&ExamType::General).unwrap(),
            "\"general\""
        );
    }
}
