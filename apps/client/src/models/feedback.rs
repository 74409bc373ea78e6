use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Analysis result returned by `/analyze`. Produced remotely; read-only here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default, deserialize_with = "lenient_percentage")]
    pub match_percentage: Option<f64>,
    /// Skills present in both documents.
    #[serde(default)]
    pub similarities: Vec<String>,
    /// Skills the job asks for that the CV lacks.
    #[serde(default)]
    pub missing: Vec<String>,
    /// Missing skill → closest catalogue course.
    #[serde(default)]
    pub bits_recommendations: BTreeMap<String, BitsCourse>,
    #[serde(default)]
    pub course_recommendations: Vec<CourseRecommendation>,
    /// Job description echo, when the server includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BitsCourse {
    #[serde(rename = "Course No", default)]
    pub course_no: String,
    #[serde(rename = "Course Title", default)]
    pub course_title: String,
    #[serde(rename = "Similarity", default)]
    pub similarity: f64,
    #[serde(rename = "Description and Scope", default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRecommendation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Feedback {
    /// `"72%"` (rounded), or `"N/A"` when the score is missing.
    pub fn formatted_match(&self) -> String {
        match self.match_percentage {
            Some(p) if p.is_finite() => format!("{}%", p.round() as i64),
            _ => "N/A".to_string(),
        }
    }
}

/// Accepts `72`, `72.5`, `"72"`, `"72%"` or `null`.
fn lenient_percentage<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYZE_FEEDBACK: &str = r#"{
        "match_percentage": 72,
        "similarities": ["Python", "SQL"],
        "missing": ["Airflow"],
        "bits_recommendations": {
            "Airflow": {
                "Course No": "CS F469",
                "Course Title": "Data Engineering",
                "Similarity": 0.41,
                "Description and Scope": "Pipelines and orchestration..."
            }
        },
        "course_recommendations": [{"name": "Airflow 101", "url": "https://courses.test/airflow"}],
        "overall_comment": "ignored"
    }"#;

    #[test]
    fn test_parses_analyze_payload() {
        let feedback: Feedback = serde_json::from_str(ANALYZE_FEEDBACK).unwrap();
        assert_eq!(feedback.match_percentage, Some(72.0));
        assert_eq!(feedback.similarities, vec!["Python", "SQL"]);
        assert_eq!(feedback.bits_recommendations["Airflow"].course_no, "CS F469");
        assert_eq!(feedback.course_recommendations[0].name, "Airflow 101");
        assert_eq!(feedback.job_description, None);
    }

    #[test]
    fn test_percentage_as_string() {
        let feedback: Feedback = serde_json::from_str(r#"{"match_percentage": "64%"}"#).unwrap();
        assert_eq!(feedback.match_percentage, Some(64.0));
        assert!(feedback.missing.is_empty());
    }

    #[test]
    fn test_formatted_match() {
        let mut feedback = Feedback {
            match_percentage: Some(71.6),
            ..Feedback::default()
        };
        assert_eq!(feedback.formatted_match(), "72%");
        feedback.match_percentage = None;
        assert_eq!(feedback.formatted_match(), "N/A");
    }
}
