use serde::{Deserialize, Serialize};

/// Student record returned by the auth endpoints. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Student {
    /// Name shown in the header: the name, else the email's local part, else "Student".
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or("Student")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let mut student = Student {
            id: None,
            name: Some("Asha".to_string()),
            email: Some("f2021@pilani.bits-pilani.ac.in".to_string()),
        };
        assert_eq!(student.display_name(), "Asha");
        student.name = None;
        assert_eq!(student.display_name(), "f2021");
        student.email = None;
        assert_eq!(student.display_name(), "Student");
    }
}
