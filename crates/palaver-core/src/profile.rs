use serde::{Deserialize, Serialize};

/// A user's profile document as the document store holds it. Documents are
/// created on first save and mutated by merge writes, so every field
/// tolerates being absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub connected: bool,
}

impl UserProfile {
    pub fn display_bio(&self) -> &str {
        self.bio.as_deref().unwrap_or("No bio available")
    }

    pub fn presence(&self) -> &'static str {
        if self.connected { "Online" } else { "Offline" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_wire_field_names() {
        let profile = UserProfile {
            user_id: "u1".into(),
            full_name: "Amine".into(),
            bio: Some("hey".into()),
            phone_number: "21612345".into(),
            profile_picture: "https://cdn/p.jpg".into(),
            email: "amine@example.com".into(),
            connected: true,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["fullName"], "Amine");
        assert_eq!(value["phoneNumber"], "21612345");
        assert_eq!(value["profilePicture"], "https://cdn/p.jpg");
        assert_eq!(value["connected"], true);
    }

    #[test]
    fn test_partial_document_parses() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"userId":"u2","fullName":"Lina"}"#).unwrap();
        assert_eq!(profile.user_id, "u2");
        assert_eq!(profile.display_bio(), "No bio available");
        assert_eq!(profile.presence(), "Offline");
    }
}
