use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
}

impl User {
    /// Full name when known, otherwise the username.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Partial profile update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Token pair returned by login, register and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    #[serde(alias = "accessToken")]
    pub access: String,
    #[serde(alias = "refreshToken")]
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_display_name() {
        let mut user: User = serde_json::from_str(
            r#"{"id":1,"username":"alice","email":"alice@example.com","first_name":"Alice","last_name":"Liddell"}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), "Alice Liddell");

        user.first_name.clear();
        user.last_name.clear();
        assert_eq!(user.display_name(), "alice");
    }

    #[test]
    fn test_auth_tokens_accepts_camel_case() {
        let tokens: AuthTokens =
            serde_json::from_str(r#"{"accessToken":"a1","refreshToken":"r1"}"#).unwrap();
        assert_eq!(tokens.access, "a1");
        assert_eq!(tokens.refresh, "r1");
    }

    #[test]
    fn test_profile_update_skips_unset() {
        let update = ProfileUpdate {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"email": "new@example.com"})
        );
    }
}
