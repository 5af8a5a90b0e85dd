use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::filter::Document;

const HASH_PREFIX: &str = "sha256$";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_name: String,
    #[serde(default)]
    pub role_description: String,
}

/// A user as stored in the `users` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub email: String,
    #[serde(alias = "phoneNumber")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl UserRecord {
    /// Map a validated request body onto the record
    pub fn from_body(body: Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(body))
    }

    /// Storage form, with the password hashed
    pub fn into_document(mut self) -> Result<Document, serde_json::Error> {
        self.password = self.password.map(|p| hash_password(&p));
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(serde::ser::Error::custom("user record did not serialize to an object")),
        }
    }
}

/// Salted SHA-256 as `sha256$<salt>$<hex digest>`; already-hashed input is returned as is
pub fn hash_password(plain: &str) -> String {
    if plain.starts_with(HASH_PREFIX) {
        return plain.to_string();
    }
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}${}", HASH_PREFIX, salt, digest(&salt, plain))
}

fn digest(salt: &str, plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_phone_number_alias() {
        let user = UserRecord::from_body(body(json!({
            "username": "jo", "firstName": "Jo", "lastName": "Doe",
            "email": "jo@example.com", "phoneNumber": "0700000000"
        })))
        .unwrap();
        assert_eq!(user.phone, "0700000000");
        assert!(!user.verified);
        assert!(user.roles.is_empty());
    }

    #[test]
    fn maps_roles_and_optional_fields() {
        let user = UserRecord::from_body(body(json!({
            "username": "jo", "firstName": "Jo", "middleName": "K", "lastName": "Doe",
            "email": "jo@example.com", "phone": "0700", "idNumber": "12345678",
            "verified": true, "roles": [{"roleName": "landlord", "roleDescription": "Owns houses"}]
        })))
        .unwrap();
        assert_eq!(user.middle_name.as_deref(), Some("K"));
        assert_eq!(user.roles[0].role_name, "landlord");

        let doc = user.into_document().unwrap();
        assert_eq!(doc["idNumber"], json!("12345678"));
        assert!(!doc.contains_key("password"));
    }

    #[test]
    fn mapping_errors_surface() {
        let err = UserRecord::from_body(body(json!({
            "username": "jo", "firstName": "Jo", "lastName": "Doe", "email": "jo@example.com", "phone": 700
        })))
        .unwrap_err();
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn stores_hashed_passwords() {
        let user = UserRecord::from_body(body(json!({
            "username": "jo", "firstName": "Jo", "lastName": "Doe",
            "email": "jo@example.com", "phone": "0700", "password": "hunter2"
        })))
        .unwrap();
        let doc = user.into_document().unwrap();
        let stored = doc["password"].as_str().unwrap();
        assert!(stored.starts_with("sha256$"));
        assert!(!stored.contains("hunter2"));

        let parts: Vec<&str> = stored.splitn(3, '$').collect();
        assert_eq!(parts[2], digest(parts[1], "hunter2"));
        assert_eq!(hash_password(stored), stored);
    }
}
