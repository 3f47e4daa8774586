use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Field, Refinement, Rule, Schema};

pub static REGISTER: Schema = Schema {
    fields: &[
        Field {
            name: "name",
            rules: &[
                Rule::MinLen(2, "Name must be at least 2 characters long"),
                Rule::MaxLen(50, "Name must be at most 50 characters long"),
            ],
        },
        Field {
            name: "email",
            rules: &[Rule::Email("Invalid email address")],
        },
        Field {
            name: "password",
            rules: &[
                Rule::MinLen(8, "Password must be at least 8 characters long"),
                Rule::MaxLen(100, "Password must be at most 100 characters long"),
            ],
        },
        Field {
            name: "passwordConfirm",
            rules: &[
                Rule::MinLen(8, "Password must be at least 8 characters long"),
                Rule::MaxLen(100, "Password must be at most 100 characters long"),
            ],
        },
    ],
    refinements: &[Refinement {
        path: "passwordConfirm",
        message: "Passwords do not match",
        check: passwords_match,
    }],
};

pub static LOGIN: Schema = Schema {
    fields: &[
        Field {
            name: "email",
            rules: &[Rule::Email("Invalid email address")],
        },
        Field {
            name: "password",
            rules: &[
                Rule::MinLen(6, "Password must be at least 6 characters long"),
                Rule::MaxLen(100, "Password must be at most 100 characters long"),
            ],
        },
    ],
    refinements: &[],
};

fn passwords_match(payload: &Map<String, Value>) -> bool {
    payload.get("password") == payload.get("passwordConfirm")
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn register_body(password: &str, confirm: &str) -> Value {
        json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "password": password,
            "passwordConfirm": confirm,
        })
    }

    #[test]
    fn register_accepts_matching_passwords_unchanged() {
        let input: RegisterInput =
            validate(&REGISTER, &register_body("analytical", "analytical")).expect("valid");
        assert_eq!(input.name, "Ada Lovelace");
        assert_eq!(input.email, "ada@example.com");
        assert_eq!(input.password, "analytical");
        assert_eq!(input.password_confirm, "analytical");
    }

    #[test]
    fn register_keeps_email_case() {
        let mut body = register_body("analytical", "analytical");
        body["email"] = json!("Ada@Example.com");
        let input: RegisterInput = validate(&REGISTER, &body).expect("valid");
        assert_eq!(input.email, "Ada@Example.com");
    }

    #[test]
    fn register_mismatch_lands_on_password_confirm() {
        for (password, confirm) in [("analytical", "engine-42"), ("abcdefgh", "abcdefgH")] {
            let err = validate::<RegisterInput>(&REGISTER, &register_body(password, confirm))
                .unwrap_err();
            assert_eq!(
                err.field("passwordConfirm"),
                Some(&["Passwords do not match".to_string()][..])
            );
            assert!(err.field("password").is_none());
        }
    }

    #[test]
    fn register_reports_each_bad_field() {
        let body = json!({
            "name": "A",
            "email": "not-an-email",
            "password": "short",
            "passwordConfirm": "short",
        });
        let err = validate::<RegisterInput>(&REGISTER, &body).unwrap_err();
        assert_eq!(
            err.field("name"),
            Some(&["Name must be at least 2 characters long".to_string()][..])
        );
        assert_eq!(err.field("email"), Some(&["Invalid email address".to_string()][..]));
        assert!(err.field("password").is_some());
        assert!(err.field("passwordConfirm").is_some());
    }

    #[test]
    fn login_requires_both_fields() {
        let err = validate::<LoginInput>(&LOGIN, &json!({"email": "ada@example.com"})).unwrap_err();
        assert_eq!(err.field("password"), Some(&["Required".to_string()][..]));

        let ok: LoginInput =
            validate(&LOGIN, &json!({"email": "ada@example.com", "password": "secret"}))
                .expect("valid");
        assert_eq!(ok.password, "secret");
    }
}
