use std::sync::LazyLock;

use regex::Regex;

use super::{Pattern, matches};

static LOGIN: Pattern = LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,62}$").ok());

const RESERVED_LOGINS: &[&str] = &[
    "azure_superuser",
    "azure_pg_admin",
    "admin",
    "administrator",
    "root",
    "guest",
    "public",
];

/// Values the API refuses regardless of complexity
const DISALLOWED_PASSWORDS: &[&str] = &[
    "abc@123",
    "P@$$w0rd",
    "P@ssw0rd",
    "P@ssword123",
    "Pa$$word",
    "pass@word1",
    "Password!",
    "Password1",
    "Password22",
    "iloveyou!",
];

/// Administrator login of a PostgreSQL Flexible Server
pub fn flexible_server_administrator_login(input: &str) -> Result<(), String> {
    if let Some(reserved) = RESERVED_LOGINS
        .iter()
        .find(|r| r.eq_ignore_ascii_case(input))
    {
        return Err(format!(
            "administrator login can not be one of {:?}, got {:?}",
            RESERVED_LOGINS, reserved
        ));
    }
    if input.to_ascii_lowercase().starts_with("pg_") {
        return Err(format!(
            "administrator login can not start with \"pg_\", got {:?}",
            input
        ));
    }
    if !matches(&LOGIN, input) {
        return Err(format!(
            "administrator login must be 1 - 63 characters, start with a letter or underscore and contain only letters, numbers and underscores, got {:?}",
            input
        ));
    }
    Ok(())
}

/// Password complexity: 3 of the 4 character classes, bounded length and
/// none of the values the API rejects
pub fn password_complexity(password: &str, min: usize, max: usize) -> Result<(), String> {
    let classes = [
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    if classes.iter().filter(|matched| **matched).count() < 3 {
        return Err(
            "password did not meet minimum password complexity requirements. A password must contain at least 3 of the 4 following conditions: a lower case character, a upper case character, a digit and/or a special character"
                .to_string(),
        );
    }

    let length = password.chars().count();
    if length < min || length > max {
        return Err(format!(
            "password must be between {} and {} characters long, got {} characters",
            min, max, length
        ));
    }

    if DISALLOWED_PASSWORDS.contains(&password) {
        return Err(format!(
            "password can not be one of {:?}",
            DISALLOWED_PASSWORDS
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_logins() {
        let cases = [
            ("psqladmin", true),
            ("_svc", true),
            ("user_01", true),
            ("admin", false),
            ("Administrator", false),
            ("azure_superuser", false),
            ("pg_owner", false),
            ("PG_owner", false),
            ("1user", false),
            ("user-name", false),
            ("", false),
        ];
        for (input, valid) in cases {
            assert_eq!(
                flexible_server_administrator_login(input).is_ok(),
                valid,
                "input: {:?}",
                input
            );
        }
        let longest = "a".repeat(63);
        assert!(flexible_server_administrator_login(&longest).is_ok());
        assert!(flexible_server_administrator_login(&format!("{}a", longest)).is_err());
    }

    #[test]
    fn password_complexity_cases() {
        let cases = [
            ("Pa55w0rd-Strong", true),
            ("lowercase123!", true),
            ("UPPER-lower", true),
            ("alllowercase", false),
            ("lowerUPPER", false),
            ("12345678!", false),
            ("Ab1!", false),
            ("P@ssw0rd", false),
            ("Password1", false),
        ];
        for (input, valid) in cases {
            assert_eq!(
                password_complexity(input, 8, 128).is_ok(),
                valid,
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn password_length_message() {
        let err = password_complexity("Ab1!", 8, 128).unwrap_err();
        assert_eq!(err, "password must be between 8 and 128 characters long, got 4 characters");
    }
}
