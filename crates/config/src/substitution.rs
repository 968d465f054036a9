use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

const PLACEHOLDER: &str = r"\$\{(\w+)(?::-([^}]*))?\}";

/// Substitute environment variables written as `${VAR}` or `${VAR:-default}`.
///
/// A variable that is unset and has no default keeps its placeholder so that
/// YAML parsing or validation reports it.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(PLACEHOLDER)?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {} = \"{}\"", var_name, value);
                value
            }
            Err(_) => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    warn!("Environment variable '{}' not set", var_name);
                    missing_vars.push(var_name.to_string());
                    caps[0].to_string()
                }
            },
        }
    });

    if !missing_vars.is_empty() {
        debug!("Unresolved environment variables: {:?}", missing_vars);
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(PLACEHOLDER)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variable() {
        env::set_var("LOTBASE_TEST_PORT", "9100");
        let out = substitute_env_vars("port: ${LOTBASE_TEST_PORT}").unwrap();
        assert_eq!(out, "port: 9100");
    }

    #[test]
    fn test_default_used_when_unset() {
        env::remove_var("LOTBASE_TEST_UNSET_HOST");
        let out = substitute_env_vars("host: ${LOTBASE_TEST_UNSET_HOST:-0.0.0.0}").unwrap();
        assert_eq!(out, "host: 0.0.0.0");
    }

    #[test]
    fn test_missing_variable_kept() {
        env::remove_var("LOTBASE_TEST_MISSING");
        let out = substitute_env_vars("dir: ${LOTBASE_TEST_MISSING}").unwrap();
        assert_eq!(out, "dir: ${LOTBASE_TEST_MISSING}");
        assert!(has_unresolved_env_vars(&out));
        assert!(!has_unresolved_env_vars("dir: /tmp"));
    }
}
