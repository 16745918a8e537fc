//! Environment variable expansion for configuration strings.

use std::env;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the config key for error messages. A reference to an unset
/// variable without a default is an error.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains('$') {
        return Ok(value.to_owned());
    }

    let mut unset = Vec::new();
    let expanded = shellexpand::env_with_context(value, |name: &str| match env::var(name) {
        Ok(v) => Ok(Some(v)),
        Err(env::VarError::NotPresent) => {
            unset.push(name.to_owned());
            Ok(None)
        }
        Err(env::VarError::NotUnicode(_)) => Err(format!("${{{name}}} is not valid UTF-8")),
    })
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: e.cause,
    })?;

    // Unset variables with a default were already replaced; the rest stay verbatim.
    if let Some(name) = unset
        .iter()
        .find(|name| expanded.contains(&format!("${{{name}}}")))
    {
        return Err(ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{name}}} not set"),
        });
    }

    Ok(expanded.into_owned())
}
