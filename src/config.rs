use std::env;

const TOKEN_VAR: &str = "DISCORD_TOKEN";
const PREFIX_VAR: &str = "BOT_PREFIX";
const DEFAULT_PREFIX: &str = "!";

pub struct Config {
    pub discord_token: String,
    pub prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup(TOKEN_VAR)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| format!("Expected {TOKEN_VAR} in the environment"))?;

        let prefix = lookup(PREFIX_VAR)
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        Ok(Self { discord_token, prefix })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_token_is_an_error() {
        let error = Config::from_lookup(lookup_in(&[])).err().unwrap();

        assert!(error.contains("DISCORD_TOKEN"));
    }

    #[test]
    fn blank_token_is_an_error() {
        assert!(Config::from_lookup(lookup_in(&[("DISCORD_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn prefix_defaults_to_bang() {
        let config = Config::from_lookup(lookup_in(&[("DISCORD_TOKEN", "abc")])).unwrap();

        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.prefix, "!");
    }

    #[test]
    fn prefix_is_read_from_environment() {
        let config = Config::from_lookup(lookup_in(&[("DISCORD_TOKEN", "abc"), ("BOT_PREFIX", " ? ")])).unwrap();

        assert_eq!(config.prefix, "?");
    }
}
