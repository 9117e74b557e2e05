/// Configures request timeout and cold-start retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Hard per-attempt timeout in milliseconds, covering send and body read.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before each retry in milliseconds. Retries past the end of the
    /// schedule reuse its last entry.
    pub retry_delays_ms: Vec<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 2,
            retry_delays_ms: vec![1_000, 3_000],
        }
    }
}

impl ClientOptions {
    /// Reads overrides from `CONSOLE_API_TIMEOUT_MS` and
    /// `CONSOLE_API_MAX_RETRIES`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();
        if let Some(timeout_ms) = read_env_number::<u64>("CONSOLE_API_TIMEOUT_MS")? {
            options.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = read_env_number::<usize>("CONSOLE_API_MAX_RETRIES")? {
            options.max_retries = max_retries;
        }
        Ok(options)
    }
}

fn read_env_number<N: std::str::FromStr>(name: &str) -> Result<Option<N>, String> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|_| format!("{name} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::ClientOptions;

    #[test]
    fn defaults_bound_attempts_to_three() {
        let options = ClientOptions::default();
        assert_eq!(options.max_retries, 2);
        assert_eq!(options.retry_delays_ms, vec![1_000, 3_000]);
        assert_eq!(options.timeout_ms, 15_000);
    }
}
