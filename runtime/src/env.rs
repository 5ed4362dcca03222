//! Environment parsing helpers shared by the API and runtime configuration.

pub fn parse_env_bool_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}

pub fn parse_env_u64_with_bounds(raw: Option<String>, min: u64, max: u64, default: u64) -> u64 {
    match raw.and_then(|value| value.trim().parse::<u64>().ok()) {
        Some(parsed) => parsed.clamp(min, max),
        None => default,
    }
}

pub fn parse_env_u32_with_bounds(raw: Option<String>, min: u32, max: u32, default: u32) -> u32 {
    match raw.and_then(|value| value.trim().parse::<u32>().ok()) {
        Some(parsed) => parsed.clamp(min, max),
        None => default,
    }
}

/// Comma-separated list. An unset variable yields `default`; a set but empty
/// variable yields an empty list.
pub fn parse_env_list(raw: Option<String>, default: &[&str]) -> Vec<String> {
    match raw {
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        None => default.iter().map(|item| item.to_string()).collect(),
    }
}

pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
