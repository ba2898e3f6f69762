//! Configuration validation.
//!
//! Serde covers syntax; this covers values nginx or the loops would choke
//! on. All problems are reported together.

use std::net::SocketAddr;

use crate::config::schema::MirrorConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &MirrorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.watch.paths.is_empty() {
        errors.push(ValidationError::new("watch.paths", "at least one path is required"));
    }
    if config.watch.min_interval_ms == 0 {
        errors.push(ValidationError::new("watch.min_interval_ms", "must be greater than 0"));
    }
    if config.watch.max_delay_ms < config.watch.min_interval_ms {
        errors.push(ValidationError::new(
            "watch.max_delay_ms",
            "must not be smaller than watch.min_interval_ms",
        ));
    }

    if !is_nginx_size(&config.cache.max_size) {
        errors.push(ValidationError::new(
            "cache.max_size",
            format!("{:?} is not a size such as 10g or 100m", config.cache.max_size),
        ));
    }
    if !is_nginx_time(&config.cache.inactive) {
        errors.push(ValidationError::new(
            "cache.inactive",
            format!("{:?} is not a duration such as 15m or 1h", config.cache.inactive),
        ));
    }

    if config.frontends.is_empty() {
        errors.push(ValidationError::new("frontends", "at least one frontend is required"));
    }
    for (i, frontend) in config.frontends.iter().enumerate() {
        if frontend.listen.trim().is_empty() {
            errors.push(ValidationError::new(format!("frontends[{}].listen", i), "must not be empty"));
        }
        if frontend.certificate_path.is_some() != frontend.key_path.is_some() {
            errors.push(ValidationError::new(
                format!("frontends[{}]", i),
                "certificate_path and key_path must be set together",
            ));
        }
    }

    if config.monitor.interval_secs == 0 {
        errors.push(ValidationError::new("monitor.interval_secs", "must be greater than 0"));
    }
    if config.monitor.timeout_secs == 0 {
        errors.push(ValidationError::new("monitor.timeout_secs", "must be greater than 0"));
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!("{:?} is not a socket address", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// nginx size syntax: digits with an optional k/m/g suffix.
fn is_nginx_size(value: &str) -> bool {
    let digits = value.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    value.len() - digits.len() <= 1 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// nginx time syntax: one or more `<digits><unit>` groups, e.g. `1h30m`.
fn is_nginx_time(value: &str) -> bool {
    const UNITS: [&str; 8] = ["ms", "s", "m", "h", "d", "w", "M", "y"];

    let mut rest = value;
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
        match UNITS.iter().find(|unit| rest.starts_with(**unit)) {
            Some(unit) => rest = &rest[unit.len()..],
            // A bare number means seconds and must be the last group.
            None => return rest.is_empty(),
        }
    }
    true
}
