//! Service primitives: task sizing, ports, listeners, utilization targets

use serde::{Deserialize, Serialize};

/// SSL policy applied to the HTTPS listener (the provider's current
/// recommended policy)
pub const SSL_POLICY_RECOMMENDED: &str = "ELBSecurityPolicy-TLS13-1-2-2021-06";

/// Valid Fargate cpu/memory combinations: cpu units -> (min, max) MiB
const TASK_SIZES: &[(u32, u32, u32)] = &[
    (256, 512, 2048),
    (512, 1024, 4096),
    (1024, 2048, 8192),
    (2048, 4096, 16384),
    (4096, 8192, 30720),
];

/// Cpu/memory allocation of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSize {
    /// Cpu units (1024 = one vCPU)
    pub cpu: u32,
    pub memory_mib: u32,
}

impl TaskSize {
    pub fn new(cpu: u32, memory_mib: u32) -> Self {
        Self { cpu, memory_mib }
    }

    pub fn validate(&self) -> Result<(), String> {
        let Some((_, min, max)) = TASK_SIZES.iter().find(|(cpu, _, _)| *cpu == self.cpu) else {
            let valid: Vec<String> = TASK_SIZES.iter().map(|(c, _, _)| c.to_string()).collect();
            return Err(format!(
                "cpu must be one of {}, got {}",
                valid.join(", "),
                self.cpu
            ));
        };
        if self.memory_mib < *min || self.memory_mib > *max {
            return Err(format!(
                "memory for {} cpu units must be between {} and {} MiB, got {}",
                self.cpu, min, max, self.memory_mib
            ));
        }
        Ok(())
    }
}

/// Application-layer protocol of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicationProtocol {
    Http,
    Https,
}

impl ApplicationProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationProtocol::Http => "HTTP",
            ApplicationProtocol::Https => "HTTPS",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ApplicationProtocol::Http => 80,
            ApplicationProtocol::Https => 443,
        }
    }
}

/// Validate a container/listener port
pub fn validate_port(port: u16) -> Result<(), String> {
    if port == 0 {
        Err("port must be between 1 and 65535".to_string())
    } else {
        Ok(())
    }
}

/// Validate a utilization target percentage; valid range is (0, 100]
pub fn validate_utilization(pct: u32) -> Result<(), String> {
    if pct == 0 || pct > 100 {
        Err(format!(
            "utilization target must be in (0, 100], got {pct}"
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_task_size_is_valid() {
        assert!(TaskSize::new(256, 512).validate().is_ok());
        assert!(TaskSize::new(1024, 4096).validate().is_ok());
    }

    #[test]
    fn unknown_cpu_rejected() {
        let err = TaskSize::new(300, 512).validate().unwrap_err();
        assert!(err.contains("cpu must be one of"));
    }

    #[test]
    fn memory_outside_cpu_range_rejected() {
        let err = TaskSize::new(256, 4096).validate().unwrap_err();
        assert!(err.contains("between 512 and 2048"));
    }

    #[test]
    fn utilization_bounds() {
        assert!(validate_utilization(1).is_ok());
        assert!(validate_utilization(80).is_ok());
        assert!(validate_utilization(100).is_ok());
        assert!(validate_utilization(0).is_err());
        assert!(validate_utilization(101).is_err());
    }

    #[test]
    fn port_zero_rejected() {
        assert!(validate_port(0).is_err());
        assert!(validate_port(5000).is_ok());
    }
}
