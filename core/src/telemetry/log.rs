use log::{debug, error, info, warn};

/// Thin wrapper over the `log` facade that tags every record with the
/// component that produced it.
#[derive(Debug, Clone)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.component, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.component, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.component, message);
    }

    pub fn error(&self, message: &str) {
        error!("[{}] {}", self.component, message);
    }

    /// Lowercase hex rendering used when dumping raw stream bytes.
    pub fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("mmw")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_renders_two_digits_per_byte() {
        assert_eq!(LogManager::hex(&[0x02, 0x01, 0xff]), "0201ff");
        assert_eq!(LogManager::hex(&[]), "");
    }
}
