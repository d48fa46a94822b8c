//! Configuration for tablekv
//!
//! Centralized client configuration with sensible defaults.

use crate::error::{Result, TableError};

/// Main configuration for a tablekv client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address (host:port)
    pub server_addr: String,

    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read timeout (milliseconds, 0 = none)
    ///
    /// A timed-out read leaves the stream desynchronized, so the client
    /// closes itself.
    pub read_timeout_ms: u64,

    /// Write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest page size the server accepts for scans
    pub max_scan_num: u16,

    // -------------------------------------------------------------------------
    // Buffer Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of pooled packet buffers (bytes)
    pub buffer_capacity: usize,

    /// Idle buffers kept by the pool
    pub buffer_pool_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6688".to_string(),
            connect_timeout_ms: 3000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            max_scan_num: 10_000,
            buffer_capacity: 4096,
            buffer_pool_size: 8,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check settings that would make every request fail
    pub fn validate(&self) -> Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(TableError::Config("server address is empty".to_string()));
        }
        if self.max_scan_num == 0 {
            return Err(TableError::Config(
                "max_scan_num must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the largest accepted scan page size
    pub fn max_scan_num(mut self, num: u16) -> Self {
        self.config.max_scan_num = num;
        self
    }

    /// Set the initial pooled buffer capacity (in bytes)
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.config.buffer_capacity = bytes;
        self
    }

    /// Set the number of idle buffers kept
    pub fn buffer_pool_size(mut self, count: usize) -> Self {
        self.config.buffer_pool_size = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
