use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::upload::{UploadLimits, DEFAULT_MAX_UPLOAD_BYTES};

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub seed: bool,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Reads the server configuration from the environment, loading `.env`
    /// first when one exists.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr_raw = lookup("BILL_MANAGER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse::<SocketAddr>().map_err(|_| {
            AppError::Validation(format!("BILL_MANAGER_ADDR '{}' is not a socket address", addr_raw))
        })?;

        let data_dir = lookup("BILL_MANAGER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let seed = match lookup("BILL_MANAGER_SEED") {
            None => false,
            Some(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(AppError::Validation(format!(
                        "BILL_MANAGER_SEED must be true or false, got '{}'",
                        other
                    )))
                }
            },
        };

        let max_upload_bytes = match lookup("BILL_MANAGER_MAX_UPLOAD_BYTES") {
            None => DEFAULT_MAX_UPLOAD_BYTES,
            Some(value) => value.trim().parse::<usize>().ok().filter(|v| *v > 0).ok_or_else(|| {
                AppError::Validation(format!(
                    "BILL_MANAGER_MAX_UPLOAD_BYTES must be a positive integer, got '{}'",
                    value
                ))
            })?,
        };

        Ok(Self {
            addr,
            data_dir,
            seed,
            max_upload_bytes,
        })
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
        }
    }
}
