// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Invalid or missing configuration, detected before any request is issued.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("cannot read configuration file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Failure of a single call towards the check-in site.
#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("notification rejected: {0}")]
    Rejected(String),
}

pub type CheckinResult<T> = Result<T, CheckinError>;
