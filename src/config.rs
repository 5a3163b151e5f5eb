//! Start-up configuration from the environment.
//!
//! A bound Cloud Foundry service in `VCAP_SERVICES` wins over explicit
//! `TODO_BACKEND` settings; with neither, todos live in memory.

use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    application::retention::{DEFAULT_INTERVAL, DEFAULT_THRESHOLD, RetentionPolicy},
    infrastructure::{couch_store, mongo_store},
};

const COUCH_SERVICE: &str = "todo-couch-db";
const COUCH_LABEL: &str = "cloudantNoSQLDB";
const MONGO_SERVICE: &str = "todo-mongo-db";
const MONGO_LABEL: &str = "compose-for-mongodb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Couch { url: String, db: String },
    Mongo { url: String, db: String, collection: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: Backend,
    pub static_dir: PathBuf,
    pub retention: RetentionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port: u16 = match lookup("PORT").or_else(|| lookup("VCAP_APP_PORT")) {
            Some(raw) => parse("PORT", &raw)?,
            None => 3000,
        };
        let host = lookup("BIND_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid bind address {host}:{port}"))?;

        let backend = match lookup("VCAP_SERVICES") {
            Some(raw) => backend_from_vcap(&raw)?,
            None => None,
        };
        let backend = match backend {
            Some(backend) => backend,
            None => backend_from_vars(&lookup)?,
        };

        let interval = match lookup("RETENTION_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse("RETENTION_INTERVAL_SECS", &raw)?),
            None => DEFAULT_INTERVAL,
        };
        if interval.is_zero() {
            bail!("RETENTION_INTERVAL_SECS must be greater than zero");
        }
        let threshold = match lookup("RETENTION_THRESHOLD") {
            Some(raw) => parse("RETENTION_THRESHOLD", &raw)?,
            None => DEFAULT_THRESHOLD,
        };

        Ok(Self {
            addr,
            backend,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "www".into()).into(),
            retention: RetentionPolicy { interval, threshold },
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}"))
}

fn backend_from_vars(lookup: &impl Fn(&str) -> Option<String>) -> Result<Backend> {
    let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
    let choice = lookup("TODO_BACKEND").map(|v| v.trim().to_ascii_lowercase());
    match choice.as_deref() {
        Some("couch") | Some("couchdb") | Some("cloudant") => Ok(Backend::Couch {
            url: var("COUCH_URL", "http://127.0.0.1:5984/"),
            db: var("COUCH_DB", couch_store::DEFAULT_DB_NAME),
        }),
        Some("mongo") | Some("mongodb") => Ok(Backend::Mongo {
            url: var("MONGO_URL", "mongodb://localhost:27017/"),
            db: var("MONGO_DB", mongo_store::DEFAULT_DB_NAME),
            collection: var("MONGO_COLLECTION", mongo_store::DEFAULT_COLLECTION),
        }),
        Some("memory") | None => Ok(Backend::Memory),
        Some(other) => bail!("unknown TODO_BACKEND {other:?}, expected couch, mongo or memory"),
    }
}

#[derive(Debug, Deserialize)]
struct ServiceBinding {
    #[serde(default)]
    name: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    credentials: Value,
}

/// Picks the first bound todo database out of `VCAP_SERVICES`.
fn backend_from_vcap(raw: &str) -> Result<Option<Backend>> {
    let services: std::collections::BTreeMap<String, Vec<ServiceBinding>> =
        serde_json::from_str(raw).context("VCAP_SERVICES is not valid JSON")?;
    for (offering, bindings) in &services {
        for binding in bindings {
            let label = if binding.label.is_empty() { offering.as_str() } else { binding.label.as_str() };
            let credential = |key: &str| binding.credentials.get(key).and_then(Value::as_str).map(str::to_owned);
            if binding.name == COUCH_SERVICE || label == COUCH_LABEL {
                let url = credential("url").with_context(|| format!("service {} has no credentials.url", binding.name))?;
                return Ok(Some(Backend::Couch { url, db: couch_store::DEFAULT_DB_NAME.to_owned() }));
            }
            if binding.name == MONGO_SERVICE || label == MONGO_LABEL {
                let url = credential("url")
                    .or_else(|| credential("uri"))
                    .with_context(|| format!("service {} has no credentials.url", binding.name))?;
                return Ok(Some(Backend::Mongo {
                    url,
                    db: credential("db").unwrap_or_else(|| mongo_store::DEFAULT_DB_NAME.to_owned()),
                    collection: mongo_store::DEFAULT_COLLECTION.to_owned(),
                }));
            }
        }
    }
    Ok(None)
}
