// src/scheduler/error.rs
use serde::Serialize;
use thiserror::Error;

use crate::analyze::AiError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("alarm registration failed")]
    Alarm(#[source] anyhow::Error),
}

/// Loggable snapshot of a cycle failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDescriptor {
    /// Typed error kind when known, else "Error".
    pub name: String,
    pub message: String,
    /// Source chain, outermost first.
    pub chain: Vec<String>,
    /// Debug rendering of the whole error.
    pub raw: String,
}

impl ErrorDescriptor {
    pub fn from_anyhow(e: &anyhow::Error) -> Self {
        let name = e
            .chain()
            .find_map(|c| {
                c.downcast_ref::<AiError>()
                    .map(AiError::kind)
                    .or_else(|| c.downcast_ref::<StoreError>().map(StoreError::kind))
            })
            .unwrap_or("Error")
            .to_string();
        Self {
            name,
            message: e.to_string(),
            chain: e.chain().map(|c| c.to_string()).collect(),
            raw: format!("{e:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn descriptor_names_typed_errors_through_context() {
        let e: anyhow::Result<()> = Err(AiError::Status(503)).context("analyzing article a1");
        let d = ErrorDescriptor::from_anyhow(&e.unwrap_err());
        assert_eq!(d.name, "AiError::Status");
        assert_eq!(d.message, "analyzing article a1");
        assert_eq!(d.chain.len(), 2);
        assert_eq!(d.chain[1], "provider returned HTTP 503");
        assert!(d.raw.contains("analyzing article a1"));
    }

    #[test]
    fn untyped_errors_get_generic_name() {
        let d = ErrorDescriptor::from_anyhow(&anyhow::anyhow!("boom"));
        assert_eq!(d.name, "Error");
        assert_eq!(d.chain, vec!["boom".to_string()]);
    }
}
