//! Prepared-query construction and execution.
//!
//! A [`PreparedQuery`] wraps a configured `regorus` engine for a single
//! policy: module loaded under the policy filename, strict builtin errors,
//! static data installed as the data document, and the extension functions
//! bound to the request's headers. The query string is
//! `data.<group>.<name>`, which is why the policy source's package
//! declaration must equal `<group>.<name>`.

use regorus::Engine;

use verdict_core::{Error, HeaderContext, Kind, Policy};

use crate::extensions::ExtensionRegistry;

/// Filename under which a policy source is compiled when no hint is stored.
pub const DEFAULT_POLICY_FILENAME: &str = "policy.rego";

/// A policy compiled into an executable engine, ready to run against input.
#[derive(Debug)]
pub struct PreparedQuery {
    engine: Engine,
    query: String,
}

impl PreparedQuery {
    /// Compiles a policy into an executable query.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the source does not compile, the static data
    /// is not valid JSON, or an extension function cannot be registered.
    pub fn prepare(
        policy: &Policy,
        extensions: &ExtensionRegistry,
        headers: &HeaderContext,
    ) -> Result<Self, Error> {
        let mut engine = Engine::new();
        // Policies are written in the classic Rego dialect, where rule
        // bodies do not require the `if` keyword.
        engine.set_rego_v0(true);
        engine.set_strict_builtin_errors(true);

        extensions.install(&mut engine, headers)?;

        let filename = if policy.filename.is_empty() {
            DEFAULT_POLICY_FILENAME
        } else {
            &policy.filename
        };
        engine
            .add_policy(filename.to_string(), policy.rego.clone())
            .map_err(|e| Error::wrap_with(Kind::Internal, "error preparing rego query", e))?;

        if let Some(data) = policy.data.as_deref().filter(|d| !d.is_empty()) {
            let value = regorus::Value::from_json_str(data)
                .map_err(|e| Error::wrap_with(Kind::Internal, "error parsing policy data", e))?;
            engine
                .add_data(value)
                .map_err(|e| Error::wrap_with(Kind::Internal, "error adding policy data", e))?;
        }

        Ok(Self {
            engine,
            query: format!("data.{}.{}", policy.group, policy.name),
        })
    }

    /// The query string this policy is executed with.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Executes the query against the given input document.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when evaluation fails or produces an empty result
    /// set or an empty expression list.
    pub fn evaluate(&mut self, input: &serde_json::Value) -> Result<serde_json::Value, Error> {
        let input_value = regorus::Value::from_json_str(&input.to_string())
            .map_err(|e| Error::wrap_with(Kind::Internal, "error converting input", e))?;
        self.engine.set_input(input_value);

        let results = self
            .engine
            .eval_query(self.query.clone(), false)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error evaluating rego query", e))?;

        let first = results
            .result
            .first()
            .ok_or_else(|| Error::internal("policy evaluation results are empty"))?;
        let expression = first
            .expressions
            .first()
            .ok_or_else(|| Error::internal("policy evaluation result expressions are empty"))?;

        let json = expression
            .value
            .to_json_str()
            .map_err(|e| Error::wrap_with(Kind::Internal, "error encoding result to json", e))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::wrap_with(Kind::Internal, "error encoding result to json", e))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;

    fn policy(rego: &str, data: Option<&str>) -> Policy {
        Policy {
            repository: "policies".into(),
            group: "gaiax".into(),
            name: "example".into(),
            version: "1.0".into(),
            rego: rego.into(),
            filename: String::new(),
            data: data.map(String::from),
            data_config: None,
            output_schema: None,
            export_config: None,
            locked: false,
            last_update: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_evaluate_simple_policy() {
        let p = policy(
            r#"package gaiax.example

default allow = false

allow {
    input.msg == "yes"
}
"#,
            None,
        );
        let registry = ExtensionRegistry::new();
        let headers = HeaderContext::new();

        let mut query = PreparedQuery::prepare(&p, &registry, &headers).unwrap();
        assert_eq!(query.query(), "data.gaiax.example");

        let result = query.evaluate(&json!({"msg": "yes"})).unwrap();
        assert_eq!(result, json!({"allow": true}));

        let result = query.evaluate(&json!({"msg": "no"})).unwrap();
        assert_eq!(result, json!({"allow": false}));
    }

    #[test]
    fn test_evaluate_with_static_data() {
        let p = policy(
            r#"package gaiax.example

allow {
    data.allowed[_] == input.user
}
"#,
            Some(r#"{"allowed": ["alice", "bob"]}"#),
        );
        let registry = ExtensionRegistry::new();
        let headers = HeaderContext::new();

        let mut query = PreparedQuery::prepare(&p, &registry, &headers).unwrap();

        let result = query.evaluate(&json!({"user": "alice"})).unwrap();
        assert_eq!(result, json!({"allow": true}));
    }

    #[test]
    fn test_evaluate_reads_request_header() {
        let p = policy(
            r#"package gaiax.example

token := external.http.header("Authorization")
"#,
            None,
        );
        let registry = ExtensionRegistry::new();
        let headers = HeaderContext::from_pairs([("Authorization", "my-token")]);

        let mut query = PreparedQuery::prepare(&p, &registry, &headers).unwrap();

        let result = query.evaluate(&json!({})).unwrap();
        assert_eq!(result, json!({"token": "my-token"}));
    }

    #[test]
    fn test_invalid_source_fails_preparation() {
        let p = policy("package gaiax.example\n\nallow {", None);
        let registry = ExtensionRegistry::new();

        let err = PreparedQuery::prepare(&p, &registry, &HeaderContext::new()).unwrap_err();
        assert!(err.to_string().contains("error preparing rego query"));
    }

    #[test]
    fn test_invalid_data_fails_preparation() {
        let p = policy("package gaiax.example\n\nallow = true", Some("not-json"));
        let registry = ExtensionRegistry::new();

        let err = PreparedQuery::prepare(&p, &registry, &HeaderContext::new()).unwrap_err();
        assert!(err.to_string().contains("error parsing policy data"));
    }
}
