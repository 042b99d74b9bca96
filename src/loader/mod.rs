//! Dynamic loading and heuristic instantiation (§4.3).
//!
//! The ordered-strategy selection logic here is pure and synchronous; it
//! never touches a child process itself. It drives a [`Bridge`], the seam
//! that actually runs the strategy against live user code — kept separate
//! so the strategy order is unit-testable against an in-memory fake
//! without a real interpreter anywhere nearby.

use std::path::Path;

use serde_json::Value;
use worker_discovery::ClassRecord;

/// Environment variables tried, in order, for a URL-like constructor
/// parameter whose own upper-cased name did not resolve.
const URL_ENV_FALLBACKS: &[&str] = &["BASE_URL", "DEV_DOCS_BASE_URL", "API_URL", "SITE_URL"];

/// A constructor parameter name paired with the value strategy 2 resolved
/// for it from the environment (`None` for unresolved/logger-like names,
/// which are passed as a JSON null).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKwarg {
    pub name: String,
    pub value: Option<String>,
}

/// Resolve strategy 2's keyword-argument map from a constructor's
/// parameter names. Pure aside from reading process environment variables,
/// so it is unit-testable with `std::env::set_var`.
pub fn resolve_env_kwargs(param_names: &[String]) -> Vec<ResolvedKwarg> {
    param_names
        .iter()
        .map(|name| {
            let upper = name.to_uppercase();
            if let Ok(value) = std::env::var(&upper) {
                return ResolvedKwarg {
                    name: name.clone(),
                    value: Some(value),
                };
            }
            if name.contains("url") {
                for candidate in URL_ENV_FALLBACKS {
                    if let Ok(value) = std::env::var(candidate) {
                        return ResolvedKwarg {
                            name: name.clone(),
                            value: Some(value),
                        };
                    }
                }
            }
            ResolvedKwarg {
                name: name.clone(),
                value: None,
            }
        })
        .collect()
}

/// The outcome of a single instantiation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstantiateOutcome {
    Success,
    Failure(String),
}

impl InstantiateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Which side of a bound pair the bridge should currently be acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeTarget {
    Adapter,
    DataClient,
}

/// An exception raised by user code inside the bridge (fetch or
/// transform), as opposed to a transport-level failure talking to the
/// bridge process itself. Carried verbatim into `transform_error`
/// notification payloads — never surfaced as an RPC error (§7).
#[derive(Debug, Clone)]
pub struct UserCodeError {
    pub error_type: String,
    pub message: String,
    pub traceback: String,
}

/// Either a transport-level failure (bridge process unreachable, timed
/// out, gave malformed output) or an exception raised by the user code it
/// ran.
#[derive(Debug)]
pub enum BridgeError {
    Transport(std::io::Error),
    UserCode(UserCodeError),
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e)
    }
}

/// Seam between instantiation-strategy selection and actually running a
/// strategy against live user code (over a child `python3` process in
/// production, an in-memory fake in tests).
pub trait Bridge {
    /// Load `class_record`'s module into the bridge process and select it
    /// as the current target (adapter or data-client). `project_root` is
    /// prepended (and `project_root/src`) to the bridge's `sys.path` so
    /// user modules can import project-local siblings.
    fn load(&mut self, class_record: &ClassRecord, target: BridgeTarget, project_root: &Path) -> std::io::Result<()>;

    /// The current target's constructor parameter names (receiver
    /// excluded), used to drive strategy 2.
    fn constructor_params(&mut self) -> std::io::Result<Vec<String>>;

    /// Strategy 1: call the class with no arguments.
    fn try_noargs(&mut self) -> std::io::Result<InstantiateOutcome>;

    /// Strategy 2: call the class with the given resolved keyword map.
    fn try_kwargs(&mut self, kwargs: &[ResolvedKwarg]) -> std::io::Result<InstantiateOutcome>;

    /// Strategy 3: call the class with every parameter bound to `None`.
    fn try_all_none(&mut self, param_names: &[String]) -> std::io::Result<InstantiateOutcome>;

    /// Call the current data-client instance's data-producing operation.
    fn call_data_client(&mut self) -> Result<Vec<Value>, BridgeError>;

    /// Call the current adapter instance's transform operation with
    /// exactly one record (`transform([record])`), returning its single
    /// output element.
    fn call_transform(&mut self, record: &Value) -> Result<Value, BridgeError>;

    /// Read the adapter class's `configuration.name` class attribute, if
    /// present (used as the `name` argument to the `(name, data_client)`
    /// transform-instantiation strategy).
    fn adapter_configuration_name(&mut self) -> std::io::Result<Option<String>>;

    /// Transform strategy 2: construct the adapter with
    /// `(name, data_client)`, where the data-client instance is whichever
    /// one a prior `load` + instantiate call against `BridgeTarget::DataClient`
    /// left in place.
    fn try_adapter_with_data_client(&mut self, name: &str) -> Result<InstantiateOutcome, BridgeError>;

    /// Transform strategy 3: construct the adapter with `(name, mock)`,
    /// where `mock` is a data-client stand-in that yields an empty stream.
    fn try_adapter_with_mock_client(&mut self, name: &str) -> Result<InstantiateOutcome, BridgeError>;
}

/// Run the three ordered instantiation strategies against `bridge`'s
/// currently loaded target, returning `true` as soon as one succeeds.
/// Every failed strategy is logged at debug level; none is fatal.
pub fn instantiate(bridge: &mut dyn Bridge) -> std::io::Result<bool> {
    if bridge.try_noargs()?.is_success() {
        return Ok(true);
    } else {
        log::debug!("strategy 1 (no-args) failed, trying env-var kwargs");
    }

    let params = bridge.constructor_params()?;
    if !params.is_empty() {
        let kwargs = resolve_env_kwargs(&params);
        if bridge.try_kwargs(&kwargs)?.is_success() {
            return Ok(true);
        }
        log::debug!("strategy 2 (env kwargs) failed, trying all-None");
    }

    if bridge.try_all_none(&params)?.is_success() {
        return Ok(true);
    }

    log::debug!("all instantiation strategies exhausted");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn upper_cased_name_takes_priority_over_url_fallbacks() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("API_KEY", "secret");
        std::env::remove_var("BASE_URL");
        let resolved = resolve_env_kwargs(&["api_key".to_string()]);
        assert_eq!(resolved[0].value.as_deref(), Some("secret"));
        std::env::remove_var("API_KEY");
    }

    #[test]
    fn url_like_name_falls_back_through_candidates_in_order() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("BASE_URL");
        std::env::set_var("API_URL", "https://api.example.com");
        let resolved = resolve_env_kwargs(&["site_url".to_string()]);
        assert_eq!(resolved[0].value.as_deref(), Some("https://api.example.com"));
        std::env::remove_var("API_URL");
    }

    #[test]
    fn unresolvable_name_yields_none() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("LOGGER");
        std::env::remove_var("BASE_URL");
        std::env::remove_var("DEV_DOCS_BASE_URL");
        std::env::remove_var("API_URL");
        std::env::remove_var("SITE_URL");
        let resolved = resolve_env_kwargs(&["logger".to_string()]);
        assert_eq!(resolved[0].value, None);
    }

    struct FakeBridge {
        calls: Vec<&'static str>,
        succeed_at: &'static str,
        params: Vec<String>,
    }

    impl Bridge for FakeBridge {
        fn load(&mut self, _: &ClassRecord, _: BridgeTarget, _: &Path) -> std::io::Result<()> {
            Ok(())
        }

        fn constructor_params(&mut self) -> std::io::Result<Vec<String>> {
            Ok(self.params.clone())
        }

        fn try_noargs(&mut self) -> std::io::Result<InstantiateOutcome> {
            self.calls.push("noargs");
            Ok(outcome_for(self.succeed_at, "noargs"))
        }

        fn try_kwargs(&mut self, _: &[ResolvedKwarg]) -> std::io::Result<InstantiateOutcome> {
            self.calls.push("kwargs");
            Ok(outcome_for(self.succeed_at, "kwargs"))
        }

        fn try_all_none(&mut self, _: &[String]) -> std::io::Result<InstantiateOutcome> {
            self.calls.push("all_none");
            Ok(outcome_for(self.succeed_at, "all_none"))
        }

        fn call_data_client(&mut self) -> Result<Vec<Value>, BridgeError> {
            Ok(Vec::new())
        }

        fn call_transform(&mut self, record: &Value) -> Result<Value, BridgeError> {
            Ok(record.clone())
        }

        fn adapter_configuration_name(&mut self) -> std::io::Result<Option<String>> {
            Ok(None)
        }

        fn try_adapter_with_data_client(&mut self, _name: &str) -> Result<InstantiateOutcome, BridgeError> {
            Ok(InstantiateOutcome::Success)
        }

        fn try_adapter_with_mock_client(&mut self, _name: &str) -> Result<InstantiateOutcome, BridgeError> {
            Ok(InstantiateOutcome::Success)
        }
    }

    fn outcome_for(succeed_at: &str, strategy: &str) -> InstantiateOutcome {
        if succeed_at == strategy {
            InstantiateOutcome::Success
        } else {
            InstantiateOutcome::Failure("nope".to_string())
        }
    }

    #[test]
    fn strategies_are_tried_in_order_and_stop_at_first_success() {
        let mut bridge = FakeBridge {
            calls: Vec::new(),
            succeed_at: "kwargs",
            params: vec!["api_key".to_string()],
        };
        let ok = instantiate(&mut bridge).unwrap();
        assert!(ok);
        assert_eq!(bridge.calls, vec!["noargs", "kwargs"]);
    }

    #[test]
    fn all_strategies_failing_reports_no_instance() {
        let mut bridge = FakeBridge {
            calls: Vec::new(),
            succeed_at: "never",
            params: Vec::new(),
        };
        let ok = instantiate(&mut bridge).unwrap();
        assert!(!ok);
        assert_eq!(bridge.calls, vec!["noargs", "all_none"]);
    }
}
