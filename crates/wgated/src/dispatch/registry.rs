//! Request-name routing table.
//!
//! The registry is populated during start-up and then shared read-only with
//! the dispatcher, so lookups need no locking.

use std::collections::HashMap;

use tracing::debug;

use super::DISPATCH_TARGET;
use super::job::JobFactory;
use super::privilege::Privilege;

/// A named field a handler expects in the request document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    name: String,
    required: bool,
}

impl ParamSpec {
    /// Field that must be present.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    /// Field that may be omitted.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the field must be present.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// How to serve one request name.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    request_name: String,
    required_privilege: Privilege,
    params: Vec<ParamSpec>,
    factory: JobFactory,
}

impl HandlerDescriptor {
    /// Describes a handler that requires `required_privilege`.
    pub fn new(
        request_name: impl Into<String>,
        required_privilege: Privilege,
        factory: JobFactory,
    ) -> Self {
        Self {
            request_name: request_name.into(),
            required_privilege,
            params: Vec::new(),
            factory,
        }
    }

    /// Declares a request field.
    #[must_use]
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Name the handler is registered under.
    #[must_use]
    pub fn request_name(&self) -> &str {
        &self.request_name
    }

    /// Privilege a caller must hold exactly.
    #[must_use]
    pub fn required_privilege(&self) -> Privilege {
        self.required_privilege
    }

    /// Declared request fields.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Names of declared fields that must be present.
    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|param| param.is_required())
            .map(ParamSpec::name)
    }

    /// Constructor for the handler's unit of work.
    #[must_use]
    pub fn factory(&self) -> &JobFactory {
        &self.factory
    }
}

/// Maps request names to handler descriptors.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: HashMap<String, HandlerDescriptor>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `descriptor`, replacing any handler with the same name.
    ///
    /// Returns the replaced descriptor.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Option<HandlerDescriptor> {
        let name = descriptor.request_name().to_owned();
        let privilege = descriptor.required_privilege();
        let previous = self.handlers.insert(name.clone(), descriptor);
        debug!(
            target: DISPATCH_TARGET,
            request = %name,
            privilege = %privilege,
            replaced = previous.is_some(),
            "handler registered"
        );
        previous
    }

    /// Shorthand for registering a handler without declared fields.
    pub fn register_job(
        &mut self,
        request_name: impl Into<String>,
        required_privilege: Privilege,
        factory: JobFactory,
    ) -> Option<HandlerDescriptor> {
        self.register(HandlerDescriptor::new(
            request_name,
            required_privilege,
            factory,
        ))
    }

    /// Looks up the handler for `request_name`.
    #[must_use]
    pub fn lookup(&self, request_name: &str) -> Option<&HandlerDescriptor> {
        self.handlers.get(request_name)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::dispatch::document::Document;
    use crate::dispatch::job::{Job, JobContext, JobError};

    struct Noop;

    #[async_trait]
    impl Job for Noop {
        async fn start(self: Box<Self>, _context: JobContext) -> Result<Document, JobError> {
            Ok(Document::new())
        }
    }

    fn noop() -> JobFactory {
        JobFactory::new(|| Noop)
    }

    #[rstest]
    #[case(Privilege::Session, Privilege::Admin)]
    #[case(Privilege::Admin, Privilege::None)]
    fn last_registration_wins(#[case] first: Privilege, #[case] second: Privilege) {
        let mut registry = Registry::new();
        assert!(registry.register_job("Ping", first, noop()).is_none());
        let replaced = registry
            .register_job("Ping", second, noop())
            .expect("first descriptor is replaced");

        assert_eq!(replaced.required_privilege(), first);
        let current = registry.lookup("Ping").expect("registered");
        assert_eq!(current.required_privilege(), second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_names_are_not_found() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.lookup("DoesNotExist").is_none());
    }

    #[test]
    fn required_params_skip_optional_fields() {
        let descriptor = HandlerDescriptor::new("Lookup", Privilege::Account, noop())
            .with_param(ParamSpec::required("id"))
            .with_param(ParamSpec::optional("verbose"))
            .with_param(ParamSpec::required("scope"));
        let required: Vec<_> = descriptor.required_params().collect();
        assert_eq!(required, ["id", "scope"]);
        assert_eq!(descriptor.params().len(), 3);
    }
}
