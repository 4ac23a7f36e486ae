//! Three-way selector dispatch.
//!
//! The dispatcher only answers whether a native behavior exists and what it
//! returned. Escalating an unhandled selector to the external interpreter is
//! the caller's decision.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use trash_instance_store::Instance;

use crate::registry::{HandlerContext, HandlerRegistry};
use crate::HandlerError;

#[derive(Debug)]
pub enum Dispatch {
    /// A behavior ran and produced a result.
    Handled(String),
    /// A behavior ran and failed.
    Failed(HandlerError),
    /// No behavior is registered for the selector.
    NotHandled,
}

impl Dispatch {
    pub fn is_handled(&self) -> bool {
        !matches!(self, Dispatch::NotHandled)
    }

    /// `None` when nothing handled the selector.
    pub fn into_result(self) -> Option<Result<String, HandlerError>> {
        match self {
            Dispatch::Handled(result) => Some(Ok(result)),
            Dispatch::Failed(error) => Some(Err(error)),
            Dispatch::NotHandled => None,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Send `selector` to `instance`, resolving against the instance's class.
    pub fn dispatch(&self, selector: &str, instance: &mut Instance, args: &[JsonValue]) -> Dispatch {
        let class = instance.class().to_string();
        self.dispatch_as(&class, selector, instance, args)
    }

    /// Send `selector` to `instance`, resolving against `class`.
    pub fn dispatch_as(
        &self,
        class: &str,
        selector: &str,
        instance: &mut Instance,
        args: &[JsonValue],
    ) -> Dispatch {
        let Some(behavior) = self.registry.lookup(class, selector) else {
            log::trace!("No native handler for {}>>{}", class, selector);
            return Dispatch::NotHandled;
        };

        let context = HandlerContext::new(class, selector, instance.id());
        match behavior(&context, instance, args) {
            Ok(result) => Dispatch::Handled(result),
            Err(error) => {
                log::debug!("{}>>{} failed on {}: {}", class, selector, context.id, error);
                Dispatch::Failed(error)
            }
        }
    }
}
