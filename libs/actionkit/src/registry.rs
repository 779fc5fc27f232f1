//! Startup-time handler registry.
//!
//! Handler types are registered under a `/`-separated name, either explicitly
//! through [`RegistryBuilder::register_controller`] or from anywhere in the
//! binary with [`register_controller!`](crate::register_controller), which
//! submits a [`Registrator`] picked up by [`HandlerRegistry::discover_and_build`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::action::normalize_name;
use crate::contracts::{Controller, ErasedController};

type Factory = fn() -> anyhow::Result<Box<dyn ErasedController>>;

fn construct_boxed<T: Controller>() -> anyhow::Result<Box<dyn ErasedController>> {
    Ok(Box::new(T::construct()?))
}

/// One registered handler type.
pub struct HandlerEntry {
    name: String,
    actions: &'static [&'static str],
    type_name: &'static str,
    factory: Factory,
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl HandlerEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &'static [&'static str] {
        self.actions
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.contains(&action)
    }

    pub(crate) fn instantiate(&self) -> anyhow::Result<Box<dyn ErasedController>> {
        (self.factory)()
    }
}

/// The function type submitted by `register_controller!` via `inventory::submit!`.
pub struct Registrator(pub fn(&mut RegistryBuilder));

inventory::collect!(Registrator);

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid handler registry configuration:\n{errors:#?}")]
    InvalidRegistryConfiguration { errors: Vec<String> },
}

/// Collects registrations; problems are reported together by [`build`](Self::build).
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, HandlerEntry>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    pub fn register_controller<T: Controller>(&mut self, name: &str) -> &mut Self {
        let key = normalize_name(name);
        let type_name = std::any::type_name::<T>();

        if key.is_empty() {
            self.errors
                .push(format!("Handler {type_name} registered with an empty name"));
            return self;
        }
        if let Some(existing) = self.entries.get(&key) {
            self.errors.push(format!(
                "Handler '{key}' is already registered (by {}, now {type_name})",
                existing.type_name
            ));
            return self;
        }
        if T::ACTIONS.is_empty() {
            self.errors
                .push(format!("Handler '{key}' ({type_name}) declares no actions"));
            return self;
        }
        for (i, action) in T::ACTIONS.iter().enumerate() {
            if action.is_empty() || action.contains(crate::action::ACTION_SEPARATOR) {
                self.errors
                    .push(format!("Handler '{key}' declares an invalid action name '{action}'"));
            } else if T::ACTIONS[..i].contains(action) {
                self.errors
                    .push(format!("Handler '{key}' declares action '{action}' twice"));
            }
        }

        self.entries.insert(
            key.clone(),
            HandlerEntry {
                name: key,
                actions: T::ACTIONS,
                type_name,
                factory: construct_boxed::<T>,
            },
        );
        self
    }

    pub fn build(self) -> Result<HandlerRegistry, RegistryError> {
        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidRegistryConfiguration {
                errors: self.errors,
            });
        }
        Ok(HandlerRegistry {
            entries: Arc::new(self.entries),
        })
    }
}

/// Immutable name → handler map; cheap to clone.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    entries: Arc<BTreeMap<String, HandlerEntry>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Run every registrator linked into the binary and build the registry.
    pub fn discover_and_build() -> Result<Self, RegistryError> {
        let mut b = RegistryBuilder::default();
        for r in ::inventory::iter::<Registrator> {
            r.0(&mut b);
        }
        let registry = b.build()?;
        tracing::debug!(handlers = ?registry.names().collect::<Vec<_>>(), "handler registry built");
        Ok(registry)
    }

    /// Lookup by already-normalized key.
    pub fn get(&self, key: &str) -> Option<&HandlerEntry> {
        self.entries.get(key)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Register a [`Controller`] type under a handler name at link time.
///
/// ```ignore
/// actionkit::register_controller!(HomeController, "HomeController");
/// actionkit::register_controller!(NamespacedHome, "Home/HomeController");
/// ```
#[macro_export]
macro_rules! register_controller {
    ($ty:ty, $name:expr) => {
        const _: () = {
            fn __register(b: &mut $crate::registry::RegistryBuilder) {
                b.register_controller::<$ty>($name);
            }
            $crate::inventory::submit! {
                $crate::registry::Registrator(__register)
            }
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Base;
    use crate::contracts::{Initializable, Injectable};
    use async_trait::async_trait;

    macro_rules! dummy_controller {
        ($name:ident, [$($action:literal),*]) => {
            #[derive(Default)]
            struct $name {
                base: Base,
            }
            impl Injectable for $name {
                fn base(&self) -> &Base {
                    &self.base
                }
                fn base_mut(&mut self) -> &mut Base {
                    &mut self.base
                }
            }
            impl Initializable for $name {}
            #[async_trait]
            impl Controller for $name {
                const ACTIONS: &'static [&'static str] = &[$($action),*];
                async fn invoke(&mut self, _action: &str) -> anyhow::Result<()> {
                    Ok(())
                }
            }
        };
    }

    dummy_controller!(Home, ["index", "show"]);
    dummy_controller!(Silent, []);
    dummy_controller!(Twice, ["index", "index"]);

    #[test]
    fn registers_under_normalized_name() {
        let mut b = HandlerRegistry::builder();
        b.register_controller::<Home>("./Home//HomeController/");
        let reg = b.build().unwrap();
        let entry = reg.get("Home/HomeController").unwrap();
        assert_eq!(entry.name(), "Home/HomeController");
        assert!(entry.has_action("show"));
        assert!(!entry.has_action("destroy"));
        assert!(entry.instantiate().is_ok());
    }

    #[test]
    fn duplicate_names_reported_together() {
        let mut b = HandlerRegistry::builder();
        b.register_controller::<Home>("Home")
            .register_controller::<Home>("Home")
            .register_controller::<Silent>("Silent")
            .register_controller::<Twice>("Twice");

        match b.build().unwrap_err() {
            RegistryError::InvalidRegistryConfiguration { errors } => {
                assert_eq!(errors.len(), 3);
                assert!(errors[0].contains("already registered"));
                assert!(errors[1].contains("no actions"));
                assert!(errors[2].contains("twice"));
            }
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut b = HandlerRegistry::builder();
        b.register_controller::<Home>("/./");
        assert!(b.build().is_err());
    }

    #[test]
    fn empty_registry_builds() {
        let reg = HandlerRegistry::builder().build().unwrap();
        assert!(reg.is_empty());
        assert_eq!(reg.len(), 0);
    }
}
