use std::sync::Arc;

use async_trait::async_trait;

use crate::base::Base;
use crate::context::Context;

/// Receives the per-request context. Every handler and model embeds a
/// [`Base`] and exposes it here.
pub trait Injectable: Send {
    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;

    /// Store `ctx`, replacing any previous one.
    fn inject(&mut self, ctx: Arc<Context>) {
        self.base_mut().inject(ctx);
    }
}

/// Optional asynchronous setup, run after injection and before the action.
#[async_trait]
pub trait Initializable: Send {
    async fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A routable handler: built fresh for every request, then asked to run one
/// of its named actions.
///
/// ```ignore
/// #[derive(Default)]
/// struct Ping { base: Base }
///
/// impl Injectable for Ping {
///     fn base(&self) -> &Base { &self.base }
///     fn base_mut(&mut self) -> &mut Base { &mut self.base }
/// }
/// impl Initializable for Ping {}
///
/// #[async_trait]
/// impl Controller for Ping {
///     const ACTIONS: &'static [&'static str] = &["index"];
///
///     async fn invoke(&mut self, action: &str) -> anyhow::Result<()> {
///         match action {
///             "index" => self.success("pong"),
///             other => Err(unknown_action::<Self>(other)),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Controller: Default + Injectable + Initializable + Sized + 'static {
    /// Names accepted by [`invoke`](Controller::invoke); checked when routes are registered.
    const ACTIONS: &'static [&'static str];

    /// Zero-argument construction.
    fn construct() -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    async fn invoke(&mut self, action: &str) -> anyhow::Result<()>;
}

/// A dependent object created by a handler through
/// [`Base::create_dependent`]; shares the handler's context.
pub trait Model: Injectable + Initializable + 'static {}

/// Error for an `invoke` arm that does not match any listed action.
pub fn unknown_action<T>(action: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "action '{action}' is not handled by {}",
        std::any::type_name::<T>()
    )
}

/// Object-safe view of a [`Controller`] used by the dispatcher.
#[async_trait]
pub(crate) trait ErasedController: Send {
    fn erased_inject(&mut self, ctx: Arc<Context>);
    async fn erased_init(&mut self) -> anyhow::Result<()>;
    async fn erased_invoke(&mut self, action: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Controller> ErasedController for T {
    fn erased_inject(&mut self, ctx: Arc<Context>) {
        Injectable::inject(self, ctx);
    }

    async fn erased_init(&mut self) -> anyhow::Result<()> {
        Initializable::init(self).await
    }

    async fn erased_invoke(&mut self, action: &str) -> anyhow::Result<()> {
        Controller::invoke(self, action).await
    }
}
