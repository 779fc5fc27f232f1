use actionkit::prelude::*;
use actionkit::unknown_action;
use serde_json::json;

/// Localized greeting; the language comes from `lang` in the query or body.
#[derive(Default)]
pub struct GreetingController {
    base: Base,
}

impl GreetingController {
    fn hello(&self) -> anyhow::Result<()> {
        let messages = BTreeMap::from([("en", "Hello"), ("fr", "Bonjour"), ("de", "Hallo")]);
        match self.base.localize(&messages) {
            Ok(message) => self.success(json!({ "message": message })),
            Err(e) => {
                self.error(&e);
                Ok(())
            }
        }
    }
}

impl Injectable for GreetingController {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }
}

impl Initializable for GreetingController {}

#[async_trait]
impl Controller for GreetingController {
    const ACTIONS: &'static [&'static str] = &["hello"];

    async fn invoke(&mut self, action: &str) -> anyhow::Result<()> {
        match action {
            "hello" => self.hello(),
            other => Err(unknown_action::<Self>(other)),
        }
    }
}
