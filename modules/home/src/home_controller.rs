use actionkit::prelude::*;
use actionkit::unknown_action;
use serde_json::json;

use crate::error::to_api_error;
use crate::home_model::HomeModel;

/// `HomeController@index`: rows from [`HomeModel`] with id 1.
#[derive(Default)]
pub struct HomeController {
    base: Base,
    model: Option<HomeModel>,
}

impl HomeController {
    async fn index(&mut self) -> anyhow::Result<()> {
        let rows = match &self.model {
            Some(model) => model.select().await,
            None => Err(anyhow::anyhow!("home model not initialized")),
        };
        match rows {
            Ok(rows) => self.success(json!({ "rows": rows })),
            Err(e) => {
                self.error(&to_api_error(&e));
                Ok(())
            }
        }
    }
}

impl Injectable for HomeController {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }
}

#[async_trait]
impl Initializable for HomeController {
    async fn init(&mut self) -> anyhow::Result<()> {
        self.model = Some(self.base.create_dependent(|| HomeModel::new(1)).await?);
        Ok(())
    }
}

#[async_trait]
impl Controller for HomeController {
    const ACTIONS: &'static [&'static str] = &["index"];

    async fn invoke(&mut self, action: &str) -> anyhow::Result<()> {
        match action {
            "index" => self.index().await,
            other => Err(unknown_action::<Self>(other)),
        }
    }
}
