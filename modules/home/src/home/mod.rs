//! Handlers under the `Home/` namespace.

use actionkit::prelude::*;
use actionkit::unknown_action;
use serde_json::json;

use crate::error::to_api_error;
use crate::home_model::HomeModel;

/// `Home/HomeController@index`: like the top-level home page, but the row
/// id comes from the `id` query parameter (default 1).
#[derive(Default)]
pub struct HomeController {
    base: Base,
}

impl HomeController {
    fn requested_id(&self) -> Result<i64, ApiError> {
        match self.base.request()?.query_param("id") {
            None => Ok(1),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::full(format!("invalid id '{raw}'"), 400, "INVALID_ID")),
        }
    }

    async fn index(&mut self) -> anyhow::Result<()> {
        let id = match self.requested_id() {
            Ok(id) => id,
            Err(e) => {
                self.error(&e);
                return Ok(());
            }
        };

        let model = self.base.create_dependent(|| HomeModel::new(id)).await?;
        match model.select().await {
            Ok(rows) => self.success(json!({ "id": id, "rows": rows })),
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

impl Initializable for HomeController {}

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
