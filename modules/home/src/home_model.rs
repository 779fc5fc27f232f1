use actionkit::{async_trait, Base, Initializable, Injectable, Model};
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};

/// Reads rows for the home page from the shared pool.
#[derive(Debug)]
pub struct HomeModel {
    base: Base,
    id: i64,
}

impl HomeModel {
    pub fn new(id: i64) -> Self {
        Self {
            base: Base::default(),
            id,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// `SELECT <id> AS val`, one JSON object per row.
    pub async fn select(&self) -> anyhow::Result<Vec<Value>> {
        let pool = self.base.collaborator::<SqlitePool>()?;
        let rows = sqlx::query("SELECT ? AS val")
            .bind(self.id)
            .fetch_all(&*pool)
            .await?;

        rows.iter()
            .map(|row| Ok(json!({ "val": row.try_get::<i64, _>("val")? })))
            .collect()
    }
}

impl Injectable for HomeModel {
    fn base(&self) -> &Base {
        &self.base
    }

    fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }
}

#[async_trait]
impl Initializable for HomeModel {
    async fn init(&mut self) -> anyhow::Result<()> {
        tracing::info!(id = self.id, "home model ready");
        Ok(())
    }
}

impl Model for HomeModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use actionkit::{Collaborators, Context, RequestHandle, ResponseHandle};
    use axum::http::Method;
    use std::sync::Arc;

    fn context_with(shared: Collaborators) -> Arc<Context> {
        Arc::new(
            Context::builder()
                .shared(Arc::new(shared))
                .request(Arc::new(RequestHandle::new(Method::GET, "/")))
                .response(Arc::new(ResponseHandle::new()))
                .build(),
        )
    }

    #[tokio::test]
    async fn select_echoes_the_id() {
        let mut shared = Collaborators::new();
        shared.insert(SqlitePool::connect("sqlite::memory:").await.unwrap());

        let mut model = HomeModel::new(7);
        model.inject(context_with(shared));
        assert_eq!(model.select().await.unwrap(), vec![json!({"val": 7})]);
    }

    #[tokio::test]
    async fn select_without_pool_fails() {
        let mut model = HomeModel::new(1);
        model.inject(context_with(Collaborators::new()));
        let err = model.select().await.unwrap_err();
        assert!(err.to_string().contains("no collaborator"));
    }
}
