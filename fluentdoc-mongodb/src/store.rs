use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use regex::Regex;
use std::{sync::LazyLock, time::Duration};
use tracing::{debug, info};

use fluentdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    identity::key_string,
    metadata::ID_FIELD,
    query::{Expr, Query},
    schema::IndexSpec,
    update::{Update, WriteOutcome},
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY: i32 = 11000;

static DUPLICATE_INDEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"index: (\S+)").ok());

/// MongoDB-backed [`StoreBackend`].
///
/// Every trait method is a single driver call against `database`.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Maps a driver error, recognising unique index violations.
fn backend_error(collection: &str, err: MongoError) -> DocumentStoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(failure)) = err.kind.as_ref() {
        if failure.code == DUPLICATE_KEY {
            let index = DUPLICATE_INDEX
                .as_ref()
                .and_then(|pattern| pattern.captures(&failure.message))
                .and_then(|captures| captures.get(1))
                .map(|name| name.as_str().to_string())
                .unwrap_or_default();

            return DocumentStoreError::DuplicateKey(index, collection.to_string());
        }
    }

    DocumentStoreError::Backend(err.to_string())
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: &[IndexSpec],
    ) -> DocumentStoreResult<Vec<String>> {
        let models = indexes.iter().map(|index| {
            IndexModel::builder()
                .keys(doc! { index.field.as_str(): 1 })
                .options(IndexOptions::builder().unique(index.unique).build())
                .build()
        });

        let created = self
            .get_collection(collection)
            .create_indexes(models)
            .await
            .map_err(|e| backend_error(collection, e))?;

        debug!(collection, indexes = ?created.index_names, "created indexes");

        Ok(created.index_names)
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<IndexSpec>> {
        let models = self
            .get_collection(collection)
            .list_indexes()
            .await
            .map_err(|e| backend_error(collection, e))?
            .try_collect::<Vec<IndexModel>>()
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let field = model.keys.keys().next()?.clone();
                if field == ID_FIELD {
                    return None;
                }

                let unique = model
                    .options
                    .and_then(|options| options.unique)
                    .unwrap_or(false);

                Some(IndexSpec { field, unique })
            })
            .collect())
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: &Expr,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<WriteOutcome> {
        let result = self
            .get_collection(collection)
            .replace_one(MongoQueryTranslator::translate(Some(filter))?, replacement)
            .upsert(upsert)
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(WriteOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id.as_ref().and_then(key_string),
        })
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<Vec<Document>> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;

        let mut options = FindOptions::default();
        options.projection = query.projection.map(|projection| projection.to_document());

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| backend_error(collection, e))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(Some(filter))?)
            .await
            .map_err(|e| backend_error(collection, e))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Expr,
        update: &Update,
    ) -> DocumentStoreResult<WriteOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(MongoQueryTranslator::translate(Some(filter))?, update.to_document())
            .await
            .map_err(|e| backend_error(collection, e))?;

        Ok(WriteOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: None,
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_one(MongoQueryTranslator::translate(Some(filter))?)
            .await
            .map_err(|e| backend_error(collection, e))?
            .deleted_count)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder for [`MongoDbStore`]: a connection string, a database and optional client settings.
///
/// Settings left unset keep whatever the connection string (or the driver) specifies.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
            max_pool_size: None,
            connect_timeout: None,
            server_selection_timeout: None,
        }
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        self.max_pool_size = Some(max_pool_size);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = Some(timeout);
        self
    }

    fn apply(&self, options: &mut ClientOptions) {
        if let Some(app_name) = &self.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(max_pool_size) = self.max_pool_size {
            options.max_pool_size = Some(max_pool_size);
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        self.apply(&mut options);

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected mongodb backend");

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_settings_override_parsed_options() {
        let builder = MongoDbStore::builder("mongodb://localhost:27017", "app")
            .app_name("fluentdoc")
            .max_pool_size(4)
            .server_selection_timeout(Duration::from_secs(2));

        let mut options = ClientOptions::default();
        options.max_pool_size = Some(100);
        builder.apply(&mut options);

        assert_eq!(options.app_name.as_deref(), Some("fluentdoc"));
        assert_eq!(options.max_pool_size, Some(4));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.connect_timeout, None);
    }

    #[test]
    fn duplicate_key_messages_name_the_index() {
        let message = "E11000 duplicate key error collection: app.entities index: email_1 dup key";
        let index = DUPLICATE_INDEX
            .as_ref()
            .and_then(|pattern| pattern.captures(message))
            .and_then(|captures| captures.get(1))
            .map(|name| name.as_str());

        assert_eq!(index, Some("email_1"));
    }
}
