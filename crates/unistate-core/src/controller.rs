// ── Controller adapter ──
//
// Binds the reconciliation traits to a real controller through
// unistate-api's RestClient. Fetching is two-pass: list every
// collection raw, build the cross-collection id -> name map, then
// normalize reference fields so live entities compare in the same
// logical-name namespace as desired entities.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use unistate_api::RestClient;

use crate::error::CoreError;
use crate::live::{LiveApi, LiveSnapshot, LiveStateFetcher, collect_id_names, normalize_live};
use crate::model::Collection;

/// A connected controller, ready to fetch and mutate one site.
pub struct Controller {
    client: RestClient,
}

impl Controller {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    pub fn site(&self) -> &str {
        self.client.site()
    }

    async fn list_raw(
        &self,
        collection: &Collection,
    ) -> Result<Vec<Map<String, Value>>, CoreError> {
        let docs = self
            .client
            .list(collection.rest_path())
            .await
            .map_err(|source| CoreError::Fetch {
                collection: collection.clone(),
                source,
            })?;

        Ok(docs
            .into_iter()
            .filter_map(|doc| match doc {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}

impl LiveStateFetcher for Controller {
    async fn snapshot(&self, collections: &[Collection]) -> Result<LiveSnapshot, CoreError> {
        debug!(site = self.site(), count = collections.len(), "fetching live snapshot");
        // Pass 1: raw documents per collection.
        let mut raw: Vec<(Collection, Vec<Map<String, Value>>)> =
            Vec::with_capacity(collections.len());
        for collection in collections {
            let docs = self.list_raw(collection).await?;
            debug!(%collection, count = docs.len(), "fetched live collection");
            raw.push((collection.clone(), docs));
        }

        // Pass 2: device id -> logical name across everything fetched.
        let mut id_to_name: HashMap<(Collection, String), String> = HashMap::new();
        for (collection, docs) in &raw {
            id_to_name.extend(collect_id_names(collection, docs));
        }

        // Pass 3: normalize into the logical-name namespace.
        let mut snapshot = LiveSnapshot::new();
        for (collection, docs) in raw {
            let entities = normalize_live(&collection, docs, &id_to_name)?;
            snapshot.insert(collection, entities);
        }

        Ok(snapshot)
    }
}

impl LiveApi for Controller {
    async fn create(
        &self,
        collection: &Collection,
        fields: &Map<String, Value>,
    ) -> Result<String, CoreError> {
        let doc = self
            .client
            .create(collection.rest_path(), &Value::Object(fields.clone()))
            .await
            .map_err(CoreError::Api)?;

        doc.get("_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| CoreError::MalformedLive {
                collection: collection.clone(),
                message: "created document has no _id".into(),
            })
    }

    async fn update(
        &self,
        collection: &Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), CoreError> {
        self.client
            .update(collection.rest_path(), id, &Value::Object(fields.clone()))
            .await
            .map_err(CoreError::Api)?;
        Ok(())
    }

    async fn delete(&self, collection: &Collection, id: &str) -> Result<(), CoreError> {
        self.client
            .delete(collection.rest_path(), id)
            .await
            .map_err(CoreError::Api)?;
        Ok(())
    }
}
