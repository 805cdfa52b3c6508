//! MongoDB-backed implementation of the storage contract.
//!
//! # Responsibility
//! - Serve records from any database/collection pair of one MongoDB deployment.
//! - Hand out 32-bit identifiers from a per-collection sequence document.
//!
//! # Invariants
//! - Construction fails unless a ping against the primary succeeds in time.
//! - Every call is bounded by its configured deadline.
//! - Identifiers acknowledged by the server must be BSON `int32`.

use super::error::{StoreError, StoreResult};
use super::target::TargetSlot;
use super::{bounded, log_outcome, BackendKind, StorageBackend};
use crate::config::DocumentStoreConfig;
use crate::model::record::{Record, RecordId, UNASSIGNED_ID};
use crate::model::target::ConnectionTarget;
use async_trait::async_trait;
use log::{error, info, warn};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, ReadPreference, ReturnDocument, SelectionCriteria};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const KIND: BackendKind = BackendKind::Document;
const APP_NAME: &str = "textstore";

/// Collection holding `{_id: <collection name>, seq: <last id>}` per database.
pub const COUNTER_COLLECTION: &str = "textstore_counters";

/// Stored shape of a record: the identifier lives in `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TextDocument {
    #[serde(rename = "_id")]
    id: RecordId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
}

impl TextDocument {
    fn from_record(id: RecordId, record: &Record) -> Self {
        Self {
            id,
            title: record.title.clone(),
            text: record.text.clone(),
        }
    }

    fn into_record(self) -> Record {
        Record::with_id(self.id, self.title, self.text)
    }
}

/// Storage backend over a MongoDB deployment.
///
/// The driver client is shared by all callers and is safe for concurrent use.
///
/// Each database that received a `create` also holds the
/// [`COUNTER_COLLECTION`] sequence collection. It is listed by
/// `list_collections` like any other collection, but `set_target` rejects
/// it with `StoreError::Unsupported`.
pub struct DocumentStoreBackend {
    client: Client,
    config: DocumentStoreConfig,
    connected: AtomicBool,
    target: TargetSlot,
}

impl DocumentStoreBackend {
    /// Builds a client and verifies liveness with a bounded ping.
    ///
    /// # Errors
    /// - `StoreError::Connection` when the URI is invalid, the client cannot
    ///   be built, or the ping fails or times out.
    pub async fn connect(config: DocumentStoreConfig) -> StoreResult<Self> {
        let started_at = Instant::now();
        info!(
            "event=backend_connect module=backend backend={} status=start",
            KIND.as_str()
        );

        let client = bounded("connect", config.connect_timeout(), build_client(&config))
            .await
            .map_err(|err| connect_failed(started_at, err))?;

        let ping = bounded("ping", config.ping_timeout(), async {
            client
                .database("admin")
                .run_command(doc! { "ping": 1 })
                .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
                .await?;
            Ok::<_, StoreError>(())
        })
        .await;
        if let Err(err) = ping {
            let closed = bounded("close", config.close_timeout(), async {
                client.clone().shutdown().await;
                Ok::<_, StoreError>(())
            })
            .await;
            if let Err(close_err) = closed {
                warn!(
                    "event=backend_connect module=backend backend={} status=close_failed error={}",
                    KIND.as_str(),
                    close_err
                );
            }
            return Err(connect_failed(started_at, err));
        }

        info!(
            "event=backend_connect module=backend backend={} status=ok duration_ms={}",
            KIND.as_str(),
            started_at.elapsed().as_millis()
        );
        Ok(Self {
            client,
            config,
            connected: AtomicBool::new(true),
            target: TargetSlot::new(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::Connection(
                "document store backend is closed".to_string(),
            ))
        }
    }

    fn collection_for(&self, target: &ConnectionTarget) -> StoreResult<Collection<Document>> {
        if !target.is_set() {
            return Err(StoreError::no_target());
        }
        Ok(self
            .client
            .database(&target.database)
            .collection(&target.collection))
    }

    fn counters_for(&self, target: &ConnectionTarget) -> Collection<Document> {
        self.client
            .database(&target.database)
            .collection(COUNTER_COLLECTION)
    }

    async fn set_target_inner(&self, target: ConnectionTarget) -> StoreResult<()> {
        self.ensure_open()?;
        check_target(&target)?;
        self.target.replace(target).await;
        Ok(())
    }

    async fn list_databases_inner(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        bounded(
            "list_databases",
            self.config.list_databases_timeout(),
            async { Ok::<_, StoreError>(self.client.list_database_names().await?) },
        )
        .await
    }

    async fn list_collections_inner(&self, database: &str) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        bounded(
            "list_collections",
            self.config.list_collections_timeout(),
            async {
                Ok::<_, StoreError>(self
                    .client
                    .database(database)
                    .list_collection_names()
                    .await?)
            },
        )
        .await
    }

    async fn create_inner(&self, record: &Record) -> StoreResult<RecordId> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let collection = self.collection_for(&target)?;
        let counters = self.counters_for(&target);

        bounded("create", self.config.point_timeout(), async {
            let id = next_id(&counters, &target.collection).await?;
            let document = mongodb::bson::to_document(&TextDocument::from_record(id, record))?;
            let inserted = collection.insert_one(document).await?;
            coerce_id(&inserted.inserted_id)
        })
        .await
    }

    async fn get_inner(&self, id: RecordId) -> StoreResult<Record> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let collection = self.collection_for(&target)?;

        bounded("get", self.config.point_timeout(), async {
            match collection.find_one(doc! { "_id": id }).await? {
                Some(found) => decode_record(found, id),
                None => Err(StoreError::NotFound(id)),
            }
        })
        .await
    }

    async fn update_inner(&self, record: &Record) -> StoreResult<Record> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let collection = self.collection_for(&target)?;
        if !record.is_persisted() {
            return Err(StoreError::NotFound(record.id));
        }

        bounded("update", self.config.point_timeout(), async {
            let replacement =
                mongodb::bson::to_document(&TextDocument::from_record(record.id, record))?;
            let replaced = collection
                .find_one_and_replace(doc! { "_id": record.id }, replacement)
                .return_document(ReturnDocument::After)
                .await?;
            match replaced {
                Some(found) => decode_record(found, record.id),
                None => Err(StoreError::NotFound(record.id)),
            }
        })
        .await
    }

    async fn delete_inner(&self, id: RecordId) -> StoreResult<bool> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let collection = self.collection_for(&target)?;

        bounded("delete", self.config.point_timeout(), async {
            let deleted = collection.delete_one(doc! { "_id": id }).await?;
            Ok::<_, StoreError>(deleted.deleted_count > 0)
        })
        .await
    }

    async fn close_inner(&self) -> StoreResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        bounded("close", self.config.close_timeout(), async {
            self.client.clone().shutdown().await;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

#[async_trait]
impl StorageBackend for DocumentStoreBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let started_at = Instant::now();
        let result = self.list_databases_inner().await;
        log_outcome(KIND, "list_databases", started_at, &result);
        result
    }

    async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>> {
        let started_at = Instant::now();
        let result = self.list_collections_inner(database).await;
        log_outcome(KIND, "list_collections", started_at, &result);
        result
    }

    async fn set_target(&self, target: ConnectionTarget) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.set_target_inner(target).await;
        log_outcome(KIND, "set_target", started_at, &result);
        result
    }

    async fn current_target(&self) -> ConnectionTarget {
        self.target.snapshot().await
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        let started_at = Instant::now();
        let result = self.create_inner(record).await;
        log_outcome(KIND, "create", started_at, &result);
        result
    }

    async fn get(&self, id: RecordId) -> StoreResult<Record> {
        let started_at = Instant::now();
        let result = self.get_inner(id).await;
        log_outcome(KIND, "get", started_at, &result);
        result
    }

    async fn update(&self, record: &Record) -> StoreResult<Record> {
        let started_at = Instant::now();
        let result = self.update_inner(record).await;
        log_outcome(KIND, "update", started_at, &result);
        result
    }

    async fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self.delete_inner(id).await;
        log_outcome(KIND, "delete", started_at, &result);
        result
    }

    async fn close(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.close_inner().await;
        log_outcome(KIND, "close", started_at, &result);
        result
    }
}

async fn build_client(config: &DocumentStoreConfig) -> StoreResult<Client> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    options.app_name.get_or_insert_with(|| APP_NAME.to_string());
    options.connect_timeout.get_or_insert(config.connect_timeout());
    options
        .server_selection_timeout
        .get_or_insert(config.ping_timeout());
    Ok(Client::with_options(options)?)
}

/// Bumps and returns the sequence of `collection`, creating it at 1.
async fn next_id(counters: &Collection<Document>, collection: &str) -> StoreResult<RecordId> {
    let counter = counters
        .find_one_and_update(doc! { "_id": collection }, doc! { "$inc": { "seq": 1_i32 } })
        .upsert(true)
        .return_document(ReturnDocument::After)
        .await?
        .ok_or_else(|| {
            StoreError::Backend(format!("sequence for `{collection}` was not returned"))
        })?;
    match counter.get("seq") {
        Some(seq) => coerce_id(seq),
        None => Err(StoreError::Backend(format!(
            "sequence for `{collection}` has no `seq` field"
        ))),
    }
}

/// Rejects targets that address the sequence collection.
fn check_target(target: &ConnectionTarget) -> StoreResult<()> {
    if target.collection == COUNTER_COLLECTION {
        return Err(StoreError::Unsupported(format!(
            "`{COUNTER_COLLECTION}` is reserved for id sequences"
        )));
    }
    Ok(())
}

/// Accepts only non-zero BSON `int32` identifiers.
fn coerce_id(value: &Bson) -> StoreResult<RecordId> {
    match value {
        Bson::Int32(id) if *id != UNASSIGNED_ID => Ok(*id),
        other => Err(StoreError::Backend(format!(
            "document id `{other}` is not a non-zero 32-bit integer"
        ))),
    }
}

fn decode_record(document: Document, requested: RecordId) -> StoreResult<Record> {
    let record = mongodb::bson::from_document::<TextDocument>(document)?.into_record();
    if !record.is_persisted() {
        return Err(StoreError::NotFound(requested));
    }
    Ok(record)
}

fn connect_failed(started_at: Instant, err: StoreError) -> StoreError {
    error!(
        "event=backend_connect module=backend backend={} status=error duration_ms={} error={}",
        KIND.as_str(),
        started_at.elapsed().as_millis(),
        err
    );
    match err {
        StoreError::Connection(message) => StoreError::Connection(message),
        other => StoreError::Connection(format!("cannot reach mongodb: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_target, coerce_id, decode_record, TextDocument, COUNTER_COLLECTION};
    use crate::backend::error::ErrorKind;
    use crate::model::record::Record;
    use crate::model::target::ConnectionTarget;
    use mongodb::bson::{doc, oid::ObjectId, Bson};

    #[test]
    fn sequence_collection_cannot_be_targeted() {
        let err = check_target(&ConnectionTarget::new("main", COUNTER_COLLECTION)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        check_target(&ConnectionTarget::new("main", "textfiles")).unwrap();
        check_target(&ConnectionTarget::default()).unwrap();
    }

    #[test]
    fn only_int32_ids_are_accepted() {
        assert_eq!(coerce_id(&Bson::Int32(1)).unwrap(), 1);

        for rejected in [
            Bson::Int32(0),
            Bson::Int64(1),
            Bson::ObjectId(ObjectId::new()),
            Bson::String("1".to_string()),
        ] {
            let err = coerce_id(&rejected).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Backend, "{rejected:?}");
        }
    }

    #[test]
    fn stored_shape_uses_underscore_id() {
        let record = Record::new("t1", "hello");
        let document =
            mongodb::bson::to_document(&TextDocument::from_record(4, &record)).unwrap();
        assert_eq!(document, doc! { "_id": 4, "title": "t1", "text": "hello" });
    }

    #[test]
    fn decode_maps_document_to_record() {
        let record = decode_record(doc! { "_id": 9, "title": "t", "text": "body" }, 9).unwrap();
        assert_eq!(record, Record::with_id(9, "t", "body"));
    }

    #[test]
    fn decode_treats_zero_id_as_not_found() {
        let err = decode_record(doc! { "_id": 0, "title": "t" }, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
