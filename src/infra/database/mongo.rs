//! MongoDB implementation of the item and user repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{self, Document, doc, oid::ObjectId},
    options::{IndexOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domain::{
    AppError, DatabaseError, Item, ItemFilter, ItemRepository, NewItem, Photo, User,
    UserRepository,
};

pub const ITEMS_COLLECTION: &str = "items";
pub const USERS_COLLECTION: &str = "users";

fn to_bson_date(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_date(dt: bson::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

/// Item ids are hex `ObjectId`s; anything else cannot match a record.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoDocument {
    url: String,
    storage_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    title: String,
    description: String,
    price: f64,
    category: String,
    #[serde(default)]
    photo: Option<PhotoDocument>,
    #[serde(default)]
    sold: bool,
    used_duration: String,
    uploaded_by: String,
    user_id: String,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

impl ItemDocument {
    fn from_new(item: &NewItem) -> Self {
        Self {
            id: None,
            title: item.title.clone(),
            description: item.description.clone(),
            price: item.price,
            category: item.category.clone(),
            photo: item.photo.as_ref().map(|p| PhotoDocument {
                url: p.url.clone(),
                storage_key: p.storage_key.clone(),
            }),
            sold: item.sold,
            used_duration: item.used_duration.clone(),
            uploaded_by: item.uploaded_by.clone(),
            user_id: item.user_id.clone(),
            created_at: to_bson_date(item.created_at),
            updated_at: to_bson_date(item.updated_at),
        }
    }

    fn into_item(self) -> Item {
        Item {
            id: self.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            title: self.title,
            description: self.description,
            price: self.price,
            category: self.category,
            photo: self.photo.map(|p| Photo {
                url: p.url,
                storage_key: p.storage_key,
            }),
            sold: self.sold,
            used_duration: self.used_duration,
            uploaded_by: self.uploaded_by,
            user_id: self.user_id,
            created_at: from_bson_date(self.created_at),
            updated_at: from_bson_date(self.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    uid: String,
    name: String,
    email: String,
    phone_number: String,
    #[serde(default)]
    avatar: Option<String>,
    created_at: bson::DateTime,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            uid: user.uid.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            avatar: user.avatar.clone(),
            created_at: to_bson_date(user.created_at),
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            uid: doc.uid,
            name: doc.name,
            email: doc.email,
            phone_number: doc.phone_number,
            avatar: doc.avatar,
            created_at: from_bson_date(doc.created_at),
        }
    }
}

/// Builds the query document for a listing filter.
fn item_filter_document(filter: &ItemFilter) -> Document {
    let mut query = Document::new();
    if let Some(category) = &filter.category {
        query.insert("category", category.as_str());
    }
    if let Some(sold) = filter.sold {
        query.insert("sold", sold);
    }
    query
}

/// Record Store backed by a MongoDB database.
///
/// The driver's `Client` is a pooled handle; one instance is created at
/// start-up and shared by every request.
pub struct MongoRepository {
    database: Database,
    items: Collection<ItemDocument>,
    users: Collection<UserDocument>,
}

impl MongoRepository {
    /// Connects to `uri`, checks the server is reachable and creates the
    /// indexes the repositories rely on.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Connection` if the client cannot be built or
    /// the server does not answer, and `DatabaseError::Index` if index
    /// creation fails.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        let repo = Self::from_database(client.database(database));

        repo.ping().await?;
        repo.ensure_indexes().await?;
        info!(database = %database, "Connected to MongoDB");
        Ok(repo)
    }

    /// Wraps an existing database handle without touching the server.
    #[must_use]
    pub fn from_database(database: Database) -> Self {
        Self {
            items: database.collection(ITEMS_COLLECTION),
            users: database.collection(USERS_COLLECTION),
            database,
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Creates the listing sort index and the unique user indexes.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let index_err = |e: mongodb::error::Error| DatabaseError::Index(e.to_string());

        self.items
            .create_index(IndexModel::builder().keys(doc! { "createdAt": -1 }).build())
            .await
            .map_err(index_err)?;
        self.items
            .create_index(IndexModel::builder().keys(doc! { "userId": 1 }).build())
            .await
            .map_err(index_err)?;

        for field in ["uid", "email"] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.users.create_index(model).await.map_err(index_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ItemRepository for MongoRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        self.ping().await
    }

    #[instrument(skip(self, item), fields(owner = %item.user_id))]
    async fn insert_item(&self, item: &NewItem) -> Result<Item, AppError> {
        let mut document = ItemDocument::from_new(item);
        let result = self.items.insert_one(&document).await?;
        let id = result.inserted_id.as_object_id().ok_or_else(|| {
            DatabaseError::Query("insert did not return an ObjectId".to_string())
        })?;
        document.id = Some(id);
        Ok(document.into_item())
    }

    #[instrument(skip(self))]
    async fn get_item(&self, id: &str) -> Result<Option<Item>, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let found = self.items.find_one(doc! { "_id": oid }).await?;
        Ok(found.map(ItemDocument::into_item))
    }

    #[instrument(skip(self))]
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, AppError> {
        let mut cursor = self
            .items
            .find(item_filter_document(filter))
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .await?;

        let mut items = Vec::new();
        while cursor.advance().await? {
            items.push(cursor.deserialize_current()?.into_item());
        }
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn set_sold(&self, id: &str, sold: bool) -> Result<Option<Item>, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let update = doc! {
            "$set": { "sold": sold, "updatedAt": to_bson_date(Utc::now()) }
        };
        let updated = self
            .items
            .find_one_and_update(doc! { "_id": oid }, update)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(ItemDocument::into_item))
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: &str) -> Result<bool, AppError> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let result = self.items.delete_one(doc! { "_id": oid }).await?;
        Ok(result.deleted_count == 1)
    }
}

#[async_trait]
impl UserRepository for MongoRepository {
    #[instrument(skip(self, user), fields(uid = %user.uid))]
    async fn insert_user(&self, user: &User) -> Result<User, AppError> {
        self.users.insert_one(UserDocument::from(user)).await?;
        Ok(user.clone())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        let found = self.users.find_one(doc! { "uid": uid }).await?;
        Ok(found.map(User::from))
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut cursor = self.users.find(doc! {}).sort(doc! { "createdAt": 1 }).await?;

        let mut users = Vec::new();
        while cursor.advance().await? {
            users.push(User::from(cursor.deserialize_current()?));
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item() -> NewItem {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        NewItem {
            title: "Desk Lamp".to_string(),
            description: "Works great".to_string(),
            price: 15.0,
            category: "Furniture".to_string(),
            photo: Some(Photo {
                url: "/uploads/photos/a.jpg".to_string(),
                storage_key: "photos/a.jpg".to_string(),
            }),
            sold: false,
            used_duration: "2 months".to_string(),
            uploaded_by: "Jane".to_string(),
            user_id: "u123".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_item_document_field_names() {
        let document = bson::to_document(&ItemDocument::from_new(&new_item())).unwrap();

        assert!(!document.contains_key("_id"));
        assert_eq!(document.get_str("userId").unwrap(), "u123");
        assert_eq!(document.get_str("usedDuration").unwrap(), "2 months");
        assert_eq!(
            document
                .get_document("photo")
                .unwrap()
                .get_str("storageKey")
                .unwrap(),
            "photos/a.jpg"
        );
        assert!(document.get_datetime("createdAt").is_ok());
    }

    #[test]
    fn test_item_document_into_item() {
        let oid = ObjectId::new();
        let mut document = ItemDocument::from_new(&new_item());
        document.id = Some(oid);

        let item = document.into_item();

        assert_eq!(item.id, oid.to_hex());
        assert_eq!(item.created_at, new_item().created_at);
        assert_eq!(item.photo.unwrap().storage_key, "photos/a.jpg");
    }

    #[test]
    fn test_item_filter_document() {
        assert!(item_filter_document(&ItemFilter::default()).is_empty());

        let query = item_filter_document(&ItemFilter {
            category: Some("Books".to_string()),
            sold: Some(false),
        });
        assert_eq!(query, doc! { "category": "Books", "sold": false });
    }

    #[test]
    fn test_parse_id_rejects_non_object_ids() {
        assert!(parse_id("nonexistent-id").is_none());
        assert!(parse_id(&ObjectId::new().to_hex()).is_some());
    }

    #[test]
    fn test_user_document_round_trip_keeps_millis() {
        let created = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_456).unwrap();
        let user = User {
            uid: "u1".to_string(),
            name: "Jane".to_string(),
            email: "jane@mavs.uta.edu".to_string(),
            phone_number: "8175550100".to_string(),
            avatar: None,
            created_at: created,
        };

        let document = bson::to_document(&UserDocument::from(&user)).unwrap();
        assert_eq!(document.get_str("phoneNumber").unwrap(), "8175550100");

        let back: UserDocument = bson::from_document(document).unwrap();
        assert_eq!(User::from(back), user);
    }
}
