//! Record Store integration tests using testcontainers.
//!
//! These tests require Docker to be running and use testcontainers
//! to spin up a real MongoDB instance.

use chrono::{Duration, Utc};
use testcontainers::core::WaitFor;
use testcontainers::{ContainerAsync, GenericImage, runners::AsyncRunner};

use mavsmart_api::domain::{
    AppError, DatabaseError, ItemFilter, ItemRepository, NewItem, Photo, User, UserRepository,
};
use mavsmart_api::infra::MongoRepository;

const DATABASE: &str = "mavsmart_test";

/// Helper to create a MongoDB container and repository
async fn setup_mongo() -> (MongoRepository, String, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("mongo", "7.0")
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
        .with_exposed_port(27017.into())
        .start()
        .await
        .expect("Failed to start mongo container");

    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get mongo port");

    let uri = format!("mongodb://127.0.0.1:{port}/?directConnection=true");

    // The log line can precede the listener by a moment
    let mut attempts = 0;
    let repo = loop {
        attempts += 1;
        match MongoRepository::connect(&uri, DATABASE).await {
            Ok(repo) => break repo,
            Err(_) if attempts < 30 => {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
            Err(e) => panic!("Failed to connect to mongo after 30 attempts: {:?}", e),
        }
    };

    (repo, uri, container)
}

fn new_item(title: &str, minutes_ago: i64) -> NewItem {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    NewItem {
        title: title.to_string(),
        description: "Good condition".to_string(),
        price: 25.0,
        category: "Furniture".to_string(),
        photo: Some(Photo {
            url: format!("https://photos.test/photos/{title}.jpg"),
            storage_key: format!("photos/{title}.jpg"),
        }),
        sold: false,
        used_duration: "1 year".to_string(),
        uploaded_by: "Sam".to_string(),
        user_id: "u1".to_string(),
        created_at: at,
        updated_at: at,
    }
}

fn user(uid: &str, email: &str) -> User {
    User {
        uid: uid.to_string(),
        name: "Sam Houston".to_string(),
        email: email.to_string(),
        phone_number: "8175550100".to_string(),
        avatar: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_connect_creates_indexes() {
    let (repo, uri, _container) = setup_mongo().await;

    let client = mongodb::Client::with_uri_str(&uri)
        .await
        .expect("Failed to build client");
    let db = client.database(DATABASE);

    let user_indexes = db
        .collection::<mongodb::bson::Document>("users")
        .list_index_names()
        .await
        .expect("Failed to list user indexes");
    assert!(user_indexes.contains(&"uid_1".to_string()));
    assert!(user_indexes.contains(&"email_1".to_string()));

    let item_indexes = db
        .collection::<mongodb::bson::Document>("items")
        .list_index_names()
        .await
        .expect("Failed to list item indexes");
    assert!(item_indexes.contains(&"createdAt_-1".to_string()));
    assert!(item_indexes.contains(&"userId_1".to_string()));

    // Re-creating existing indexes is a no-op
    repo.ensure_indexes()
        .await
        .expect("Second index pass failed");
    repo.health_check().await.expect("Ping failed");
}

#[tokio::test]
async fn test_insert_and_get_item() {
    let (repo, _uri, _container) = setup_mongo().await;

    let created = repo
        .insert_item(&new_item("lamp", 0))
        .await
        .expect("Failed to insert item");
    assert_eq!(created.id.len(), 24);
    assert_eq!(created.title, "lamp");

    let fetched = repo
        .get_item(&created.id)
        .await
        .expect("Failed to get item")
        .expect("Item not found");
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.user_id, "u1");
    assert_eq!(
        fetched.photo.map(|p| p.storage_key),
        Some("photos/lamp.jpg".to_string())
    );

    assert!(repo.get_item("not-an-object-id").await.unwrap().is_none());
    assert!(
        repo.get_item("65a1b2c3d4e5f60718293a4b")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_list_items_newest_first() {
    let (repo, _uri, _container) = setup_mongo().await;

    for (title, minutes_ago) in [("middle", 30), ("newest", 1), ("oldest", 90)] {
        repo.insert_item(&new_item(title, minutes_ago))
            .await
            .expect("Failed to insert item");
    }

    let titles: Vec<String> = repo
        .list_items(&ItemFilter::default())
        .await
        .expect("Failed to list items")
        .into_iter()
        .map(|item| item.title)
        .collect();

    assert_eq!(titles, vec!["newest", "middle", "oldest"]);
}

#[tokio::test]
async fn test_set_sold_returns_updated_item_and_filters() {
    let (repo, _uri, _container) = setup_mongo().await;

    let sold = repo.insert_item(&new_item("desk", 10)).await.unwrap();
    repo.insert_item(&new_item("chair", 5)).await.unwrap();

    let updated = repo
        .set_sold(&sold.id, true)
        .await
        .expect("Failed to update item")
        .expect("Item not found");
    assert!(updated.sold);
    assert!(updated.updated_at >= sold.updated_at);

    let available = repo
        .list_items(&ItemFilter {
            sold: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].title, "chair");

    assert!(
        repo.set_sold("65a1b2c3d4e5f60718293a4b", true)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_delete_item_reports_whether_removed() {
    let (repo, _uri, _container) = setup_mongo().await;

    let created = repo.insert_item(&new_item("bike", 0)).await.unwrap();

    assert!(repo.delete_item(&created.id).await.unwrap());
    assert!(!repo.delete_item(&created.id).await.unwrap());
    assert!(!repo.delete_item("garbage").await.unwrap());
    assert!(repo.get_item(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_user_is_rejected() {
    let (repo, _uri, _container) = setup_mongo().await;

    repo.insert_user(&user("u1", "sam@mavs.uta.edu"))
        .await
        .expect("Failed to insert user");

    let same_uid = repo.insert_user(&user("u1", "other@mavs.uta.edu")).await;
    assert!(matches!(
        same_uid,
        Err(AppError::Database(DatabaseError::Duplicate(_)))
    ));

    let same_email = repo.insert_user(&user("u2", "sam@mavs.uta.edu")).await;
    assert!(matches!(
        same_email,
        Err(AppError::Database(DatabaseError::Duplicate(_)))
    ));

    let users = repo.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(
        repo.get_user("u1").await.unwrap().map(|u| u.email),
        Some("sam@mavs.uta.edu".to_string())
    );
}
