mod common;

use common::{User, setup_seeded_db};
use easymodel::{Attributes, ConditionSpec, EasyModel, Error, Fetched, Record, attributes};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

fn attrs(value: Value) -> Attributes {
    attributes(value).unwrap()
}

fn ann() -> Record {
    Record::persisted(&User, attrs(json!({"id": 1, "name": "Ann", "email": "ann@example.com"})))
}

#[tokio::test]
async fn test_upsert_then_fetch_returns_match_and_values() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain.set_model(&User);

    let matching = attrs(json!({"email": "cy@example.com", "name": "Placeholder"}));
    let values = attrs(json!({"name": "Cy", "age": 40}));
    let created = chain.update_or_create_model(&db, &matching, &values).await.unwrap();
    assert!(created.is_identified());

    let Fetched::One(record) = chain.fetch(&db).await.unwrap() else {
        panic!("expected the upserted record");
    };
    assert_eq!(record.get("email"), Some(&json!("cy@example.com")));
    assert_eq!(record.get("name"), Some(&json!("Cy")));
    assert_eq!(record.get("age"), Some(&json!(40)));
    assert!(chain.applied().is_none(), "fetch discards the chain");
}

#[tokio::test]
async fn test_upsert_updates_the_matching_row() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain.set_model(&User);

    let record = chain
        .update_or_create_model(&db, &attrs(json!({"email": "ann@example.com"})), &attrs(json!({"age": 35})))
        .await
        .unwrap();
    assert_eq!(record.key(), Some(&json!(1)));
    assert_eq!(record.get("age"), Some(&json!(35)));

    chain.reset();
    let users = chain.fetch(&db).await.unwrap();
    assert_eq!(users.len(), 2, "no row was created");
}

async fn find(db: &DatabaseConnection, subject: impl Into<easymodel::Subject>, id: i64) -> Record {
    let mut chain = EasyModel::new();
    chain.set_model(subject).add_wheres(vec![ConditionSpec::eq("id", id)]).unwrap();
    chain.fetch(db).await.unwrap().into_records().remove(0)
}

#[tokio::test]
async fn test_upsert_stays_within_accumulated_filters() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain
        .set_model(&User)
        .add_wheres(vec![ConditionSpec::eq("active", true)])
        .unwrap();

    let record = chain
        .update_or_create_model(&db, &attrs(json!({"name": "Bea"})), &attrs(json!({"age": 99})))
        .await
        .unwrap();
    assert_ne!(record.key(), Some(&json!(2)), "inactive Bea is outside the chain");
    assert_eq!(record.get("name"), Some(&json!("Bea")));
    assert_eq!(record.get("age"), Some(&json!(99)));

    assert_eq!(find(&db, &User, 2).await.get("age"), Some(&json!(17)));
    assert_eq!(EasyModel::hosted_by(&User).fetch(&db).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_relationship_upsert_keeps_relationship_filters() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain
        .set_model(ann())
        .set_relationship(Some("posts"))
        .add_wheres(vec![ConditionSpec::eq("published", true)])
        .unwrap();

    let post = chain
        .update_or_create_relationship(&db, "posts", &attrs(json!({"title": "Again"})), &attrs(json!({"views": 50})))
        .await
        .unwrap();
    assert_ne!(post.key(), Some(&json!(2)), "the unpublished post is filtered out");
    assert_eq!(post.get("user_id"), Some(&json!(1)));

    assert_eq!(find(&db, &common::Post, 2).await.get("views"), Some(&json!(5)));
}

#[tokio::test]
async fn test_relationship_upsert_fills_foreign_key() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain.set_model(ann());

    let post = chain
        .update_or_create_relationship(&db, "posts", &attrs(json!({"title": "Brand new"})), &attrs(json!({"views": 1})))
        .await
        .unwrap();
    assert_eq!(post.get("user_id"), Some(&json!(1)));
    assert_eq!(post.get("views"), Some(&json!(1)));

    chain.reset().set_relationship(Some("posts"));
    let posts = chain.fetch(&db).await.unwrap().into_records();
    assert_eq!(posts.len(), 3);
}

#[tokio::test]
async fn test_many_to_many_upsert_attaches_pivot_row() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain.set_model(ann());

    chain
        .update_or_create_relationship(&db, "roles", &attrs(json!({"name": "writer"})), &Attributes::new())
        .await
        .unwrap();

    chain.set_relationship(Some("roles"));
    let mut names: Vec<Value> = chain
        .fetch(&db)
        .await
        .unwrap()
        .into_records()
        .iter()
        .filter_map(|role| role.get("name").cloned())
        .collect();
    names.sort_by_key(ToString::to_string);
    assert_eq!(names, vec![json!("admin"), json!("writer")]);
}

#[tokio::test]
async fn test_relationship_upsert_needs_a_record() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::new();
    chain.set_model(&User);

    let err = chain
        .update_or_create_relationship(&db, "posts", &attrs(json!({"title": "x"})), &Attributes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidModel(_)));
}

#[tokio::test]
async fn test_fetch_without_upsert_returns_query_rows() {
    let db = setup_seeded_db().await.unwrap();
    let mut chain = EasyModel::hosted_by(&User);
    let Fetched::Many(users) = chain.fetch(&db).await.unwrap() else {
        panic!("expected query rows");
    };
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(Record::exists));
}
