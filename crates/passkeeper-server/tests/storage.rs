mod common;

use passkeeper_server::models::{Card, EntityKind, FileMeta, Password, Text};
use passkeeper_server::storage::{
    CardStorage, FileStorage, PasswordStorage, StorageError, TextStorage, UserStorage,
};

#[tokio::test]
async fn test_user_lifecycle() {
    let (_dir, storage) = common::storage().await;

    let created = storage.create_user("a@example.com", "hash").await.unwrap();
    assert!(created.id > 0);

    let found = storage.user_by_email("a@example.com").await.unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.password_hash, "hash");

    let err = storage.create_user("a@example.com", "other").await.unwrap_err();
    assert!(matches!(err, StorageError::UserAlreadyExists));

    let err = storage.user_by_email("nobody@example.com").await.unwrap_err();
    assert!(matches!(err, StorageError::UserNotExist));
}

#[tokio::test]
async fn test_secrets_are_scoped_to_owner() {
    let (_dir, storage) = common::storage().await;
    let alice = common::user(&storage, "alice@example.com").await;
    let bob = common::user(&storage, "bob@example.com").await;

    let id = storage
        .add_password(&Password {
            owner_id: alice,
            login: "alice".into(),
            password: "pw".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(storage.passwords(alice).await.unwrap().len(), 1);
    assert!(storage.passwords(bob).await.unwrap().is_empty());

    // Bob cannot touch Alice's row.
    let err = storage.delete_password(id, bob).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::EntityNotExist {
            kind: EntityKind::Password,
            ..
        }
    ));
    let err = storage
        .update_password(&Password {
            id,
            owner_id: bob,
            login: "mallory".into(),
            password: "pw".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::EntityNotExist { .. }));

    let stored = &storage.passwords(alice).await.unwrap()[0];
    assert_eq!(stored.login, "alice");
    assert_eq!(stored.owner_id, alice);
    assert!(stored.created_at.is_some());
}

#[tokio::test]
async fn test_card_and_text_round_trip_fields() {
    let (_dir, storage) = common::storage().await;
    let owner = common::user(&storage, "c@example.com").await;

    let card_id = storage
        .add_card(&Card {
            owner_id: owner,
            number: "4111111111111111".into(),
            cvc: "123".into(),
            holder: "C HOLDER".into(),
            expiry: "12/30".into(),
            metadata: "visa".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let text_id = storage
        .add_text(&Text {
            owner_id: owner,
            body: "remember the milk".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let cards = storage.cards(owner).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, card_id);
    assert_eq!(cards[0].holder, "C HOLDER");
    assert_eq!(cards[0].metadata, "visa");

    storage
        .update_text(&Text {
            id: text_id,
            owner_id: owner,
            body: "remember the bread".into(),
            metadata: "edited".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let texts = storage.texts(owner).await.unwrap();
    assert_eq!(texts[0].body, "remember the bread");
    assert_eq!(texts[0].metadata, "edited");

    storage.delete_card(card_id, owner).await.unwrap();
    storage.delete_text(text_id, owner).await.unwrap();
    assert!(storage.cards(owner).await.unwrap().is_empty());
    assert!(storage.texts(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_files_hidden_until_uploaded() {
    let (_dir, storage) = common::storage().await;
    let owner = common::user(&storage, "f@example.com").await;

    let id = storage
        .add_file(&FileMeta {
            owner_id: owner,
            filename: "report.pdf".into(),
            metadata: "q3".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(storage.files(owner).await.unwrap().is_empty());
    let pending = storage.file(id, owner).await.unwrap();
    assert!(!pending.uploaded);
    assert_eq!(pending.filename, "report.pdf");

    storage.mark_file_uploaded(id, owner).await.unwrap();
    let files = storage.files(owner).await.unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].uploaded);

    storage.delete_file(id, owner).await.unwrap();
    assert!(matches!(
        storage.file(id, owner).await.unwrap_err(),
        StorageError::FileNotExist
    ));
    assert!(matches!(
        storage.delete_file(id, owner).await.unwrap_err(),
        StorageError::FileNotExist
    ));
}

#[tokio::test]
async fn test_file_lookup_requires_owner() {
    let (_dir, storage) = common::storage().await;
    let alice = common::user(&storage, "alice@example.com").await;
    let bob = common::user(&storage, "bob@example.com").await;

    let id = storage
        .add_file(&FileMeta {
            owner_id: alice,
            filename: "a.txt".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(matches!(
        storage.file(id, bob).await.unwrap_err(),
        StorageError::FileNotExist
    ));
    assert!(matches!(
        storage.mark_file_uploaded(id, bob).await.unwrap_err(),
        StorageError::FileNotExist
    ));
}

#[tokio::test]
async fn test_schema_migration_is_idempotent() {
    let (_dir, storage) = common::storage().await;
    storage.migrate().await.unwrap();
    storage.migrate().await.unwrap();
}
