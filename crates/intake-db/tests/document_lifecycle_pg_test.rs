//! PostgreSQL integration tests for the document lifecycle writes.
//!
//! Verifies against a real database that:
//! 1. Claiming is a compare-and-swap (a second claim is rejected)
//! 2. Committing a run assigns gapless versions and flips the document to ready
//! 3. A commit for a document that is not analysing writes nothing
//! 4. Client lookup is case-insensitive and treats LIKE wildcards literally
//!    and concurrent first intakes for a new client share one row
//! 5. The stale sweep fails only old in-flight runs

use chrono::{Duration, Utc};
use intake_db::test_fixtures::{seed_document, seed_owner, try_connect_test_database};
use intake_db::{
    AnalysisOutcome, AnalysisRepository, ClientRepository, DocumentRepository, DocumentStatus,
    Error, QaBlock,
};

fn outcome(question: &str) -> AnalysisOutcome {
    AnalysisOutcome {
        structured_result: vec![QaBlock {
            question: question.to_string(),
            original_response: "We sell boots".to_string(),
            improved_response: "Premium outdoor footwear retailer".to_string(),
            recommendations: vec!["Lead with durability".to_string()],
            flags: vec![],
        }],
        summary: "Para one.\n\nPara two.".to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_claim_is_compare_and_swap() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Claim Co").await.unwrap();
    let doc = seed_document(&db, &seed, "form.pdf").await.unwrap();

    let first = db.documents.claim_for_analysis(doc.id).await.unwrap();
    let second = db.documents.claim_for_analysis(doc.id).await.unwrap();

    assert_eq!(first.unwrap().status, DocumentStatus::Analysing);
    assert!(second.is_none());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_commit_run_versions_and_ready() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Version Co").await.unwrap();
    let doc = seed_document(&db, &seed, "form.docx").await.unwrap();

    db.documents.claim_for_analysis(doc.id).await.unwrap();
    let v1 = db.analyses.commit_run(doc.id, &outcome("first")).await.unwrap();
    assert_eq!(v1.version, 1);
    assert_eq!(
        db.documents.get(doc.id).await.unwrap().unwrap().status,
        DocumentStatus::Ready
    );

    db.documents.claim_for_analysis(doc.id).await.unwrap();
    let v2 = db.analyses.commit_run(doc.id, &outcome("second")).await.unwrap();
    assert_eq!(v2.version, 2);

    let history = db.analyses.list_for_document(doc.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].version, 2);
    assert_eq!(history[1], v1);
    assert_eq!(history[1].structured_result, outcome("first").structured_result);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_commit_without_claim_writes_nothing() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Conflict Co").await.unwrap();
    let doc = seed_document(&db, &seed, "form.pdf").await.unwrap();

    let err = db.analyses.commit_run(doc.id, &outcome("q")).await.unwrap_err();

    assert!(matches!(err, Error::Conflict(_)));
    assert!(db.analyses.latest(doc.id).await.unwrap().is_none());
    assert_eq!(
        db.documents.get(doc.id).await.unwrap().unwrap().status,
        DocumentStatus::Uploading
    );
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_client_lookup_is_case_insensitive_and_literal() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Acme_Ltd").await.unwrap();

    let same = db
        .clients
        .find_or_create(seed.user_id, "ACME_LTD")
        .await
        .unwrap();
    assert_eq!(same.id, seed.client.id);

    // '_' must not act as a single-character wildcard
    let other = db
        .clients
        .find_by_name(seed.user_id, "AcmeXLtd")
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_concurrent_find_or_create_shares_one_client() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Seed Co").await.unwrap();

    let (a, b) = tokio::join!(
        db.clients.find_or_create(seed.user_id, "Race Co"),
        db.clients.find_or_create(seed.user_id, "RACE CO"),
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);

    let err = db
        .clients
        .create(seed.user_id, "race co")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_stale_sweep_only_fails_old_runs() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Sweep Co").await.unwrap();
    let old = seed_document(&db, &seed, "old.pdf").await.unwrap();
    let fresh = seed_document(&db, &seed, "fresh.pdf").await.unwrap();

    db.documents.claim_for_analysis(old.id).await.unwrap();
    db.documents.claim_for_analysis(fresh.id).await.unwrap();
    sqlx::query("UPDATE documents SET status_changed_at = $2 WHERE id = $1")
        .bind(old.id)
        .bind(Utc::now() - Duration::minutes(30))
        .execute(&db.pool)
        .await
        .unwrap();

    let failed = db
        .documents
        .fail_stale_analyses(Utc::now() - Duration::minutes(5), "run timed out")
        .await
        .unwrap();

    assert!(failed.contains(&old.id));
    assert!(!failed.contains(&fresh.id));
    let old = db.documents.get(old.id).await.unwrap().unwrap();
    assert_eq!(old.status, DocumentStatus::Error);
    assert_eq!(old.error_message.as_deref(), Some("run timed out"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn test_mark_error_skips_ready_documents() {
    let db = try_connect_test_database().await.unwrap();
    let seed = seed_owner(&db, "Late Co").await.unwrap();
    let doc = seed_document(&db, &seed, "form.pdf").await.unwrap();

    db.documents.claim_for_analysis(doc.id).await.unwrap();
    db.analyses.commit_run(doc.id, &outcome("q")).await.unwrap();

    assert!(!db.documents.mark_error(doc.id, "late").await.unwrap());
    assert_eq!(
        db.documents.get(doc.id).await.unwrap().unwrap().status,
        DocumentStatus::Ready
    );
}
