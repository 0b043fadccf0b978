use std::sync::Arc;

use alumni_hub::{
    gateways::{Gateways, UploadedFiles},
    models::ApplicationStatus,
    record::Record,
    store::{MemoryStore, StoreError},
};
use chrono::NaiveDate;
use serde_json::{json, Value};

fn gateways() -> Gateways {
    Gateways::new(Arc::new(MemoryStore::new()))
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn id_of(record: &Record) -> i32 {
    record["id"].as_i64().unwrap() as i32
}

async fn event(gw: &Gateways, title: &str, date: &str, max: Option<i32>) -> Record {
    gw.events
        .create(record(json!({
            "title": title,
            "eventDate": date,
            "maxParticipants": max,
        })))
        .await
        .unwrap()
}

#[tokio::test]
async fn delete_is_idempotent() {
    let gw = gateways();
    let article = gw
        .news
        .create(record(json!({ "title": "Reunion recap" })))
        .await
        .unwrap();
    let id = id_of(&article);

    assert!(gw.news.delete(id).await.unwrap());
    assert!(gw.news.delete(id).await.unwrap());
    assert!(gw.news.find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let gw = gateways();
    let id = id_of(&event(&gw, "Open day", "2030-01-10", None).await);

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let gw = gw.clone();
            tokio::spawn(async move { gw.events.increment_participants(id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let event = gw.events.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(event["currentParticipants"], json!(50));
}

#[tokio::test]
async fn full_events_reject_further_seats() {
    let gw = gateways();
    let id = id_of(&event(&gw, "Alumni dinner", "2030-02-01", Some(2)).await);

    assert!(gw.events.reserve_seat(id).await.unwrap().is_some());
    assert!(gw.events.reserve_seat(id).await.unwrap().is_some());
    assert!(gw.events.reserve_seat(id).await.unwrap().is_none());

    let event = gw.events.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(event["currentParticipants"], json!(2));

    gw.events.release_seat(id).await.unwrap();
    assert!(gw.events.reserve_seat(id).await.unwrap().is_some());
}

#[tokio::test]
async fn filtering_by_status_only_returns_matches() {
    let gw = gateways();
    for (name, email, status) in [
        ("Tan", "tan@example.com", "active"),
        ("Lim", "lim@example.com", "pending"),
        ("Wong", "wong@example.com", "active"),
    ] {
        gw.members
            .create(record(json!({ "name": name, "email": email, "status": status })))
            .await
            .unwrap();
    }

    let active = gw
        .members
        .list(record(json!({ "status": "active" })))
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|m| m["status"] == json!("active")));
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_a_new_row() {
    let gw = gateways();
    let member = json!({ "name": "Tan", "email": "tan@example.com" });
    gw.members.create(record(member.clone())).await.unwrap();

    let err = gw.members.create(record(member)).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { .. }));
    assert_eq!(gw.members.table().count(Record::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn member_defaults_and_stats() {
    let gw = gateways();
    let created = gw
        .members
        .create(record(json!({ "name": "Tan", "email": "tan@example.com", "school": "SMK Taman" })))
        .await
        .unwrap();
    assert_eq!(created["status"], json!("pending"));
    assert_eq!(created["membershipType"], json!("regular"));

    gw.members
        .create(record(json!({ "name": "Lim", "email": "lim@example.com", "school": "SMK Taman", "status": "active" })))
        .await
        .unwrap();
    gw.members
        .create(record(json!({ "name": "Ali", "email": "ali@example.com", "status": "active" })))
        .await
        .unwrap();

    let stats = gw.members.stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.active, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.by_school.get("SMK Taman"), Some(&2));
    assert_eq!(stats.by_school.len(), 1);
}

#[tokio::test]
async fn viewing_news_adds_exactly_one() {
    let gw = gateways();
    let article = gw
        .news
        .create(record(json!({ "title": "Scholarship winners", "published": true, "views": 10 })))
        .await
        .unwrap();
    let id = id_of(&article);

    gw.news.increment_views(id).await.unwrap();
    let article = gw.news.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(article["views"], json!(11));
}

#[tokio::test]
async fn featured_news_is_published_only() {
    let gw = gateways();
    for (title, published) in [("Draft", false), ("Live", true)] {
        gw.news
            .create(record(json!({ "title": title, "featured": true, "published": published })))
            .await
            .unwrap();
    }

    let featured = gw.news.featured(3).await.unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0]["title"], json!("Live"));
    assert_eq!(featured[0]["author"], json!("管理员"));
}

#[tokio::test]
async fn application_status_update_touches_nothing_else() {
    let gw = gateways();
    let scholarship = gw
        .scholarships
        .create(record(json!({ "title": "Merit award", "amount": 1500.0 })))
        .await
        .unwrap();
    let application = gw
        .applications
        .create_with_files(
            record(json!({
                "scholarshipId": id_of(&scholarship),
                "applicantName": "Siti",
                "applicantEmail": "siti@example.com",
                "gpa": 3.85,
            })),
            UploadedFiles {
                transcript: Some("transcript-1.pdf".into()),
                ..UploadedFiles::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(application["status"], json!("pending"));
    assert_eq!(application["transcriptFile"], json!("transcript-1.pdf"));
    assert_eq!(application["incomeProofFile"], Value::Null);

    let updated = gw
        .applications
        .update(id_of(&application), record(json!({ "status": "approved" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["status"], json!("approved"));
    for (field, value) in &application {
        if field != "status" && field != "updatedAt" {
            assert_eq!(&updated[field], value, "{field} changed");
        }
    }

    let approved = gw.applications.by_status(ApplicationStatus::Approved).await.unwrap();
    assert_eq!(approved.len(), 1);
    assert!(gw.applications.by_status(ApplicationStatus::Pending).await.unwrap().is_empty());
}

#[tokio::test]
async fn applications_need_an_existing_scholarship() {
    let gw = gateways();
    let err = gw
        .applications
        .create_with_files(
            record(json!({
                "scholarshipId": 42,
                "applicantName": "Siti",
                "applicantEmail": "siti@example.com",
            })),
            UploadedFiles::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation { .. }));
}

#[tokio::test]
async fn upcoming_events_are_soonest_first_from_today() {
    let gw = gateways();
    event(&gw, "Last year", "2024-12-31", None).await;
    event(&gw, "Later", "2025-03-20", None).await;
    event(&gw, "Sooner", "2025-02-01", None).await;
    let done = event(&gw, "Finished", "2025-02-02", None).await;
    gw.events
        .update(id_of(&done), record(json!({ "status": "completed" })))
        .await
        .unwrap();

    let today = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let upcoming = gw.events.upcoming_from(today, 5).await.unwrap();
    let titles: Vec<_> = upcoming.iter().map(|e| e["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Sooner"), json!("Later")]);

    let limited = gw.events.upcoming_from(today, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn registrations_are_listed_per_event() {
    let gw = gateways();
    let first = id_of(&event(&gw, "Talk", "2030-01-01", None).await);
    let second = id_of(&event(&gw, "Walk", "2030-01-02", None).await);
    let participant = json!({ "participantName": "Tan", "participantEmail": "tan@example.com" });

    let registration = gw
        .registrations
        .create_registration(first, record(participant.clone()))
        .await
        .unwrap();
    gw.registrations
        .create_registration(second, record(participant))
        .await
        .unwrap();

    assert!(registration["registrationNumber"]
        .as_str()
        .unwrap()
        .starts_with("REG"));
    let listed = gw.registrations.by_event(first).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["eventId"], json!(first));
}

#[tokio::test]
async fn contact_messages_start_unread() {
    let gw = gateways();
    let message = gw
        .contact
        .create(record(json!({
            "name": "Lim",
            "email": "lim@example.com",
            "message": "How do I update my details?",
        })))
        .await
        .unwrap();
    assert_eq!(gw.contact.unread().await.unwrap().len(), 1);

    let read = gw.contact.mark_as_read(id_of(&message)).await.unwrap().unwrap();
    assert_eq!(read["status"], json!("read"));
    assert!(gw.contact.unread().await.unwrap().is_empty());
    assert!(gw.contact.mark_as_read(999).await.unwrap().is_none());
}

#[tokio::test]
async fn active_scholarships_exclude_closed_ones() {
    let gw = gateways();
    gw.scholarships
        .create(record(json!({ "title": "Open grant" })))
        .await
        .unwrap();
    gw.scholarships
        .create(record(json!({ "title": "Old grant", "status": "closed" })))
        .await
        .unwrap();

    let active = gw.scholarships.active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["title"], json!("Open grant"));
}

#[tokio::test]
async fn capacity_cannot_drop_below_registered_participants() {
    let gw = gateways();
    let id = id_of(&event(&gw, "Workshop", "2030-03-01", Some(2)).await);
    gw.events.reserve_seat(id).await.unwrap().unwrap();
    gw.events.reserve_seat(id).await.unwrap().unwrap();

    let err = gw
        .events
        .update(id, record(json!({ "maxParticipants": 1 })))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation { .. }));

    let err = gw
        .events
        .create(record(json!({ "title": "Broken", "eventDate": "2030-03-02", "maxParticipants": -3 })))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ConstraintViolation { .. }));

    let event = gw.events.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(event["maxParticipants"], json!(2));
    assert_eq!(event["currentParticipants"], json!(2));
    assert_eq!(gw.events.table().count(Record::new()).await.unwrap(), 1);
}
