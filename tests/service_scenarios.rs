mod support;

use std::fs;

use serde_json::json;
use todovault::auth::AuthOutcome;
use todovault::error::Error;
use todovault::model::{Priority, DEFAULT_GROUP_ID};
use todovault::validate::{LikeRequest, NewGroup, NewTask, TaskPatch, VisitRequest};

use support::{TestStore, PASSWORD, START_MS};

#[test]
fn work_group_scenario_from_raw_payloads() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new();
    let (service, clock) = store.service();

    let group = service.create_group(NewGroup::from_json(&json!({ "name": "Work" }))?)?;
    assert_eq!(group.name, "Work");
    assert_eq!(group.created_at, START_MS);

    let payload = json!({ "text": "Ship release", "groupId": group.id, "priority": "P0" });
    let task = service.create_task(NewTask::from_json(&payload, service.now_ms())?)?;

    let active = service.list_active_tasks()?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].text, "Ship release");
    assert_eq!(active[0].priority, Some(Priority::P0));
    assert!(!active[0].completed);

    clock.advance(60_000);
    let patch = TaskPatch::from_json(&json!({ "completed": true }), service.now_ms())?;
    let done = service.update_task(&task.id, patch)?;
    assert_eq!(done.completed_at, Some(START_MS + 60_000));

    service.soft_delete_task(&task.id)?;
    assert!(service.list_active_tasks()?.is_empty());

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(
        service.storage().tasks_file(),
    )?)?;
    assert_eq!(raw[0]["deleted"], true);
    assert_eq!(raw[0]["id"], task.id.as_str());
    Ok(())
}

#[test]
fn completion_invariant_holds_across_updates() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new();
    let (service, clock) = store.service();
    let task = service.create_task(NewTask::from_json(&json!({ "text": "t" }), START_MS)?)?;

    let patches = [
        json!({ "completed": "true" }),
        json!({ "completedAt": START_MS + 5 }),
        json!({ "completed": false }),
        json!({ "completedAt": START_MS + 7 }),
        json!({ "completed": true, "completedAt": START_MS + 9 }),
        json!({ "createdAt": START_MS + 9 }),
    ];
    for body in patches {
        clock.advance(1);
        let patch = TaskPatch::from_json(&body, service.now_ms())?;
        service.update_task(&task.id, patch)?;
        for t in service.list_active_tasks()? {
            assert!(t.completion_is_consistent(), "after {body}: {t:?}");
        }
    }

    let rejected = TaskPatch::from_json(&json!({ "createdAt": START_MS + 10 }), service.now_ms())?;
    assert!(matches!(
        service.update_task(&task.id, rejected),
        Err(Error::Validation { .. })
    ));
    Ok(())
}

#[test]
fn like_counter_equals_like_set_size() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new();
    let (service, _) = store.service();
    let a = service.create_task(NewTask::from_json(&json!({ "text": "a" }), START_MS)?)?;
    let b = service.create_task(NewTask::from_json(&json!({ "text": "b" }), START_MS)?)?;

    let sequence = [
        (&a.id, "10.0.0.1"),
        (&a.id, "10.0.0.2"),
        (&b.id, "10.0.0.1"),
        (&a.id, "10.0.0.1"),
        (&b.id, "10.0.0.3"),
        (&b.id, "10.0.0.1"),
    ];
    for (task_id, ip) in sequence {
        let request = LikeRequest::from_json(&json!({ "todoId": task_id }))?;
        service.toggle_like(&request.task_id, ip)?;

        let likes = service.storage().load_likes()?;
        for task in service.list_active_tasks()? {
            assert_eq!(task.likes, likes.count(&task.id));
        }
    }

    assert_eq!(service.liked_task_ids("10.0.0.2")?, vec![a.id.clone()]);
    assert_eq!(service.liked_task_ids("10.0.0.3")?, vec![b.id.clone()]);
    Ok(())
}

#[test]
fn group_deletion_moves_exactly_its_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new();
    let (service, _) = store.service();
    let home = service.create_group(NewGroup::from_json(&json!({ "name": "Home" }))?)?;
    let work = service.create_group(NewGroup::from_json(&json!({ "name": "Work" }))?)?;

    for (text, group) in [("w1", &work.id), ("w2", &work.id), ("h1", &home.id)] {
        let payload = json!({ "text": text, "groupId": group });
        service.create_task(NewTask::from_json(&payload, START_MS)?)?;
    }

    assert_eq!(service.delete_group(&work.id)?, 2);

    let tasks = service.list_active_tasks()?;
    let in_default = tasks.iter().filter(|t| t.group() == DEFAULT_GROUP_ID).count();
    assert_eq!(in_default, 2);
    assert_eq!(tasks.iter().filter(|t| t.group() == home.id).count(), 1);

    let ids: Vec<_> = service.list_groups()?.into_iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![DEFAULT_GROUP_ID.to_string(), home.id.clone()]);

    assert!(matches!(
        service.delete_group(DEFAULT_GROUP_ID),
        Err(Error::DefaultGroupProtected)
    ));
    Ok(())
}

#[test]
fn visits_and_auth_attempts() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::new();
    let (service, clock) = store.service();

    service.record_visit(VisitRequest::from_json(&json!({ "isNewVisitor": "TRUE" }))?.is_new_visitor)?;
    service.record_visit(VisitRequest::from_json(&json!({}))?.is_new_visitor)?;
    let stats = service.get_stats()?;
    assert_eq!((stats.pv, stats.uv), (2, 1));

    for _ in 0..5 {
        assert_eq!(service.authenticate("198.51.100.2", "nope"), AuthOutcome::Denied);
    }
    let AuthOutcome::RateLimited(decision) = service.authenticate("198.51.100.2", PASSWORD) else {
        panic!("sixth attempt should be rate limited");
    };
    assert!(decision.reset_time > service.now_ms());
    assert_eq!(decision.retry_after_secs(service.now_ms()), 900);

    clock.advance(15 * 60 * 1000 + 1);
    assert_eq!(service.authenticate("198.51.100.2", PASSWORD), AuthOutcome::Granted);
    Ok(())
}
