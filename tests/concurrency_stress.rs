mod support;

use std::sync::{Arc, Barrier};
use std::thread;

use todovault::error::Error;
use todovault::model::{Priority, DEFAULT_GROUP_ID};
use todovault::validate::{NewGroup, NewTask};

use support::{TestStore, START_MS};

const THREADS: usize = 8;
const OPS_PER_THREAD: usize = 10;

#[test]
fn concurrent_creates_are_not_lost() {
    let store = TestStore::new();
    let (service, _) = store.service();
    let service = Arc::new(service);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for op in 0..OPS_PER_THREAD {
                    service
                        .create_task(NewTask {
                            text: format!("worker {worker} op {op}"),
                            group_id: None,
                            priority: Priority::P2,
                            created_at: START_MS,
                        })
                        .expect("create task");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(
        service.list_active_tasks().expect("list").len(),
        THREADS * OPS_PER_THREAD
    );
}

#[test]
fn concurrent_likes_keep_counter_in_sync() {
    let store = TestStore::new();
    let (service, _) = store.service();
    let task = service
        .create_task(NewTask {
            text: "popular".to_string(),
            group_id: None,
            priority: Priority::P0,
            created_at: START_MS,
        })
        .expect("create task");
    let service = Arc::new(service);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|worker| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let task_id = task.id.clone();
            thread::spawn(move || {
                barrier.wait();
                let ip = format!("10.0.0.{worker}");
                // odd number of toggles leaves each client liking the task
                for _ in 0..3 {
                    service.toggle_like(&task_id, &ip).expect("toggle like");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let likes = service.storage().load_likes().expect("likes");
    let stored = service.storage().load_tasks().expect("tasks");
    assert_eq!(likes.count(&task.id), THREADS as u64);
    assert_eq!(stored[0].likes, THREADS as u64);
}

#[test]
fn tasks_never_point_at_a_deleted_group() {
    let store = TestStore::new();
    let (service, _) = store.service();
    let service = Arc::new(service);

    for round in 0..5 {
        let group = service
            .create_group(NewGroup {
                name: format!("round {round}"),
            })
            .expect("create group");
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                let group_id = group.id.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if worker == 0 {
                        service.delete_group(&group_id).expect("delete group");
                        return;
                    }
                    for op in 0..OPS_PER_THREAD {
                        let created = service.create_task(NewTask {
                            text: format!("worker {worker} op {op}"),
                            group_id: Some(group_id.clone()),
                            priority: Priority::P1,
                            created_at: START_MS,
                        });
                        match created {
                            Ok(_) | Err(Error::NotFound { kind: "group", .. }) => {}
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker panicked");
        }
    }

    let groups: Vec<_> = service
        .list_groups()
        .expect("groups")
        .into_iter()
        .map(|g| g.id)
        .collect();
    assert_eq!(groups, vec![DEFAULT_GROUP_ID.to_string()]);
    for task in service.list_active_tasks().expect("tasks") {
        assert!(groups.iter().any(|id| id == task.group()), "orphan: {task:?}");
    }
}
