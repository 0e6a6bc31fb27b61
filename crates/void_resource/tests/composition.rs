//! Chain and group composition tests

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use void_resource::*;

/// The continuation runs once the dependency succeeds and the chain
/// completes with the wrapped result
#[test]
fn test_chain_runs_after_dependency() {
    common::init_logging();
    let mut rm = ResourceManager::default();
    let dep = rm.create_operation::<u32>();

    let chain = rm
        .create_chain_operation(dep, |rm, dep| {
            let value = rm.result(dep).ok().flatten().map_or(0, |v| *v);
            rm.create_completed_operation(format!("value {value}"))
        })
        .unwrap();

    // The chain holds its own reference to the dependency
    assert_eq!(rm.reference_count(dep), 2);
    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Running);

    rm.complete(dep, 7).unwrap();
    rm.update(0.0);

    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Succeeded);
    assert_eq!(rm.result(chain).unwrap().unwrap().as_str(), "value 7");
}

/// A failed dependency skips the continuation
#[test]
fn test_chain_skips_continuation_on_failed_dependency() {
    let mut rm = ResourceManager::default();
    let dep = rm.create_operation::<u32>();
    let called = Rc::new(Cell::new(false));

    let flag = called.clone();
    let chain = rm
        .create_chain_operation(dep, move |rm, _| {
            flag.set(true);
            rm.create_completed_operation(0u32)
        })
        .unwrap();

    rm.fail(dep, ResourceError::Failed("missing".into())).unwrap();
    rm.update(0.0);

    assert!(!called.get());
    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Failed);
    assert!(matches!(
        rm.error(chain).unwrap(),
        Some(ResourceError::DependencyFailed { .. })
    ));
}

/// A tolerant chain runs regardless of the dependency outcome
#[test]
fn test_tolerant_chain_runs_on_failed_dependency() {
    let mut rm = ResourceManager::default();
    let dep = rm.create_failed_operation::<u32>(ResourceError::Failed("missing".into()));

    let chain = rm
        .create_chain_operation_with(dep, ChainOptions::tolerant(), |rm, dep| {
            let failed = rm.status(dep).map_or(false, |s| s == OperationStatus::Failed);
            rm.create_completed_operation(failed)
        })
        .unwrap();
    rm.update(0.0);

    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Succeeded);
    assert!(*rm.result(chain).unwrap().unwrap());
}

/// A wrapped failure propagates to the chain
#[test]
fn test_chain_forwards_wrapped_failure() {
    let mut rm = ResourceManager::default();
    let dep = rm.create_completed_operation(1u32);
    let inner = rm.create_operation::<String>();

    let chain = rm.create_chain_operation(dep, move |_, _| inner).unwrap();
    rm.update(0.0);
    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Running);

    rm.fail(inner, ResourceError::Failed("inner".into())).unwrap();
    rm.update(0.0);

    assert_eq!(rm.status(chain).unwrap(), OperationStatus::Failed);
    assert_eq!(rm.error(chain).unwrap(), Some(ResourceError::Failed("inner".into())));
}

/// Releasing a chain releases what it holds
#[test]
fn test_chain_release_cascades() {
    let mut rm = ResourceManager::default();
    let dep = rm.create_completed_operation(1u32);
    let wrapped = Rc::new(Cell::new(None));

    let sink = wrapped.clone();
    let chain = rm
        .create_chain_operation(dep, move |rm, _| {
            let handle = rm.create_completed_operation(2u32);
            sink.set(Some(handle));
            handle
        })
        .unwrap();
    rm.update(0.0);
    rm.release(dep).unwrap();

    let wrapped = wrapped.get().unwrap();
    assert!(rm.is_valid(dep));
    assert!(rm.is_valid(wrapped));
    assert_eq!(rm.dependencies(chain), vec![dep.untyped(), wrapped.untyped()]);

    rm.release(chain).unwrap();
    assert!(!rm.is_valid(dep));
    assert!(!rm.is_valid(wrapped));
    assert_eq!(rm.pool_stats().live, 0);
}

/// A group completes only after every member is terminal
#[test]
fn test_group_waits_for_all_members() {
    let mut rm = ResourceManager::default();
    let members: Vec<Handle<u32>> = (0..4).map(|_| rm.create_operation()).collect();
    let raw: Vec<UntypedHandle> = members.iter().map(|h| h.untyped()).collect();

    let group = rm.create_group_operation(&raw, GroupOptions::default()).unwrap();

    for (i, member) in members.iter().take(3).enumerate() {
        rm.complete(*member, i as u32).unwrap();
    }
    rm.update(0.0);
    assert_eq!(rm.status(group).unwrap(), OperationStatus::Running);
    assert!((rm.percent_complete(group) - 0.75).abs() < 1e-6);

    rm.complete(members[3], 3).unwrap();
    rm.update(0.0);
    assert_eq!(rm.status(group).unwrap(), OperationStatus::Succeeded);
    assert_eq!(*rm.result(group).unwrap().unwrap(), raw);
}

/// Failed members do not fail a default group
#[test]
fn test_group_succeeds_with_failed_member() {
    let mut rm = ResourceManager::default();
    let ok = rm.create_completed_operation(1u32);
    let bad = rm.create_failed_operation::<u32>(ResourceError::Failed("bad".into()));

    let group = rm
        .create_group_operation(&[ok.untyped(), bad.untyped()], GroupOptions::default())
        .unwrap();
    rm.update(0.0);

    assert_eq!(rm.status(group).unwrap(), OperationStatus::Succeeded);
}

/// A fail-fast group fails on the first failed member
#[test]
fn test_fail_fast_group() {
    let mut rm = ResourceManager::default();
    let slow = rm.create_operation::<u32>();
    let bad = rm.create_operation::<u32>();

    let group = rm
        .create_group_operation(&[slow.untyped(), bad.untyped()], GroupOptions { fail_fast: true })
        .unwrap();

    rm.fail(bad, ResourceError::Failed("bad".into())).unwrap();
    rm.update(0.0);

    assert_eq!(rm.status(group).unwrap(), OperationStatus::Failed);
    assert!(matches!(
        rm.error(group).unwrap(),
        Some(ResourceError::DependencyFailed { .. })
    ));

    // Later completions are ignored
    rm.complete(slow, 1).unwrap();
    rm.update(0.0);
    assert_eq!(rm.status(group).unwrap(), OperationStatus::Failed);
}

/// The same operation listed twice counts once in aggregated progress
#[test]
fn test_group_counts_duplicate_member_once() {
    let mut rm = ResourceManager::default();
    let members: Vec<UntypedHandle> = (0..4)
        .map(|_| {
            let handle = rm.create_operation::<u32>();
            rm.set_download_status(handle, 0, 1000);
            handle.untyped()
        })
        .collect();
    let mut listed = members.clone();
    listed.push(members[0]);

    let group = rm.create_group_operation(&listed, GroupOptions::default()).unwrap();
    let status = rm.download_status(group);
    assert_eq!(status.total_bytes, 4000);
    assert_eq!(status.downloaded_bytes, 0);

    rm.complete(members[0].typed::<u32>(), 0).unwrap();
    let status = rm.download_status(group);
    assert_eq!(status.total_bytes, 4000);
    assert_eq!(status.downloaded_bytes, 1000);
    assert!((rm.percent_complete(group) - 0.25).abs() < 1e-6);
}

/// The per-item callback sees members in completion order
#[test]
fn test_group_item_callback() {
    let mut rm = ResourceManager::default();
    let a = rm.create_operation::<u32>();
    let b = rm.create_operation::<u32>();
    let c = rm.create_operation::<u32>();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    let group = rm
        .create_group_operation_with_callback(
            &[a.untyped(), b.untyped(), c.untyped()],
            GroupOptions::default(),
            move |_, index, member| sink.borrow_mut().push((index, member)),
        )
        .unwrap();

    rm.complete(c, 3).unwrap();
    rm.complete(a, 1).unwrap();
    rm.update(0.0);
    assert_eq!(*seen.borrow(), vec![(2, c.untyped()), (0, a.untyped())]);

    rm.complete(b, 2).unwrap();
    rm.update(0.0);
    assert_eq!(seen.borrow().len(), 3);
    assert_eq!(rm.status(group).unwrap(), OperationStatus::Succeeded);
}

/// A group keeps its members alive until it is released
#[test]
fn test_group_owns_member_references() {
    let mut rm = ResourceManager::default();
    let a = rm.create_completed_operation(1u32);
    let b = rm.create_completed_operation(2u32);

    let group = rm
        .create_group_operation(&[a.untyped(), b.untyped()], GroupOptions::default())
        .unwrap();
    rm.release(a).unwrap();
    rm.release(b).unwrap();
    assert!(rm.is_valid(a));
    assert!(rm.is_valid(b));
    assert_eq!(rm.group_members(group), vec![a.untyped(), b.untyped()]);

    rm.release(group).unwrap();
    assert!(!rm.is_valid(a));
    assert!(!rm.is_valid(b));
}
