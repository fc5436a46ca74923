use std::collections::BTreeMap;

use super::*;
use crate::Error;
use crate::TopoError;

fn tablet(uid: u32) -> Tablet {
    Tablet {
        alias: TabletAlias::new("cell1", uid),
        keyspace: "ks".to_string(),
        shard: "0".to_string(),
        tablet_type: TabletType::Replica,
        tags: BTreeMap::from([("owner".to_string(), "ops".to_string())]),
        ..Default::default()
    }
}

#[tokio::test]
async fn get_missing_tablet_is_not_found() {
    let ts = MemoryTopoServer::new();
    let alias = TabletAlias::new("cell1", 1);

    let err = ts.get_tablet(&alias).await.unwrap_err();
    assert!(matches!(err, Error::Topo(TopoError::NotFound { alias: a }) if a == alias));
}

#[tokio::test]
async fn update_fields_bumps_version_and_keeps_other_fields() {
    let ts = MemoryTopoServer::new();
    ts.create_tablet(tablet(1));
    let alias = TabletAlias::new("cell1", 1);
    let before = ts.get_tablet(&alias).await.unwrap();

    ts.update_tablet_fields(
        &alias,
        Box::new(|t: &mut Tablet| -> crate::Result<()> {
            t.hostname = "host-a".to_string();
            Ok(())
        }),
    )
    .await
    .unwrap();

    let after = ts.get_tablet(&alias).await.unwrap();
    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.tablet.hostname, "host-a");
    assert_eq!(after.tablet.tags, before.tablet.tags);
    assert_eq!(after.tablet.keyspace, "ks");
}

#[tokio::test]
async fn failing_mutator_leaves_record_untouched() {
    let ts = MemoryTopoServer::new();
    ts.create_tablet(tablet(1));
    let alias = TabletAlias::new("cell1", 1);

    let result = ts
        .update_tablet_fields(
            &alias,
            Box::new(|t: &mut Tablet| -> crate::Result<()> {
                t.hostname = "half-written".to_string();
                Err(TopoError::Validation("refused".into()).into())
            }),
        )
        .await;

    assert!(result.is_err());
    let stored = ts.get_tablet(&alias).await.unwrap();
    assert_eq!(stored.version, 1);
    assert!(stored.tablet.hostname.is_empty());
}

#[tokio::test]
async fn update_tablet_rejects_stale_version() {
    let ts = MemoryTopoServer::new();
    ts.create_tablet(tablet(1));
    let alias = TabletAlias::new("cell1", 1);
    let stale = ts.get_tablet(&alias).await.unwrap();

    let fresh = ts.update_tablet(&stale).await.unwrap();
    assert_eq!(fresh, 2);

    assert!(ts.update_tablet(&stale).await.is_err());
}

#[tokio::test]
async fn endpoints_are_keyed_by_cell_keyspace_shard_type() {
    let ts = MemoryTopoServer::new();
    let ep = EndPoint {
        uid: 7,
        host: "host-a".to_string(),
        port_map: BTreeMap::from([("vt".to_string(), 15000)]),
    };

    ts.update_tablet_endpoint("cell1", "ks", "0", TabletType::Replica, &ep)
        .await
        .unwrap();
    // publishing twice keeps a single entry per uid
    ts.update_tablet_endpoint("cell1", "ks", "0", TabletType::Replica, &ep)
        .await
        .unwrap();

    assert_eq!(ts.serving_end_points("cell1", "ks", "0", TabletType::Replica), vec![ep]);
    assert!(ts.serving_end_points("cell1", "ks", "0", TabletType::Rdonly).is_empty());
}

#[tokio::test]
async fn validate_rejects_unassigned_serving_tablet() {
    let ts = MemoryTopoServer::new();
    let mut t = tablet(1);
    t.keyspace.clear();
    ts.create_tablet(t);

    let err = ts.validate_tablet(&TabletAlias::new("cell1", 1)).await.unwrap_err();
    assert!(matches!(err, Error::Topo(TopoError::Validation(_))));
}

#[tokio::test]
async fn delete_tablet_reports_existence() {
    let ts = MemoryTopoServer::new();
    ts.create_tablet(tablet(1));
    let alias = TabletAlias::new("cell1", 1);

    assert!(ts.delete_tablet(&alias));
    assert!(!ts.delete_tablet(&alias));
}
