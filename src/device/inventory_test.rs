use std::collections::HashMap;
use std::sync::Arc;

use mockall::predicate::eq;
use mockall::Sequence;

use super::*;
use crate::MockBackendClient;

fn device_info(id: &str) -> DeviceInfo {
    DeviceInfo {
        id: id.to_string(),
        device_type: "mock".to_string(),
        options: HashMap::new(),
        device: Arc::new(MockDevice::new()),
    }
}

#[test]
fn test_inventory_mirrors_sorted_ids_to_backend() {
    let mut client = MockBackendClient::new();
    let mut seq = Sequence::new();
    client
        .expect_set_managed_devices()
        .with(eq(vec!["b".to_string()]))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    client
        .expect_set_managed_devices()
        .with(eq(vec!["a".to_string(), "b".to_string()]))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    client
        .expect_set_managed_devices()
        .with(eq(vec!["a".to_string()]))
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let inventory = DatasourceInventory::new(Arc::new(client));
    inventory.add(device_info("b")).unwrap();
    inventory.add(device_info("a")).unwrap();
    inventory.delete("b").unwrap();

    assert!(inventory.get("a").is_some());
    assert!(inventory.get("b").is_none());
    assert_eq!(inventory.list().len(), 1);
}

#[test]
fn test_inventory_ignores_duplicate_add() {
    let mut client = MockBackendClient::new();
    client.expect_set_managed_devices().times(1).return_const(());

    let inventory = DatasourceInventory::new(Arc::new(client));
    inventory.add(device_info("a")).unwrap();
    inventory.add(device_info("a")).unwrap();

    assert_eq!(inventory.list().len(), 1);
}
