//! Workflow tests against a real database
//!
//! Each test gets a fresh database from `#[sqlx::test]` with the crate's
//! migrations applied. Run with `DATABASE_URL` pointing at a Postgres server
//! and `cargo test -- --ignored`.

use metal_erp_backend::services::inventory::{CountItemInput, CreateInventoryInput};
use metal_erp_backend::services::purchase::{
    CreatePurchaseInput, PurchaseItemInput, ReceiveItemInput, UpdatePurchaseItemInput,
};
use metal_erp_backend::services::write_off::{
    CreateWriteOffInput, UpdateWriteOffItemInput, WriteOffItemInput,
};
use metal_erp_backend::services::{
    CatalogService, InventoryService, PurchaseService, RejectInput, WriteOffService,
};
use metal_erp_backend::AppError;
use rust_decimal::Decimal;
use shared::{
    Dimensions, InventoryStatus, OpenPurchaseStatus, PurchaseItemStatus, PurchaseStatus,
    WorkflowError, WriteOffStatus,
};
use sqlx::PgPool;
use uuid::Uuid;

struct Catalog {
    supplier_id: Uuid,
    material_item_id: Uuid,
}

async fn seed_catalog(pool: &PgPool) -> Catalog {
    let supplier_id =
        sqlx::query_scalar::<_, Uuid>("INSERT INTO suppliers (name) VALUES ('Steel Works') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
    let material_item_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO material_items (name, metal_brand) VALUES ('Sheet', 'S235') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    Catalog {
        supplier_id,
        material_item_id,
    }
}

async fn seed_material(pool: &PgPool, catalog: &Catalog, quantity: i32, price: Option<Decimal>) -> Uuid {
    let material_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO materials (material_item_id, quantity) VALUES ($1, $2) RETURNING id",
    )
    .bind(catalog.material_item_id)
    .bind(quantity)
    .fetch_one(pool)
    .await
    .unwrap();

    if let Some(price) = price {
        sqlx::query("INSERT INTO material_prices (material_id, tier, price_per_unit) VALUES ($1, 1, $2)")
            .bind(material_id)
            .bind(price)
            .execute(pool)
            .await
            .unwrap();
    }

    material_id
}

async fn quantity_of(pool: &PgPool, material_id: Uuid) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT quantity FROM materials WHERE id = $1")
        .bind(material_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn material_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM materials")
        .fetch_one(pool)
        .await
        .unwrap()
}

fn purchase_line(catalog: &Catalog, ordered: i32, price: Decimal) -> PurchaseItemInput {
    PurchaseItemInput {
        material_item_id: catalog.material_item_id,
        ordered_quantity: ordered,
        price_per_unit: price,
        dimensions: Dimensions {
            thickness: Some(Decimal::new(2, 0)),
            width: Some(Decimal::new(1250, 0)),
            length: Some(Decimal::new(2500, 0)),
        },
    }
}

fn new_purchase(catalog: &Catalog, number: &str, items: Vec<PurchaseItemInput>) -> CreatePurchaseInput {
    CreatePurchaseInput {
        purchase_number: number.to_string(),
        supplier_id: catalog.supplier_id,
        purchase_date: None,
        comment: None,
        items,
    }
}

fn new_write_off(number: &str) -> CreateWriteOffInput {
    CreateWriteOffInput {
        write_off_number: number.to_string(),
        write_off_date: None,
        reason: Some("Damaged during handling".to_string()),
    }
}

fn write_off_line(material_id: Uuid, quantity: i32) -> WriteOffItemInput {
    WriteOffItemInput {
        material_id,
        quantity,
        comment: None,
    }
}

fn reject(reason: &str) -> RejectInput {
    RejectInput {
        reason: reason.to_string(),
    }
}

// ============================================================================
// Purchases
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_received_purchase_opens_one_lot_per_line(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(
            &catalog,
            "PO-1",
            vec![
                purchase_line(&catalog, 10, Decimal::new(1250, 2)),
                purchase_line(&catalog, 5, Decimal::new(300, 2)),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(purchase.purchase.total_amount, Decimal::new(14000, 2));
    assert_eq!(purchase.purchase.status, PurchaseStatus::InProcess);

    let purchase_id = purchase.purchase.id;
    for item in &purchase.items {
        service
            .receive_item(
                purchase_id,
                item.id,
                ReceiveItemInput {
                    received_quantity: item.ordered_quantity,
                },
            )
            .await
            .unwrap();
    }

    let received = service.submit_purchase(purchase_id).await.unwrap();
    assert_eq!(received.purchase.status, PurchaseStatus::Received);
    assert!(received.purchase.received_at.is_some());
    assert_eq!(material_count(&pool).await, 2);

    let catalog_service = CatalogService::new(pool.clone());
    for item in &received.items {
        assert_eq!(item.status, PurchaseItemStatus::Received);
        let material_id = item.material_id.unwrap();
        let material = catalog_service.get_material(material_id).await.unwrap();
        assert_eq!(material.quantity, item.received_quantity);
        assert_eq!(material.dimensions, item.dimensions);

        let prices = catalog_service.material_prices(material_id).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].tier, 1);
        assert_eq!(prices[0].price_per_unit, item.price_per_unit);
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_partial_receipt_blocks_submission(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(
            &catalog,
            "PO-2",
            vec![purchase_line(&catalog, 10, Decimal::new(1250, 2))],
        ))
        .await
        .unwrap();
    let item_id = purchase.items[0].id;

    let partial = service
        .receive_item(
            purchase.purchase.id,
            item_id,
            ReceiveItemInput {
                received_quantity: 7,
            },
        )
        .await
        .unwrap();
    assert_eq!(partial.items[0].status, PurchaseItemStatus::Ready);

    let err = service.submit_purchase(purchase.purchase.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Workflow(WorkflowError::NotFullyReceived { ref item_ids }) if item_ids == &vec![item_id]
    ));
    assert_eq!(material_count(&pool).await, 0);

    let over = service
        .receive_item(
            purchase.purchase.id,
            item_id,
            ReceiveItemInput {
                received_quantity: 11,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(over, AppError::Workflow(WorkflowError::OverReceipt { .. })));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_received_purchase_is_frozen(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(
            &catalog,
            "PO-3",
            vec![purchase_line(&catalog, 4, Decimal::new(100, 2))],
        ))
        .await
        .unwrap();
    let purchase_id = purchase.purchase.id;
    let item_id = purchase.items[0].id;

    service
        .update_status(purchase_id, OpenPurchaseStatus::Launch)
        .await
        .unwrap();
    service
        .receive_item(purchase_id, item_id, ReceiveItemInput { received_quantity: 4 })
        .await
        .unwrap();
    service.submit_purchase(purchase_id).await.unwrap();

    let err = service
        .update_status(purchase_id, OpenPurchaseStatus::Planning)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));

    let err = service
        .update_item(
            purchase_id,
            item_id,
            UpdatePurchaseItemInput {
                ordered_quantity: Some(8),
                price_per_unit: None,
                thickness: None,
                width: None,
                length: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(WorkflowError::NotEditable { .. })));

    let err = service.submit_purchase(purchase_id).await.unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));
    assert_eq!(material_count(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_purchase_number(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    service
        .create_purchase(new_purchase(&catalog, "PO-DUP", Vec::new()))
        .await
        .unwrap();
    let err = service
        .create_purchase(new_purchase(&catalog, "PO-DUP", Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_removing_a_line_updates_total(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(
            &catalog,
            "PO-4",
            vec![
                purchase_line(&catalog, 10, Decimal::new(200, 2)),
                purchase_line(&catalog, 1, Decimal::new(300, 2)),
            ],
        ))
        .await
        .unwrap();
    let purchase_id = purchase.purchase.id;
    assert_eq!(purchase.purchase.total_amount, Decimal::new(2300, 2));

    let bulk_line = purchase
        .items
        .iter()
        .find(|item| item.ordered_quantity == 10)
        .unwrap()
        .id;
    let trimmed = service.remove_item(purchase_id, bulk_line).await.unwrap();
    assert_eq!(trimmed.items.len(), 1);
    assert_eq!(trimmed.purchase.total_amount, Decimal::new(300, 2));

    let err = service.remove_item(purchase_id, bulk_line).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    service.delete_purchase(purchase_id).await.unwrap();
    let err = service.get_purchase(purchase_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let lines = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchase_items")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lines, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_material_item_not_found(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(&catalog, "PO-5", Vec::new()))
        .await
        .unwrap();

    let mut line = purchase_line(&catalog, 3, Decimal::new(100, 2));
    line.material_item_id = Uuid::new_v4();
    let err = service
        .add_item(purchase.purchase.id, line)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref what) if what == "Material item"));

    let unchanged = service.get_purchase(purchase.purchase.id).await.unwrap();
    assert!(unchanged.items.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_oversized_total_is_a_validation_error(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let service = PurchaseService::new(pool.clone());

    let purchase = service
        .create_purchase(new_purchase(&catalog, "PO-6", Vec::new()))
        .await
        .unwrap();

    let err = service
        .add_item(
            purchase.purchase.id,
            purchase_line(&catalog, 1_000_000_000, Decimal::new(1_000_000, 0)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "total_amount"));

    let unchanged = service.get_purchase(purchase.purchase.id).await.unwrap();
    assert!(unchanged.items.is_empty());
    assert_eq!(unchanged.purchase.total_amount, Decimal::ZERO);
}

// ============================================================================
// Inventories
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_inventory_approval_overwrites_quantities(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let counted = seed_material(&pool, &catalog, 10, None).await;
    let unchanged = seed_material(&pool, &catalog, 5, None).await;
    let service = InventoryService::new(pool.clone());

    let inventory = service
        .create_inventory(CreateInventoryInput {
            inventory_number: "INV-1".to_string(),
            inventory_date: None,
            comment: None,
        })
        .await
        .unwrap();
    assert_eq!(inventory.items.len(), 2);
    let inventory_id = inventory.inventory.id;

    // Lots arriving after the snapshot are not part of the count
    let late_lot = seed_material(&pool, &catalog, 7, None).await;

    for item in &inventory.items {
        let actual_quantity = if item.material_id == counted { 8 } else { 5 };
        service
            .count_item(
                inventory_id,
                item.id,
                CountItemInput {
                    actual_quantity,
                    comment: None,
                },
            )
            .await
            .unwrap();
    }

    let submitted = service.submit_inventory(inventory_id).await.unwrap();
    assert_eq!(submitted.inventory.status, InventoryStatus::Pending);
    assert_eq!(submitted.summary.mismatched_items, 1);
    assert_eq!(submitted.summary.shortage, 2);

    let approved = service.approve_inventory(inventory_id).await.unwrap();
    assert_eq!(approved.inventory.status, InventoryStatus::Approved);
    assert!(approved.inventory.approved_at.is_some());
    assert_eq!(quantity_of(&pool, counted).await, 8);
    assert_eq!(quantity_of(&pool, unchanged).await, 5);
    assert_eq!(quantity_of(&pool, late_lot).await, 7);

    let err = service.approve_inventory(inventory_id).await.unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));
    let err = service.delete_inventory(inventory_id).await.unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_inventory_needs_every_count(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    seed_material(&pool, &catalog, 10, None).await;
    seed_material(&pool, &catalog, 4, None).await;
    let service = InventoryService::new(pool.clone());

    let inventory = service
        .create_inventory(CreateInventoryInput {
            inventory_number: "INV-2".to_string(),
            inventory_date: None,
            comment: None,
        })
        .await
        .unwrap();
    let inventory_id = inventory.inventory.id;
    service
        .count_item(
            inventory_id,
            inventory.items[0].id,
            CountItemInput {
                actual_quantity: 0,
                comment: Some("Nothing on the rack".to_string()),
            },
        )
        .await
        .unwrap();

    let err = service.submit_inventory(inventory_id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Workflow(WorkflowError::MissingActualQuantity { ref item_ids })
            if item_ids == &vec![inventory.items[1].id]
    ));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_rejected_inventory_is_recounted(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 10, None).await;
    let service = InventoryService::new(pool.clone());

    let inventory = service
        .create_inventory(CreateInventoryInput {
            inventory_number: "INV-3".to_string(),
            inventory_date: None,
            comment: None,
        })
        .await
        .unwrap();
    let inventory_id = inventory.inventory.id;
    let item_id = inventory.items[0].id;

    let count = |actual_quantity| CountItemInput {
        actual_quantity,
        comment: None,
    };

    service.count_item(inventory_id, item_id, count(2)).await.unwrap();
    service.submit_inventory(inventory_id).await.unwrap();

    let err = service
        .count_item(inventory_id, item_id, count(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let rejected = service
        .reject_inventory(inventory_id, reject("Recount rack B"))
        .await
        .unwrap();
    assert_eq!(rejected.inventory.status, InventoryStatus::Rejected);
    assert_eq!(
        rejected.inventory.rejection_reason.as_deref(),
        Some("Recount rack B")
    );
    assert_eq!(quantity_of(&pool, material_id).await, 10);

    let err = service
        .reject_inventory(inventory_id, reject("Again"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));

    service.count_item(inventory_id, item_id, count(9)).await.unwrap();
    service.submit_inventory(inventory_id).await.unwrap();
    service.approve_inventory(inventory_id).await.unwrap();
    assert_eq!(quantity_of(&pool, material_id).await, 9);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_open_inventory_can_be_deleted(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 6, None).await;
    let service = InventoryService::new(pool.clone());

    let inventory = service
        .create_inventory(CreateInventoryInput {
            inventory_number: "INV-4".to_string(),
            inventory_date: None,
            comment: None,
        })
        .await
        .unwrap();
    let inventory_id = inventory.inventory.id;
    assert_eq!(inventory.items.len(), 1);

    service.delete_inventory(inventory_id).await.unwrap();

    let err = service.get_inventory(inventory_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let lines = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM inventory_items")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lines, 0);
    assert_eq!(quantity_of(&pool, material_id).await, 6);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_inventory_number(pool: PgPool) {
    let service = InventoryService::new(pool.clone());
    let input = || CreateInventoryInput {
        inventory_number: "INV-DUP".to_string(),
        inventory_date: None,
        comment: None,
    };

    service.create_inventory(input()).await.unwrap();
    let err = service.create_inventory(input()).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(_)));
}

// ============================================================================
// Write-offs
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_write_off_removes_stock(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 20, Some(Decimal::new(1500, 2))).await;
    let service = WriteOffService::new(pool.clone());

    let write_off = service.create_write_off(new_write_off("WO-1")).await.unwrap();
    let write_off_id = write_off.write_off.id;

    let err = service
        .add_item(write_off_id, write_off_line(material_id, 21))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::InsufficientStock { .. })));

    let draft = service
        .add_item(write_off_id, write_off_line(material_id, 20))
        .await
        .unwrap();
    assert_eq!(draft.items[0].price_per_unit, Decimal::new(1500, 2));
    assert_eq!(draft.write_off.total_quantity, 20);
    assert_eq!(draft.write_off.total_amount, Decimal::new(30000, 2));

    service.submit_write_off(write_off_id).await.unwrap();
    let completed = service.approve_write_off(write_off_id).await.unwrap();
    assert_eq!(completed.write_off.status, WriteOffStatus::Completed);
    assert!(completed.write_off.completed_at.is_some());
    assert_eq!(quantity_of(&pool, material_id).await, 0);

    let err = service.approve_write_off(write_off_id).await.unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));
    assert_eq!(quantity_of(&pool, material_id).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_write_off_lines_of_one_material_add_up(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 10, Some(Decimal::new(100, 2))).await;
    let service = WriteOffService::new(pool.clone());

    let write_off = service.create_write_off(new_write_off("WO-2")).await.unwrap();
    let write_off_id = write_off.write_off.id;

    let draft = service
        .add_item(write_off_id, write_off_line(material_id, 6))
        .await
        .unwrap();
    let err = service
        .add_item(write_off_id, write_off_line(material_id, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::InsufficientStock { .. })));

    // Editing replaces the line's own quantity
    service
        .update_item(
            write_off_id,
            draft.items[0].id,
            UpdateWriteOffItemInput {
                quantity: 10,
                comment: None,
            },
        )
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_write_off_reject_returns_to_draft(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 5, None).await;
    let service = WriteOffService::new(pool.clone());

    let write_off = service.create_write_off(new_write_off("WO-3")).await.unwrap();
    let write_off_id = write_off.write_off.id;

    let err = service.submit_write_off(write_off_id).await.unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::NothingToWriteOff)));

    // No price tier: the line is valued at zero
    let draft = service
        .add_item(write_off_id, write_off_line(material_id, 2))
        .await
        .unwrap();
    assert_eq!(draft.items[0].price_per_unit, Decimal::ZERO);

    service.submit_write_off(write_off_id).await.unwrap();
    let err = service
        .add_item(write_off_id, write_off_line(material_id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    let rejected = service
        .reject_write_off(write_off_id, reject("Wrong material"))
        .await
        .unwrap();
    assert_eq!(rejected.write_off.status, WriteOffStatus::Draft);
    assert_eq!(
        rejected.write_off.rejection_reason.as_deref(),
        Some("Wrong material")
    );

    let err = service
        .reject_write_off(write_off_id, reject("Again"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Workflow(WorkflowError::UnexpectedStatus { .. })));

    service.delete_write_off(write_off_id).await.unwrap();
    assert_eq!(quantity_of(&pool, material_id).await, 5);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_removing_a_write_off_line_updates_totals(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 10, Some(Decimal::new(250, 2))).await;
    let service = WriteOffService::new(pool.clone());

    let write_off = service.create_write_off(new_write_off("WO-4")).await.unwrap();
    let write_off_id = write_off.write_off.id;

    service
        .add_item(write_off_id, write_off_line(material_id, 4))
        .await
        .unwrap();
    let draft = service
        .add_item(write_off_id, write_off_line(material_id, 2))
        .await
        .unwrap();
    assert_eq!(draft.write_off.total_quantity, 6);
    assert_eq!(draft.write_off.total_amount, Decimal::new(1500, 2));

    let larger_line = draft.items.iter().find(|item| item.quantity == 4).unwrap().id;
    let trimmed = service.remove_item(write_off_id, larger_line).await.unwrap();
    assert_eq!(trimmed.items.len(), 1);
    assert_eq!(trimmed.write_off.total_quantity, 2);
    assert_eq!(trimmed.write_off.total_amount, Decimal::new(500, 2));
    assert_eq!(quantity_of(&pool, material_id).await, 10);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_write_off_number(pool: PgPool) {
    let service = WriteOffService::new(pool.clone());

    service.create_write_off(new_write_off("WO-DUP")).await.unwrap();
    let err = service
        .create_write_off(new_write_off("WO-DUP"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_approvals_never_oversell(pool: PgPool) {
    let catalog = seed_catalog(&pool).await;
    let material_id = seed_material(&pool, &catalog, 10, Some(Decimal::new(100, 2))).await;
    let service = WriteOffService::new(pool.clone());

    let mut pending = Vec::new();
    for number in ["WO-A", "WO-B"] {
        let write_off = service.create_write_off(new_write_off(number)).await.unwrap();
        service
            .add_item(write_off.write_off.id, write_off_line(material_id, 6))
            .await
            .unwrap();
        service.submit_write_off(write_off.write_off.id).await.unwrap();
        pending.push(write_off.write_off.id);
    }

    let (first, second) = tokio::join!(
        service.approve_write_off(pending[0]),
        service.approve_write_off(pending[1])
    );

    let outcomes = [first, second];
    let completed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(completed, 1);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(AppError::Workflow(WorkflowError::InsufficientStock { .. }))
    )));
    assert_eq!(quantity_of(&pool, material_id).await, 4);
}
