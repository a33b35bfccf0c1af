use super::*;

fn product() -> TableId {
    TableId::new("Production", "Product")
}

fn category() -> TableId {
    TableId::new("Production", "ProductCategory")
}

#[test]
fn test_build_graph_orders_tables() {
    let graph = SchemaGraph::new(vec![
        Table::new(product())
            .with_column(Column::new("ProductID").identity())
            .with_column(Column::new("CategoryID").references(category()))
            .with_primary_key(["ProductID"]),
        Table::new(category())
            .with_column(Column::new("CategoryID").identity())
            .with_primary_key(["CategoryID"]),
    ])
    .unwrap();

    let ids: Vec<String> = graph.table_ids().map(|id| id.to_string()).collect();
    assert_eq!(
        ids,
        vec!["Production.Product", "Production.ProductCategory"]
    );
    assert!(graph.contains(&category()));
    assert_eq!(graph.len(), 2);
}

#[test]
fn test_dangling_foreign_key_is_rejected() {
    let result = SchemaGraph::new(vec![Table::new(product())
        .with_column(Column::new("ProductID"))
        .with_column(Column::new("CategoryID").references(category()))
        .with_primary_key(["ProductID"])]);

    match result {
        Err(CoreError::DanglingForeignKey {
            table,
            column,
            target,
        }) => {
            assert_eq!(table, "Production.Product");
            assert_eq!(column, "CategoryID");
            assert_eq!(target, "Production.ProductCategory");
        }
        other => panic!("expected DanglingForeignKey, got {other:?}"),
    }
}

#[test]
fn test_duplicate_table_is_rejected() {
    let result = SchemaGraph::new(vec![
        Table::new(product()).with_column(Column::new("ProductID")),
        Table::new(product()).with_column(Column::new("ProductID")),
    ]);
    assert!(matches!(result, Err(CoreError::DuplicateTable { .. })));
}

#[test]
fn test_duplicate_column_is_rejected() {
    let result = SchemaGraph::new(vec![Table::new(product())
        .with_column(Column::new("Name"))
        .with_column(Column::new("Name"))]);
    assert!(matches!(result, Err(CoreError::DuplicateColumn { .. })));
}

#[test]
fn test_unknown_primary_key_column_is_rejected() {
    let result = SchemaGraph::new(vec![Table::new(product())
        .with_column(Column::new("Name"))
        .with_primary_key(["ProductID"])]);
    assert!(matches!(
        result,
        Err(CoreError::UnknownPrimaryKeyColumn { .. })
    ));
}

#[test]
fn test_duplicate_primary_key_column_is_rejected() {
    let result = SchemaGraph::new(vec![Table::new(product())
        .with_column(Column::new("ProductID"))
        .with_primary_key(["ProductID", "ProductID"])]);
    assert!(matches!(
        result,
        Err(CoreError::DuplicatePrimaryKeyColumn { .. })
    ));
}

#[test]
fn test_mixed_group_targets_are_rejected() {
    let result = SchemaGraph::new(vec![
        Table::new(category()).with_column(Column::new("CategoryID")),
        Table::new(product())
            .with_column(Column::new("A").references(category()).in_group("FK_X"))
            .with_column(Column::new("B").references(product()).in_group("FK_X")),
    ]);
    assert!(matches!(
        result,
        Err(CoreError::MixedForeignKeyGroup { .. })
    ));
}

#[test]
fn test_foreign_key_groups_follow_declaration_order() {
    let order = TableId::new("Sales", "SalesOrderDetail");
    let offer = TableId::new("Sales", "SpecialOfferProduct");
    let table = Table::new(order.clone())
        .with_column(Column::new("SalesOrderDetailID"))
        .with_column(
            Column::new("SpecialOfferID")
                .references(offer.clone())
                .in_group("FK_Offer"),
        )
        .with_column(Column::new("OrderQty"))
        .with_column(Column::new("ProductID").references(offer.clone()).in_group("FK_Offer"))
        .with_column(Column::new("ParentID").nullable().references(order.clone()));

    let groups = table.foreign_key_groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].key.to_string(), "FK_Offer");
    assert_eq!(groups[0].columns, vec![ColumnName::new("SpecialOfferID"), ColumnName::new("ProductID")]);
    assert_eq!(groups[0].position, 1);
    assert_eq!(groups[1].key, GroupKey::Column(ColumnName::new("ParentID")));
    assert_eq!(groups[1].target, order);
    assert!(table.is_self_referencing());
}

#[test]
fn test_can_be_omitted() {
    assert!(Column::new("A").nullable().can_be_omitted());
    assert!(Column::new("A").with_default().can_be_omitted());
    assert!(!Column::new("A").can_be_omitted());
    assert!(!Column::new("A").nullable().identity().can_be_omitted());
}

#[test]
fn test_in_group_without_foreign_key_is_ignored() {
    let column = Column::new("A").in_group("FK_A");
    assert!(column.foreign_key.is_none());
}

#[test]
fn test_foreign_key_into_keyless_table_is_rejected() {
    let heap = TableId::new("dbo", "A");
    let result = SchemaGraph::new(vec![
        Table::new(heap.clone()).with_column(Column::new("X")),
        Table::new(TableId::new("dbo", "B"))
            .with_column(Column::new("Id").identity())
            .with_column(Column::new("AId").references(heap))
            .with_primary_key(["Id"]),
    ]);

    match result {
        Err(CoreError::KeylessForeignKeyTarget {
            table,
            column,
            target,
        }) => {
            assert_eq!(table, "dbo.B");
            assert_eq!(column, "AId");
            assert_eq!(target, "dbo.A");
        }
        other => panic!("expected KeylessForeignKeyTarget, got {other:?}"),
    }
}

#[test]
fn test_keyless_self_reference_is_rejected() {
    let node = TableId::new("dbo", "Node");
    let result = SchemaGraph::new(vec![Table::new(node.clone())
        .with_column(Column::new("Id"))
        .with_column(Column::new("ParentId").nullable().references(node))]);
    assert!(matches!(
        result,
        Err(CoreError::KeylessForeignKeyTarget { .. })
    ));
}

#[test]
fn test_keyless_table_without_incoming_references_is_accepted() {
    let graph = SchemaGraph::new(vec![
        Table::new(category())
            .with_column(Column::new("CategoryID"))
            .with_primary_key(["CategoryID"]),
        Table::new(TableId::new("dbo", "AuditLog"))
            .with_column(Column::new("Message"))
            .with_column(Column::new("CategoryID").nullable().references(category())),
    ])
    .unwrap();
    assert_eq!(graph.len(), 2);
}
