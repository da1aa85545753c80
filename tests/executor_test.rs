use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use karstdb::catalog::schema::{Column, DataType, Schema};
use karstdb::execution::{
    AggregationExecutor, AggregationType, CompareOp, DeleteExecutor, Executor, Expression,
    IndexScanExecutor, InsertExecutor, LimitExecutor, NestedIndexJoinExecutor,
    NestedLoopJoinExecutor, SeqScanExecutor, UpdateAction, UpdateExecutor,
};
use karstdb::storage::table::tuple::Value;
use karstdb::transaction::IsolationLevel;

mod common;
use common::{accounts_schema, TestDb};

fn seed_accounts(db: &TestDb) -> Result<()> {
    db.catalog
        .write()
        .create_table("accounts", accounts_schema())?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let rows = vec![
        vec![Value::Integer(1), Value::Text("alice".into()), Value::Integer(100)],
        vec![Value::Integer(2), Value::Text("bob".into()), Value::Integer(250)],
        vec![Value::Integer(3), Value::Text("carol".into()), Value::Integer(50)],
        vec![Value::Integer(4), Value::Text("dave".into()), Value::Integer(250)],
    ];
    let mut insert = InsertExecutor::from_raw_values(ctx, table_info, rows);
    insert.init()?;
    assert!(insert.next()?.is_none());
    db.txn_manager.commit(&txn)?;
    Ok(())
}

fn scan_all(db: &TestDb, isolation: IsolationLevel) -> Result<Vec<Vec<Value>>> {
    let txn = db.begin(isolation);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let schema = table_info.schema.clone();
    let mut scan = SeqScanExecutor::new(ctx, table_info, None, None);
    scan.init()?;
    let mut rows = Vec::new();
    while let Some((tuple, _)) = scan.next()? {
        rows.push(tuple.values(&schema)?);
    }
    db.txn_manager.commit(&txn)?;
    Ok(rows)
}

#[test]
fn test_seq_scan_with_predicate_and_projection() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();

    // SELECT name FROM accounts WHERE balance >= 100
    let predicate = Expression::compare(
        CompareOp::Ge,
        Expression::column(2),
        Expression::constant(Value::Integer(100)),
    );
    let mut scan = SeqScanExecutor::new(ctx, table_info, Some(predicate), Some(vec![1]));
    scan.init()?;

    assert_eq!(scan.output_schema().column_count(), 1);
    let mut names = Vec::new();
    while let Some((tuple, _)) = scan.next()? {
        names.push(tuple.value(scan.output_schema(), 0)?);
    }
    assert_eq!(
        names,
        vec![
            Value::Text("alice".into()),
            Value::Text("bob".into()),
            Value::Text("dave".into())
        ]
    );
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_isolation_level_lock_footprints() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    // READ_UNCOMMITTED takes no shared locks at all
    let txn = db.begin(IsolationLevel::ReadUncommitted);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let mut scan = SeqScanExecutor::new(ctx, table_info.clone(), None, None);
    scan.init()?;
    while scan.next()?.is_some() {}
    assert!(txn.shared_lock_set().is_empty());
    db.txn_manager.commit(&txn)?;

    // READ_COMMITTED drops each shared lock as soon as the row is out
    let txn = db.begin(IsolationLevel::ReadCommitted);
    let ctx = db.context(txn.clone());
    let mut scan = SeqScanExecutor::new(ctx, table_info.clone(), None, None);
    scan.init()?;
    while scan.next()?.is_some() {}
    assert!(txn.shared_lock_set().is_empty());
    db.txn_manager.commit(&txn)?;

    // REPEATABLE_READ holds every shared lock until commit
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let mut scan = SeqScanExecutor::new(ctx, table_info, None, None);
    scan.init()?;
    let mut count = 0;
    while scan.next()?.is_some() {
        count += 1;
    }
    assert_eq!(txn.shared_lock_set().len(), count);
    db.txn_manager.commit(&txn)?;
    assert!(txn.shared_lock_set().is_empty());
    Ok(())
}

#[test]
fn test_insert_maintains_indexes() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let index_info =
        db.catalog
            .write()
            .create_index(&txn, "idx_accounts_id", "accounts", vec![0], 8, 8)?;
    db.txn_manager.commit(&txn)?;

    // the backfill covered the seeded rows
    let txn = db.begin(IsolationLevel::RepeatableRead);
    assert_eq!(index_info.index.get_value(&2, &txn)?.len(), 1);

    // a fresh insert shows up in the index
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let mut insert = InsertExecutor::from_raw_values(
        ctx,
        table_info.clone(),
        vec![vec![
            Value::Integer(9),
            Value::Text("erin".into()),
            Value::Integer(75),
        ]],
    );
    insert.init()?;
    insert.next()?;

    let rids = index_info.index.get_value(&9, &txn)?;
    assert_eq!(rids.len(), 1);
    let stored = table_info.table.get_tuple(rids[0])?.unwrap();
    assert_eq!(
        stored.value(&table_info.schema, 1)?,
        Value::Text("erin".into())
    );
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_index_scan_range() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let index_info =
        db.catalog
            .write()
            .create_index(&txn, "idx_accounts_id", "accounts", vec![0], 8, 8)?;
    db.txn_manager.commit(&txn)?;

    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let mut scan = IndexScanExecutor::new(
        table_info.clone(),
        index_info,
        Some(2),
        Some(3),
        None,
        Some(vec![0]),
    );
    scan.init()?;
    let mut ids = Vec::new();
    while let Some((tuple, _)) = scan.next()? {
        ids.push(tuple.value(scan.output_schema(), 0)?);
    }
    assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3)]);
    Ok(())
}

#[test]
fn test_delete_then_abort_restores_rows() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let index_info =
        db.catalog
            .write()
            .create_index(&txn, "idx_accounts_id", "accounts", vec![0], 8, 8)?;
    db.txn_manager.commit(&txn)?;

    // DELETE FROM accounts WHERE balance = 250
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let predicate = Expression::compare(
        CompareOp::Eq,
        Expression::column(2),
        Expression::constant(Value::Integer(250)),
    );
    let child = Box::new(SeqScanExecutor::new(
        ctx.clone(),
        table_info.clone(),
        Some(predicate),
        None,
    ));
    let mut delete = DeleteExecutor::new(ctx, table_info.clone(), child);
    delete.init()?;
    assert!(delete.next()?.is_none());

    // gone for this transaction, index entries retracted
    assert!(index_info.index.get_value(&2, &txn)?.is_empty());
    db.txn_manager.abort(&txn)?;

    // the abort rolled the heap and the index back
    let rows = scan_all(&db, IsolationLevel::RepeatableRead)?;
    assert_eq!(rows.len(), 4);
    let txn = db.begin(IsolationLevel::RepeatableRead);
    assert_eq!(index_info.index.get_value(&2, &txn)?.len(), 1);
    db.txn_manager.commit(&txn)?;

    // a committed delete sticks
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let predicate = Expression::compare(
        CompareOp::Eq,
        Expression::column(2),
        Expression::constant(Value::Integer(250)),
    );
    let child = Box::new(SeqScanExecutor::new(
        ctx.clone(),
        table_info.clone(),
        Some(predicate),
        None,
    ));
    let mut delete = DeleteExecutor::new(ctx, table_info, child);
    delete.init()?;
    delete.next()?;
    db.txn_manager.commit(&txn)?;

    let rows = scan_all(&db, IsolationLevel::RepeatableRead)?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[test]
fn test_update_rewrites_rows_and_indexes() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let index_info =
        db.catalog
            .write()
            .create_index(&txn, "idx_accounts_id", "accounts", vec![0], 8, 8)?;
    db.txn_manager.commit(&txn)?;

    // UPDATE accounts SET id = id + 10, balance = 0 WHERE id = 1
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();
    let predicate = Expression::compare(
        CompareOp::Eq,
        Expression::column(0),
        Expression::constant(Value::Integer(1)),
    );
    let child = Box::new(SeqScanExecutor::new(
        ctx.clone(),
        table_info.clone(),
        Some(predicate),
        None,
    ));
    let mut attrs = HashMap::new();
    attrs.insert(0, UpdateAction::Add(10));
    attrs.insert(2, UpdateAction::Set(Value::Integer(0)));
    let mut update = UpdateExecutor::new(ctx, table_info.clone(), attrs, child);
    update.init()?;

    let (updated, _) = update.next()?.unwrap();
    assert_eq!(updated.value(&table_info.schema, 0)?, Value::Integer(11));
    assert_eq!(updated.value(&table_info.schema, 2)?, Value::Integer(0));
    assert!(update.next()?.is_none());

    // old index key is gone, new one resolves to the row
    assert!(index_info.index.get_value(&1, &txn)?.is_empty());
    let rids = index_info.index.get_value(&11, &txn)?;
    assert_eq!(rids.len(), 1);
    db.txn_manager.commit(&txn)?;

    // an aborted update leaves no trace
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let child = Box::new(SeqScanExecutor::new(ctx.clone(), table_info.clone(), None, None));
    let mut attrs = HashMap::new();
    attrs.insert(2, UpdateAction::Set(Value::Integer(999)));
    let mut update = UpdateExecutor::new(ctx, table_info, attrs, child);
    update.init()?;
    while update.next()?.is_some() {}
    db.txn_manager.abort(&txn)?;

    let rows = scan_all(&db, IsolationLevel::RepeatableRead)?;
    assert!(rows.iter().all(|row| row[2] != Value::Integer(999)));
    Ok(())
}

fn seed_orders(db: &TestDb) -> Result<()> {
    let orders_schema = Schema::new(vec![
        Column::new("order_id", DataType::Integer),
        Column::new("account_id", DataType::Integer),
        Column::new("amount", DataType::Integer),
    ]);
    db.catalog.write().create_table("orders", orders_schema)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("orders").unwrap();
    let rows = vec![
        vec![Value::Integer(100), Value::Integer(1), Value::Integer(30)],
        vec![Value::Integer(101), Value::Integer(2), Value::Integer(45)],
        vec![Value::Integer(102), Value::Integer(1), Value::Integer(12)],
        vec![Value::Integer(103), Value::Integer(7), Value::Integer(99)],
    ];
    let mut insert = InsertExecutor::from_raw_values(ctx, table_info, rows);
    insert.init()?;
    insert.next()?;
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_nested_loop_join() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;
    seed_orders(&db)?;

    let txn = db.begin(IsolationLevel::ReadUncommitted);
    let ctx = db.context(txn.clone());
    let accounts = db.catalog.read().get_table_by_name("accounts").unwrap();
    let orders = db.catalog.read().get_table_by_name("orders").unwrap();

    // SELECT * FROM orders JOIN accounts ON orders.account_id = accounts.id
    let left = Box::new(SeqScanExecutor::new(ctx.clone(), orders, None, None));
    let right = Box::new(SeqScanExecutor::new(ctx.clone(), accounts, None, None));
    let predicate = Expression::compare(
        CompareOp::Eq,
        Expression::join_column(0, 1),
        Expression::join_column(1, 0),
    );
    let mut join = NestedLoopJoinExecutor::new(left, right, Some(predicate));
    join.init()?;

    let mut pairs = Vec::new();
    while let Some((tuple, _)) = join.next()? {
        let order_id = tuple.value(join.output_schema(), 0)?;
        let name = tuple.value(join.output_schema(), 4)?;
        pairs.push((order_id, name));
    }
    assert_eq!(
        pairs,
        vec![
            (Value::Integer(100), Value::Text("alice".into())),
            (Value::Integer(101), Value::Text("bob".into())),
            (Value::Integer(102), Value::Text("alice".into())),
        ]
    );
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_nested_index_join() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;
    seed_orders(&db)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    db.catalog
        .write()
        .create_index(&txn, "idx_accounts_id", "accounts", vec![0], 8, 8)?;
    db.txn_manager.commit(&txn)?;

    let txn = db.begin(IsolationLevel::ReadUncommitted);
    let ctx = db.context(txn.clone());
    let accounts = db.catalog.read().get_table_by_name("accounts").unwrap();
    let orders = db.catalog.read().get_table_by_name("orders").unwrap();
    let index_info = db
        .catalog
        .read()
        .get_index_by_name("accounts", "idx_accounts_id")
        .unwrap();

    let outer = Box::new(SeqScanExecutor::new(ctx.clone(), orders, None, None));
    let mut join =
        NestedIndexJoinExecutor::new(ctx, outer, accounts, index_info, "account_id");
    join.init()?;

    let mut joined = Vec::new();
    while let Some((tuple, _)) = join.next()? {
        let order_id = tuple.value(join.output_schema(), 0)?;
        let name = tuple.value(join.output_schema(), 4)?;
        joined.push((order_id, name));
    }
    joined.sort_by(|a, b| format!("{:?}", a).cmp(&format!("{:?}", b)));
    assert_eq!(
        joined,
        vec![
            (Value::Integer(100), Value::Text("alice".into())),
            (Value::Integer(101), Value::Text("bob".into())),
            (Value::Integer(102), Value::Text("alice".into())),
        ]
    );
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_aggregation_with_having() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::ReadUncommitted);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();

    // SELECT balance, COUNT(*), SUM(id) FROM accounts GROUP BY balance
    // HAVING COUNT(*) >= 2
    let child = Box::new(SeqScanExecutor::new(ctx, table_info, None, None));
    let output_schema = Schema::new(vec![
        Column::new("balance", DataType::Integer),
        Column::new("count", DataType::Integer),
        Column::new("sum_id", DataType::Integer),
    ]);
    let having = Expression::compare(
        CompareOp::Ge,
        Expression::column(1),
        Expression::constant(Value::Integer(2)),
    );
    let mut agg = AggregationExecutor::new(
        child,
        vec![Expression::column(2)],
        vec![
            (AggregationType::CountStar, Expression::column(0)),
            (AggregationType::Sum, Expression::column(0)),
        ],
        Some(having),
        output_schema,
    );
    agg.init()?;

    let mut groups = Vec::new();
    while let Some((tuple, _)) = agg.next()? {
        groups.push(tuple.values(agg.output_schema())?);
    }
    // only balance=250 has two members (bob and dave, ids 2 and 4)
    assert_eq!(
        groups,
        vec![vec![
            Value::Integer(250),
            Value::Integer(2),
            Value::Integer(6)
        ]]
    );
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_limit_and_offset() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let txn = db.begin(IsolationLevel::ReadUncommitted);
    let ctx = db.context(txn.clone());
    let table_info = db.catalog.read().get_table_by_name("accounts").unwrap();

    let child = Box::new(SeqScanExecutor::new(ctx, table_info.clone(), None, None));
    let mut limit = LimitExecutor::new(child, 2, 1);
    limit.init()?;

    let mut ids = Vec::new();
    while let Some((tuple, _)) = limit.next()? {
        ids.push(tuple.value(&table_info.schema, 0)?);
    }
    // rows 2 and 3 of four: the offset skipped id=1, the limit cut id=4
    assert_eq!(ids, vec![Value::Integer(2), Value::Integer(3)]);
    db.txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_insert_from_child_executor() -> Result<()> {
    let db = TestDb::new(64)?;
    seed_accounts(&db)?;

    let archive_schema = accounts_schema();
    db.catalog.write().create_table("archive", archive_schema)?;

    // INSERT INTO archive SELECT * FROM accounts WHERE balance >= 100
    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let accounts = db.catalog.read().get_table_by_name("accounts").unwrap();
    let archive = db.catalog.read().get_table_by_name("archive").unwrap();
    let predicate = Expression::compare(
        CompareOp::Ge,
        Expression::column(2),
        Expression::constant(Value::Integer(100)),
    );
    let child = Box::new(SeqScanExecutor::new(ctx.clone(), accounts, Some(predicate), None));
    let mut insert = InsertExecutor::from_child(ctx.clone(), archive.clone(), child);
    insert.init()?;
    insert.next()?;
    db.txn_manager.commit(&txn)?;

    let txn = db.begin(IsolationLevel::RepeatableRead);
    let ctx = db.context(txn.clone());
    let mut scan = SeqScanExecutor::new(ctx, archive.clone(), None, None);
    scan.init()?;
    let mut count = 0;
    while scan.next()?.is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
    db.txn_manager.commit(&txn)?;
    Ok(())
}
