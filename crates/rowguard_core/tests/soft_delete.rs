use rowguard_core::{
    ignore_optimistic_locking, ignore_soft_delete, CallContext, Client, EntitySchema, FieldDef,
    Mutation, Op, OptimisticLocking, PipelineError, Predicate, Query, SoftDelete, SqliteExecutor,
};
use std::sync::Arc;

const DELETED_AT: i64 = 1_700_000_000_000;

fn fixed_clock() -> i64 {
    DELETED_AT
}

fn documents(with_locking: bool) -> Arc<EntitySchema> {
    let builder = EntitySchema::builder("documents")
        .field(FieldDef::text("title"))
        .mixin(SoftDelete::with_clock(fixed_clock));
    let builder = if with_locking {
        builder.mixin(OptimisticLocking)
    } else {
        builder
    };
    builder.build().unwrap()
}

fn client(schema: &Arc<EntitySchema>) -> Client {
    let client = Client::builder(SqliteExecutor::open_in_memory().unwrap())
        .register(schema)
        .build();
    client.migrate().unwrap();
    client
}

fn seed(client: &Client, schema: &Arc<EntitySchema>, title: &str) -> String {
    client
        .mutate(
            &CallContext::background(),
            &mut Mutation::create(schema).set("title", title.to_string()),
        )
        .unwrap()
        .id
        .unwrap()
}

#[test]
fn delete_one_is_persisted_as_update() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = CallContext::background();
    let id = seed(&client, &schema, "draft");

    let outcome = client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, id.as_str()))
        .unwrap();
    assert_eq!(outcome.requested, Op::DeleteOne);
    assert_eq!(outcome.executed, Op::UpdateOne);
    assert_eq!(outcome.rows_affected, 1);
    assert!(outcome.is_soft_delete());

    assert!(client.get(&ctx, &schema, id.as_str()).unwrap().is_none());

    let hidden = client
        .get(&ignore_soft_delete(&ctx), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(hidden.delete_time(), Some(DELETED_AT));
    assert_eq!(hidden.get_text("title"), Some("draft"));
}

#[test]
fn default_reads_exclude_deleted_rows_and_bypass_includes_them() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = CallContext::background();
    let kept = seed(&client, &schema, "kept");
    let dropped = seed(&client, &schema, "dropped");

    client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, dropped.as_str()))
        .unwrap();

    let visible = client.query(&ctx, Query::all(&schema)).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), Some(kept.as_str()));

    let everything = client
        .query(&ignore_soft_delete(&ctx), Query::all(&schema))
        .unwrap();
    assert_eq!(everything.len(), 2);
}

#[test]
fn double_delete_matches_nothing_and_reads_as_not_found() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = CallContext::background();
    let id = seed(&client, &schema, "once");

    client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, id.as_str()))
        .unwrap()
        .require_row()
        .unwrap();

    let err = client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, id.as_str()))
        .unwrap_err();
    assert!(matches!(err, PipelineError::SoftDeleteNoop { ref table } if table == "documents"));
    assert!(err.is_not_found());

    let row = client
        .get(&ignore_soft_delete(&ctx), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.delete_time(), Some(DELETED_AT));
}

#[test]
fn deleting_missing_row_is_not_found_equivalent() {
    let schema = documents(false);
    let client = client(&schema);

    let err = client
        .mutate(
            &CallContext::background(),
            &mut Mutation::delete_one(&schema, "does-not-exist"),
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::SoftDeleteNoop { .. }));
    assert!(err.is_not_found());
}

#[test]
fn bypassed_delete_of_missing_row_is_not_found() {
    let schema = documents(false);
    let client = client(&schema);

    let err = client
        .mutate(
            &ignore_soft_delete(&CallContext::background()),
            &mut Mutation::delete_one(&schema, "does-not-exist"),
        )
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}

#[test]
fn bypass_performs_physical_delete() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = ignore_soft_delete(&CallContext::background());
    let id = seed(&client, &schema, "purge me");

    let outcome = client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, id.as_str()))
        .unwrap();
    assert_eq!(outcome.executed, Op::DeleteOne);
    assert_eq!(outcome.rows_affected, 1);

    assert!(client.get(&ctx, &schema, id.as_str()).unwrap().is_none());
}

#[test]
fn delete_many_stamps_only_matching_live_rows() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = CallContext::background();
    seed(&client, &schema, "a");
    seed(&client, &schema, "a");
    let other = seed(&client, &schema, "b");

    let outcome = client
        .mutate(
            &ctx,
            &mut Mutation::delete_many(&schema).filter(Predicate::eq("title", "a".to_string())),
        )
        .unwrap();
    assert_eq!(outcome.executed, Op::UpdateMany);
    assert_eq!(outcome.rows_affected, 2);

    let again = client
        .mutate(
            &ctx,
            &mut Mutation::delete_many(&schema).filter(Predicate::eq("title", "a".to_string())),
        )
        .unwrap();
    assert_eq!(again.rows_affected, 0);

    let visible = client.query(&ctx, Query::all(&schema)).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), Some(other.as_str()));
}

#[test]
fn rewritten_delete_passes_through_optimistic_locking() {
    let schema = documents(true);
    let client = client(&schema);
    let ctx = CallContext::background();
    let id = seed(&client, &schema, "versioned");

    let err = client
        .mutate(
            &ctx,
            &mut Mutation::delete_one(&schema, id.as_str()).expect_version(7),
        )
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(client.get(&ctx, &schema, id.as_str()).unwrap().is_some());

    client
        .mutate(
            &ctx,
            &mut Mutation::delete_one(&schema, id.as_str()).expect_version(0),
        )
        .unwrap();

    let row = client
        .get(&ignore_soft_delete(&ctx), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.lock_version(), Some(1));
    assert_eq!(row.delete_time(), Some(DELETED_AT));
}

#[test]
fn locking_bypass_still_soft_deletes() {
    let schema = documents(true);
    let client = client(&schema);
    let ctx = ignore_optimistic_locking(&CallContext::background());
    let id = seed(&client, &schema, "admin");

    let outcome = client
        .mutate(
            &ctx,
            &mut Mutation::delete_one(&schema, id.as_str()).expect_version(99),
        )
        .unwrap();
    assert!(outcome.is_soft_delete());
    assert_eq!(outcome.rows_affected, 1);

    let row = client
        .get(&ignore_soft_delete(&ctx), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.lock_version(), Some(0));
    assert_eq!(row.delete_time(), Some(DELETED_AT));
}

#[test]
fn updates_still_reach_soft_deleted_rows() {
    let schema = documents(false);
    let client = client(&schema);
    let ctx = CallContext::background();
    let id = seed(&client, &schema, "old");

    client
        .mutate(&ctx, &mut Mutation::delete_one(&schema, id.as_str()))
        .unwrap();
    let outcome = client
        .mutate(
            &ctx,
            &mut Mutation::update_one(&schema, id.as_str()).set("title", "renamed".to_string()),
        )
        .unwrap();
    assert_eq!(outcome.rows_affected, 1);
}

#[test]
fn versioned_delete_of_stamped_row_reports_conflict() {
    let schema = documents(true);
    let client = client(&schema);
    let ctx = CallContext::background();
    let id = seed(&client, &schema, "twice");

    client
        .mutate(
            &ctx,
            &mut Mutation::delete_one(&schema, id.as_str()).expect_version(0),
        )
        .unwrap();

    // Version 1 matches, but the row is no longer live.
    let err = client
        .mutate(
            &ctx,
            &mut Mutation::delete_one(&schema, id.as_str()).expect_version(1),
        )
        .unwrap_err();
    assert!(err.is_conflict());

    let row = client
        .get(&ignore_soft_delete(&ctx), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.lock_version(), Some(1));
    assert!(row.delete_time().is_some());
}
