use rowguard_core::{
    CallContext, Client, EntitySchema, FieldDef, Mutation, OptimisticLocking, PipelineError,
    SoftDelete, SqliteExecutor,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

const WRITERS: usize = 4;

fn counters() -> Arc<EntitySchema> {
    EntitySchema::builder("counters")
        .field(FieldDef::int64("value"))
        .mixin(SoftDelete::default())
        .mixin(OptimisticLocking)
        .build()
        .unwrap()
}

fn client_on(path: &Path, schema: &Arc<EntitySchema>) -> Client {
    Client::builder(SqliteExecutor::open(path).unwrap())
        .register(schema)
        .build()
}

fn seed(client: &Client, schema: &Arc<EntitySchema>) -> String {
    client.migrate().unwrap();
    client
        .mutate(
            &CallContext::background(),
            &mut Mutation::create(schema).set("value", 0_i64),
        )
        .unwrap()
        .id
        .unwrap()
}

#[test]
fn racing_connections_with_same_version_admit_exactly_one_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.sqlite3");
    let schema = counters();
    let id = seed(&client_on(&path, &schema), &schema);

    let clients: Vec<Client> = (0..WRITERS).map(|_| client_on(&path, &schema)).collect();
    let barrier = Barrier::new(WRITERS);

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = clients
            .iter()
            .enumerate()
            .map(|(writer, client)| {
                let (barrier, schema, id) = (&barrier, &schema, id.as_str());
                scope.spawn(move || {
                    barrier.wait();
                    client.mutate(
                        &CallContext::background(),
                        &mut Mutation::update_one(schema, id)
                            .set("value", writer as i64 + 1)
                            .expect_version(0),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| matches!(result, Err(PipelineError::OptimisticLockConflict { .. })))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(conflicts, WRITERS - 1);

    let row = clients[0]
        .get(&CallContext::background(), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.lock_version(), Some(1));
}

#[test]
fn shared_client_serializes_versioned_increments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");
    let schema = counters();
    let client = Arc::new(client_on(&path, &schema));
    let id = seed(&client, &schema);
    let barrier = Barrier::new(WRITERS);

    // Every writer retries on conflict with a fresh read, so all increments
    // land and the version counts them.
    thread::scope(|scope| {
        for _ in 0..WRITERS {
            let (client, barrier, schema, id) = (&client, &barrier, &schema, id.as_str());
            scope.spawn(move || {
                let ctx = CallContext::background();
                barrier.wait();
                loop {
                    let row = client.get(&ctx, schema, id).unwrap().unwrap();
                    let version = row.lock_version().unwrap();
                    let value = row.get_i64("value").unwrap();
                    let attempt = client.mutate(
                        &ctx,
                        &mut Mutation::update_one(schema, id)
                            .set("value", value + 1)
                            .expect_version(version),
                    );
                    match attempt {
                        Ok(_) => break,
                        Err(err) if err.is_conflict() => continue,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
            });
        }
    });

    let row = client
        .get(&CallContext::background(), &schema, id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(row.get_i64("value"), Some(WRITERS as i64));
    assert_eq!(row.lock_version(), Some(WRITERS as i64));
}

#[test]
fn concurrent_soft_deletes_stamp_the_row_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delete.sqlite3");
    let schema = counters();
    let id = seed(&client_on(&path, &schema), &schema);

    let clients: Vec<Client> = (0..WRITERS).map(|_| client_on(&path, &schema)).collect();
    let barrier = Barrier::new(WRITERS);

    let stamped: usize = thread::scope(|scope| {
        let handles: Vec<_> = clients
            .iter()
            .map(|client| {
                let (barrier, schema, id) = (&barrier, &schema, id.as_str());
                scope.spawn(move || {
                    barrier.wait();
                    match client.mutate(
                        &CallContext::background(),
                        &mut Mutation::delete_one(schema, id),
                    ) {
                        Ok(outcome) => outcome.rows_affected,
                        Err(PipelineError::SoftDeleteNoop { .. }) => 0,
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(stamped, 1);
}
